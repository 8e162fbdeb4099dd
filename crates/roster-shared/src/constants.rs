/// Number of recent conversations offered in the unfiltered directory view
pub const RECENT_CONVERSATION_MAX: usize = 25;

/// Upper bound for the best-effort name lookup on identifier creation
pub const ENRICHMENT_TIMEOUT_MS: u64 = 2_000;

/// Sentinel stored for "no default subscription"
pub const NO_SUBSCRIPTION_ID: i32 = -1;

/// Sentinel stored for "no system phone type"
pub const NO_PHONE_TYPE: i32 = -1;

/// Address-book phone type: custom label
pub const PHONE_TYPE_CUSTOM: i32 = 0;

/// Address-book phone type: mobile
pub const PHONE_TYPE_MOBILE: i32 = 2;

/// Label shown next to the synthetic "new number" row
pub const NEW_NUMBER_LABEL: &str = "\u{21e2}";

/// Capacity of the invalidation broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
