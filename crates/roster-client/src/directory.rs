//! Contact directory search.
//!
//! A search blends service contacts, non-service contacts, groups and recent
//! conversations into one list. Which sources are consulted depends on the
//! [`DisplayMode`]; how they are arranged and which section headers appear
//! is decided by [`layout`], a pure function of what the sources returned.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use roster_shared::address::is_valid_sms_or_email;
use roster_shared::constants::{NEW_NUMBER_LABEL, PHONE_TYPE_CUSTOM, PHONE_TYPE_MOBILE};
use roster_store::{DirectoryRow, RowKind};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// Display mode
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Set of enabled directory sources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DisplayMode: u8 {
        /// Contacts registered with the messaging service.
        const PUSH = 1 << 0;
        /// Contacts reachable by SMS or email only.
        const SMS = 1 << 1;
        const GROUPS = 1 << 2;
        const ALL = Self::PUSH.bits() | Self::SMS.bits() | Self::GROUPS.bits();
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [(Self::PUSH, "push"), (Self::SMS, "sms"), (Self::GROUPS, "groups")] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Parses `all`, a numeric bit set, or flag names joined by `|` or `,`
/// (`push|sms`).
impl FromStr for DisplayMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(bits) = s.parse::<u8>() {
            return Ok(Self::from_bits_truncate(bits));
        }

        let mut mode = Self::empty();
        for part in s.split(['|', ',']) {
            mode |= match part.trim().to_ascii_lowercase().as_str() {
                "push" => Self::PUSH,
                "sms" => Self::SMS,
                "groups" => Self::GROUPS,
                "all" => Self::ALL,
                other => {
                    return Err(ClientError::InvalidInput(format!("unknown display mode: {other}")))
                }
            };
        }
        Ok(mode)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRequest {
    pub mode: DisplayMode,
    /// Free text typed by the user; empty means no filter.
    pub filter: String,
    /// Offer recent conversations above the contacts (unfiltered only).
    pub recents: bool,
}

impl DirectoryRequest {
    pub fn new(mode: DisplayMode, filter: impl Into<String>) -> Self {
        Self {
            mode,
            filter: filter.into(),
            recents: false,
        }
    }

    pub fn with_recents(mut self, recents: bool) -> Self {
        self.recents = recents;
        self
    }

    pub fn is_filtered(&self) -> bool {
        !self.filter.is_empty()
    }
}

/// One block of the composed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    RecentsHeader,
    Recents,
    ContactsHeader,
    Contacts,
    GroupsHeader,
    Groups,
}

/// What the sources produced, as far as the layout is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutInput {
    pub filtered: bool,
    /// Recents were requested and at least one exists.
    pub has_recents: bool,
    pub groups_enabled: bool,
    pub has_groups: bool,
    pub has_contacts: bool,
}

/// Section order for a search. The new-number row is not part of the
/// layout; it is appended after it.
pub fn layout(input: LayoutInput) -> &'static [Section] {
    use Section::*;

    match input {
        LayoutInput { filtered: false, has_recents: true, has_contacts: true, .. } => {
            &[RecentsHeader, Recents, ContactsHeader, Contacts]
        }
        LayoutInput { filtered: false, has_recents: true, has_contacts: false, .. } => {
            &[RecentsHeader, Recents]
        }
        LayoutInput { filtered: false, .. } => &[Contacts],
        LayoutInput { groups_enabled: true, has_groups: true, has_contacts: true, .. } => {
            &[ContactsHeader, Contacts, GroupsHeader, Groups]
        }
        LayoutInput { groups_enabled: true, has_groups: true, has_contacts: false, .. } => {
            &[Groups]
        }
        LayoutInput { .. } => &[Contacts],
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

impl Registry {
    /// Run a directory search on the calling thread.
    pub fn search(&self, request: &DirectoryRequest) -> Result<Vec<DirectoryRow>> {
        compose(self, request, &|| true)
    }
}

/// Build the rows for `request`. `is_current` is polled between source
/// stages; once it returns false the search stops with
/// [`ClientError::Superseded`].
pub(crate) fn compose(
    registry: &Registry,
    request: &DirectoryRequest,
    is_current: &dyn Fn() -> bool,
) -> Result<Vec<DirectoryRow>> {
    let checkpoint = || {
        if is_current() {
            Ok(())
        } else {
            Err(ClientError::Superseded)
        }
    };

    let filtered = request.is_filtered();
    let groups_enabled = filtered && request.mode.contains(DisplayMode::GROUPS);

    let recents = if !filtered && request.recents {
        registry
            .reader()
            .query_recent_conversations(registry.config().recent_limit)?
    } else {
        Vec::new()
    };
    checkpoint()?;

    let groups = if groups_enabled {
        registry.reader().query_groups(&request.filter)?
    } else {
        Vec::new()
    };
    checkpoint()?;

    let contacts = contact_rows(registry, request, &checkpoint)?;
    checkpoint()?;

    let input = LayoutInput {
        filtered,
        has_recents: !recents.is_empty(),
        groups_enabled,
        has_groups: !groups.is_empty(),
        has_contacts: !contacts.is_empty(),
    };

    let labels = registry.labels();
    let (mut recents, mut contacts, mut groups) = (Some(recents), Some(contacts), Some(groups));
    let mut rows = Vec::new();

    for section in layout(input) {
        match section {
            Section::RecentsHeader => rows.push(header(labels.recent_chats())),
            Section::ContactsHeader => rows.push(header(labels.contacts())),
            Section::GroupsHeader => rows.push(header(labels.groups())),
            Section::Recents => rows.extend(recents.take().unwrap_or_default()),
            Section::Contacts => rows.extend(contacts.take().unwrap_or_default()),
            Section::Groups => rows.extend(groups.take().unwrap_or_default()),
        }
    }

    if filtered && is_valid_sms_or_email(&request.filter) {
        rows.push(DirectoryRow {
            id: None,
            name: labels.new_number(),
            number: request.filter.clone(),
            number_type: PHONE_TYPE_CUSTOM,
            label: NEW_NUMBER_LABEL.to_string(),
            kind: RowKind::NewNumber,
        });
    }

    tracing::debug!(mode = %request.mode, filtered, rows = rows.len(), "directory composed");
    Ok(rows)
}

fn header(label: String) -> DirectoryRow {
    DirectoryRow {
        id: None,
        name: label,
        number: String::new(),
        number_type: PHONE_TYPE_MOBILE,
        label: String::new(),
        kind: RowKind::Divider,
    }
}

fn contact_rows(
    registry: &Registry,
    request: &DirectoryRequest,
    checkpoint: &dyn Fn() -> Result<()>,
) -> Result<Vec<DirectoryRow>> {
    if !registry.permissions().can_read_contacts() {
        tracing::debug!("address book permission denied, no contact rows");
        return Ok(Vec::new());
    }

    let push = request.mode.contains(DisplayMode::PUSH);
    let sms = request.mode.contains(DisplayMode::SMS);

    let (mut rows, non_service) = {
        let db = registry.reader();
        let service = if push {
            db.query_service_contacts(&request.filter)?
        } else {
            Vec::new()
        };
        let non_service = if sms {
            db.query_non_service_contacts(&request.filter)?
        } else {
            Vec::new()
        };
        (service, non_service)
    };

    if push {
        rows.extend(non_service);
    } else if sms {
        checkpoint()?;
        rows.extend(drop_registered(registry, non_service)?);
    }
    Ok(rows)
}

/// Re-check each row against the live cache and drop identities that have
/// become registered since the query ran.
fn drop_registered(registry: &Registry, rows: Vec<DirectoryRow>) -> Result<Vec<DirectoryRow>> {
    let started = Instant::now();
    let before = rows.len();

    let mut kept = Vec::with_capacity(before);
    for row in rows {
        let Some(id) = row.id else {
            kept.push(row);
            continue;
        };
        if registry.settings(id)?.is_registered() {
            tracing::trace!(id = %id, "dropping newly registered contact from sms list");
            continue;
        }
        kept.push(DirectoryRow {
            kind: RowKind::Normal,
            ..row
        });
    }

    tracing::debug!(
        before,
        after = kept.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "filtered non-service contacts"
    );
    Ok(kept)
}

// ---------------------------------------------------------------------------
// Background worker
// ---------------------------------------------------------------------------

/// Runs searches off the async runtime. Only the latest submission counts:
/// an older search still in flight stops at its next stage boundary and
/// resolves to `None`.
#[derive(Clone)]
pub struct DirectoryWorker {
    registry: Registry,
    generation: Arc<AtomicU64>,
}

impl DirectoryWorker {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a search, superseding any earlier one. Returns `None` when a
    /// newer request was submitted before this one completed.
    pub async fn submit(&self, request: DirectoryRequest) -> Result<Option<Vec<DirectoryRow>>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let counter = self.generation.clone();
        let registry = self.registry.clone();

        let result = tokio::task::spawn_blocking(move || {
            let is_current = || counter.load(Ordering::SeqCst) == generation;
            compose(&registry, &request, &is_current)
        })
        .await?;

        match result {
            Ok(rows) if self.generation.load(Ordering::SeqCst) == generation => Ok(Some(rows)),
            Ok(_) | Err(ClientError::Superseded) => {
                tracing::debug!(generation, "directory result discarded as stale");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Make every search in flight stale.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
