use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;

/// Stable row id of a recipient. Never reused once allocated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RecipientId(pub i64);

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecipientId {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(Self)
            .ok_or_else(|| RosterError::InvalidRecipientId(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VibrateState {
    #[default]
    Default = 0,
    Enabled = 1,
    Disabled = 2,
}

impl VibrateState {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i64) -> Result<Self, RosterError> {
        match id {
            0 => Ok(Self::Default),
            1 => Ok(Self::Enabled),
            2 => Ok(Self::Disabled),
            code => Err(RosterError::UnknownCode { kind: "vibrate", code }),
        }
    }
}

/// Whether the recipient is reachable on the messaging service, as last
/// reported by the registration oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RegisteredState {
    #[default]
    Unknown = 0,
    Registered = 1,
    NotRegistered = 2,
}

impl RegisteredState {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i64) -> Result<Self, RosterError> {
        match id {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Registered),
            2 => Ok(Self::NotRegistered),
            code => Err(RosterError::UnknownCode { kind: "registered", code }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnidentifiedAccessMode {
    #[default]
    Unknown = 0,
    Disabled = 1,
    Enabled = 2,
    Unrestricted = 3,
}

impl UnidentifiedAccessMode {
    pub fn mode(self) -> i32 {
        self as i32
    }

    pub fn from_mode(mode: i64) -> Result<Self, RosterError> {
        match mode {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Disabled),
            2 => Ok(Self::Enabled),
            3 => Ok(Self::Unrestricted),
            code => Err(RosterError::UnknownCode { kind: "unidentified access", code }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_id_parses_its_serialized_form() {
        let id = RecipientId(42);
        assert_eq!(id.to_string().parse::<RecipientId>().unwrap(), id);
        assert!("0".parse::<RecipientId>().is_err());
        assert!("abc".parse::<RecipientId>().is_err());
    }

    #[test]
    fn recipient_id_serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&RecipientId(7)).unwrap(), "7");
    }

    #[test]
    fn enum_codes_match_storage_values() {
        assert_eq!(RegisteredState::from_id(1).unwrap(), RegisteredState::Registered);
        assert_eq!(RegisteredState::NotRegistered.id(), 2);
        assert_eq!(VibrateState::from_id(2).unwrap(), VibrateState::Disabled);
        assert_eq!(UnidentifiedAccessMode::Unrestricted.mode(), 3);
        assert!(UnidentifiedAccessMode::from_mode(9).is_err());
    }
}
