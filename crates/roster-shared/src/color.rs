//! Conversation colour palette.
//!
//! Colours are persisted as their serialized token (`"deep_purple"`). A
//! token written by a newer palette that this build does not know is
//! reported as [`RosterError::UnknownColor`] so that the reader can treat it
//! as absent.

use serde::{Deserialize, Serialize};

use crate::error::RosterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialColor {
    Red,
    Pink,
    Purple,
    DeepPurple,
    Indigo,
    Blue,
    LightBlue,
    Cyan,
    Teal,
    Green,
    LightGreen,
    Orange,
    DeepOrange,
    Amber,
    BlueGrey,
    Grey,
}

impl MaterialColor {
    /// Colours handed out to contacts, in palette order.
    pub const PALETTE: [MaterialColor; 14] = [
        Self::Red,
        Self::Pink,
        Self::Purple,
        Self::DeepPurple,
        Self::Indigo,
        Self::Blue,
        Self::LightBlue,
        Self::Cyan,
        Self::Teal,
        Self::Green,
        Self::LightGreen,
        Self::Orange,
        Self::DeepOrange,
        Self::Amber,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Pink => "pink",
            Self::Purple => "purple",
            Self::DeepPurple => "deep_purple",
            Self::Indigo => "indigo",
            Self::Blue => "blue",
            Self::LightBlue => "light_blue",
            Self::Cyan => "cyan",
            Self::Teal => "teal",
            Self::Green => "green",
            Self::LightGreen => "light_green",
            Self::Orange => "orange",
            Self::DeepOrange => "deep_orange",
            Self::Amber => "amber",
            Self::BlueGrey => "blue_grey",
            Self::Grey => "grey",
        }
    }

    pub fn from_serialized(token: &str) -> Result<Self, RosterError> {
        let color = match token {
            "red" => Self::Red,
            "pink" => Self::Pink,
            "purple" => Self::Purple,
            "deep_purple" => Self::DeepPurple,
            "indigo" => Self::Indigo,
            "blue" => Self::Blue,
            "light_blue" => Self::LightBlue,
            "cyan" => Self::Cyan,
            "teal" => Self::Teal,
            "green" => Self::Green,
            "light_green" => Self::LightGreen,
            "orange" => Self::Orange,
            "deep_orange" => Self::DeepOrange,
            "amber" => Self::Amber,
            "blue_grey" => Self::BlueGrey,
            "grey" => Self::Grey,
            other => return Err(RosterError::UnknownColor(other.to_string())),
        };
        Ok(color)
    }

    /// Deterministic palette pick for a display name.
    ///
    /// Used by bulk recolouring: the same name always maps to the same
    /// colour, so the result can be derived from stored data alone.
    pub fn for_name(name: &str) -> Self {
        let hash = blake3::hash(name.trim().to_lowercase().as_bytes());
        let bytes = hash.as_bytes();
        let index = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        Self::PALETTE[index % Self::PALETTE.len()]
    }
}

impl std::fmt::Display for MaterialColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip() {
        for color in MaterialColor::PALETTE {
            assert_eq!(MaterialColor::from_serialized(color.as_str()).unwrap(), color);
        }
        assert_eq!(
            MaterialColor::from_serialized("blue_grey").unwrap(),
            MaterialColor::BlueGrey
        );
    }

    #[test]
    fn unknown_token_is_an_error() {
        assert_eq!(
            MaterialColor::from_serialized("ultraviolet"),
            Err(RosterError::UnknownColor("ultraviolet".into()))
        );
    }

    #[test]
    fn name_pick_is_stable_and_case_insensitive() {
        assert_eq!(MaterialColor::for_name("Alice"), MaterialColor::for_name(" alice "));
        assert!(MaterialColor::PALETTE.contains(&MaterialColor::for_name("Bob")));
    }
}
