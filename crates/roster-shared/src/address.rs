//! Recipient addresses and the plausibility checks used before offering a
//! free-text filter as a "new number" entry.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RosterError;

/// Which of the three mutually exclusive address columns a recipient uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Phone,
    Email,
    Group,
}

impl AddressKind {
    /// Column holding this kind of address in the `recipient` table.
    pub fn column(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Group => "group_id",
        }
    }

    /// Normalize a raw address of this kind.
    ///
    /// Phone numbers lose their visual separators; emails and group tokens
    /// are only trimmed. An address that is empty afterwards is rejected.
    pub fn normalize(self, raw: &str) -> Result<String, RosterError> {
        let normalized: String = match self {
            Self::Phone => raw
                .trim()
                .chars()
                .filter(|c| !is_visual_separator(*c))
                .collect(),
            Self::Email | Self::Group => raw.trim().to_string(),
        };

        if normalized.is_empty() {
            return Err(RosterError::InvalidInput(format!(
                "{} address cannot be empty",
                self.column()
            )));
        }
        Ok(normalized)
    }
}

impl std::str::FromStr for AddressKind {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            "group" => Ok(Self::Group),
            other => Err(RosterError::InvalidInput(format!("unknown address kind: {other}"))),
        }
    }
}

/// A recipient's primary address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Address {
    Phone(String),
    Email(String),
    Group(String),
}

impl Address {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Phone(v) | Self::Email(v) | Self::Group(v) => v,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_visual_separator(c: char) -> bool {
    matches!(c, ' ' | '-' | '(' | ')' | '.')
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
            .expect("email pattern is valid")
    })
}

/// True when `text` looks like an address an SMS could be sent to.
pub fn is_valid_sms_number(text: &str) -> bool {
    let stripped: String = text
        .trim()
        .chars()
        .filter(|c| !is_visual_separator(*c))
        .collect();

    let dial = stripped.strip_prefix('+').unwrap_or(&stripped);
    if dial.len() < 3 || dial.len() > 20 {
        return false;
    }

    dial.chars().all(|c| c.is_ascii_digit() || c == '*' || c == '#')
        && dial.chars().filter(char::is_ascii_digit).count() >= 3
}

pub fn is_valid_email(text: &str) -> bool {
    email_regex().is_match(text.trim())
}

/// True when `text` could be messaged directly even though no recipient
/// exists for it yet.
pub fn is_valid_sms_or_email(text: &str) -> bool {
    is_valid_sms_number(text) || is_valid_email(text)
}
