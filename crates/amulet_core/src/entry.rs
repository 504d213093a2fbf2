use std::fmt;

use chrono::{DateTime, Utc};

/// Ordinal strength of a match, from `Common` (1) up to `Beyond` (7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rarity(u8);

impl Rarity {
    pub const MIN: Rarity = Rarity(1);
    pub const MAX: Rarity = Rarity(7);

    pub const COMMON: Rarity = Rarity(1);
    pub const UNCOMMON: Rarity = Rarity(2);
    pub const RARE: Rarity = Rarity(3);
    pub const EPIC: Rarity = Rarity(4);
    pub const LEGENDARY: Rarity = Rarity(5);
    pub const MYTHIC: Rarity = Rarity(6);
    pub const BEYOND: Rarity = Rarity(7);

    /// Returns `None` for values outside `1..=7`.
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Single-character label used by the text renderer.
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "C",
            2 => "U",
            3 => "R",
            4 => "E",
            5 => "L",
            6 => "M",
            _ => "?",
        }
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "common",
            2 => "uncommon",
            3 => "rare",
            4 => "epic",
            5 => "legendary",
            6 => "mythic",
            _ => "beyond",
        }
    }
}

impl Default for Rarity {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl TryFrom<i64> for Rarity {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Rarity::new)
            .ok_or(value)
    }
}

/// One classified match. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub text: String,
    pub rarity: Rarity,
    pub observed_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(text: impl Into<String>, rarity: Rarity, observed_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            rarity,
            observed_at,
        }
    }
}
