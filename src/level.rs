use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Membership tiers recognised by the roster.
///
/// The set is closed: text that does not name one of these variants is
/// never coerced into a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipLevel {
    Bush,
    Eisenhower,
    Lincoln,
    Reagan,
    Roosevelt,
    Family,
    Individual,
    Student,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown membership level '{0}'")]
pub struct UnknownLevel(pub String);

impl MembershipLevel {
    /// Vocabulary order, which is also the seeding order of the lookup table.
    pub const ALL: [MembershipLevel; 8] = [
        MembershipLevel::Bush,
        MembershipLevel::Eisenhower,
        MembershipLevel::Lincoln,
        MembershipLevel::Reagan,
        MembershipLevel::Roosevelt,
        MembershipLevel::Family,
        MembershipLevel::Individual,
        MembershipLevel::Student,
    ];

    /// Match a single word against the vocabulary (case-insensitive).
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_lowercase().as_str() {
            "bush" => Some(MembershipLevel::Bush),
            "eisenhower" => Some(MembershipLevel::Eisenhower),
            "lincoln" => Some(MembershipLevel::Lincoln),
            "reagan" => Some(MembershipLevel::Reagan),
            "roosevelt" => Some(MembershipLevel::Roosevelt),
            "family" => Some(MembershipLevel::Family),
            "individual" => Some(MembershipLevel::Individual),
            "student" => Some(MembershipLevel::Student),
            _ => None,
        }
    }

    /// Stored/display form of the level. Named-donor tiers are capitalised,
    /// the generic ones lowercase.
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipLevel::Bush => "Bush",
            MembershipLevel::Eisenhower => "Eisenhower",
            MembershipLevel::Lincoln => "Lincoln",
            MembershipLevel::Reagan => "Reagan",
            MembershipLevel::Roosevelt => "Roosevelt",
            MembershipLevel::Family => "family",
            MembershipLevel::Individual => "individual",
            MembershipLevel::Student => "student",
        }
    }
}

impl fmt::Display for MembershipLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_word(s).ok_or_else(|| UnknownLevel(s.trim().to_string()))
    }
}

impl Serialize for MembershipLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
