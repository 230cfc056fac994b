//! Importance tiers
//!
//! The four tiers a message can be filed under, and the single place
//! where a numeric oracle score is turned into a tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Score the oracle uses to denote a scam.
pub const SCAM_SCORE: f64 = -1.0;

const MOST_IMPORTANT_ABOVE: f64 = 0.75;
const MEDIUM_IMPORTANT_ABOVE: f64 = 0.4;

/// A triage decision for one message.
///
/// The string forms (`least_important`, ...) are what the cache
/// persists, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceLevel {
    LeastImportant,
    MediumImportant,
    MostImportant,
    /// Terminal override, outside the 0..1 importance scale.
    Scam,
}

impl ImportanceLevel {
    pub const ALL: [Self; 4] = [
        Self::LeastImportant,
        Self::MediumImportant,
        Self::MostImportant,
        Self::Scam,
    ];

    /// The persisted string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeastImportant => "least_important",
            Self::MediumImportant => "medium_important",
            Self::MostImportant => "most_important",
            Self::Scam => "scam",
        }
    }

    /// Map an importance score to a tier.
    ///
    /// Thresholds are strict: `0.75` is medium, `0.4` is least.
    /// Callers are expected to have discarded inconclusive scores
    /// (`<= 0` other than the scam score) beforehand.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn from_score(score: f64) -> Self {
        if score == SCAM_SCORE {
            Self::Scam
        } else if score > MOST_IMPORTANT_ABOVE {
            Self::MostImportant
        } else if score > MEDIUM_IMPORTANT_ABOVE {
            Self::MediumImportant
        } else {
            Self::LeastImportant
        }
    }
}

impl fmt::Display for ImportanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored value is not one of the four tiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown importance level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for ImportanceLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}
