//! Feedback categories: the tone of the transient message to show.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Which pool a feedback message is drawn from.
///
/// Categories are mutually exclusive. `Neutral` never yields a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackCategory {
    #[default]
    Neutral,
    Positive,
    Negative,
}

impl FeedbackCategory {
    /// Categories that carry a message pool.
    pub const WITH_POOLS: [Self; 2] = [Self::Positive, Self::Negative];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(format!(
                "unknown feedback category '{other}' (expected neutral, positive, or negative)"
            )),
        }
    }
}
