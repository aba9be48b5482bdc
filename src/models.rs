//! Core data models used throughout qa-chat.
//!
//! These types represent the conversation turns and sample Q&A records held
//! by the [`Store`](crate::store::Store) and rendered by the pages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User feedback attached to a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Positive,
    Negative,
    #[default]
    None,
}

impl Feedback {
    pub const ALL: [Feedback; 3] = [Feedback::Positive, Feedback::Negative, Feedback::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Positive => "positive",
            Feedback::Negative => "negative",
            Feedback::None => "none",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "good" | "+" => Ok(Feedback::Positive),
            "negative" | "bad" | "-" => Ok(Feedback::Negative),
            "none" | "" => Ok(Feedback::None),
            other => Err(format!(
                "invalid feedback '{}': expected positive, negative, or none",
                other
            )),
        }
    }
}

/// One question/answer exchange stored after a successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub feedback: Feedback,
    /// Unix seconds.
    pub created_at: i64,
}

/// A baseline question with its reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRecord {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

/// Number of turns carrying each feedback value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackCounts {
    pub positive: i64,
    pub negative: i64,
    pub none: i64,
}

impl FeedbackCounts {
    pub fn total(&self) -> i64 {
        self.positive + self.negative + self.none
    }

    /// Share of rated turns that were positive, `None` when nothing is rated yet.
    pub fn positive_rate(&self) -> Option<f64> {
        let rated = self.positive + self.negative;
        if rated == 0 {
            None
        } else {
            Some(self.positive as f64 / rated as f64)
        }
    }
}
