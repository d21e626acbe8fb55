//! Feedback events: a like or dislike tied to a previously served answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's verdict on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    #[serde(alias = "like", alias = "up")]
    Positive,
    #[serde(alias = "dislike", alias = "down")]
    Negative,
}

impl Rating {
    /// `+delta` for positive, `-delta` for negative.
    pub fn signed(&self, delta: f32) -> f32 {
        match self {
            Rating::Positive => delta,
            Rating::Negative => -delta,
        }
    }
}

impl std::str::FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "like" | "up" => Ok(Rating::Positive),
            "negative" | "dislike" | "down" => Ok(Rating::Negative),
            other => Err(format!("unknown rating '{other}' (expected positive or negative)")),
        }
    }
}

/// One feedback submission. Consumed immediately by the recorder, then
/// optionally archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub question_text: String,
    pub answer_text: String,
    pub rating: Rating,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Carried alongside the event when the caller still knows which record answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_record_id: Option<String>,
}

impl FeedbackEvent {
    pub fn new(question: impl Into<String>, answer: impl Into<String>, rating: Rating) -> Self {
        Self {
            question_text: question.into(),
            answer_text: answer.into(),
            rating,
            timestamp: Utc::now(),
            source_record_id: None,
        }
    }

    pub fn with_source(mut self, record_id: impl Into<String>) -> Self {
        self.source_record_id = Some(record_id.into());
        self
    }
}
