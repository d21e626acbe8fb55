//! The Answer Result handed back to callers of `answer()`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the final text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMethod {
    /// A stored answer returned verbatim
    DirectLookup,
    /// A stored answer rephrased by the language model
    Augmented,
    /// Model output with no trusted retrieved context
    GenerativeFallback,
}

impl AnswerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerMethod::DirectLookup => "direct_lookup",
            AnswerMethod::Augmented => "augmented",
            AnswerMethod::GenerativeFallback => "generative_fallback",
        }
    }
}

impl std::fmt::Display for AnswerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The selector's response.
///
/// Built only through [`AnswerResult::direct`], [`AnswerResult::augmented`]
/// and [`AnswerResult::generative`], so `source_record_id` is present exactly
/// when the method is not `generative_fallback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Final response string
    pub text: String,

    /// Confidence in `[0, 1]`
    pub confidence: f32,

    /// How `text` was produced
    pub method: AnswerMethod,

    /// The contributing record, absent for generative fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_record_id: Option<String>,

    /// Wall-clock duration of the selection, serialized as seconds
    #[serde(with = "duration_secs")]
    pub processing_time: Duration,

    /// Extra information for the caller, e.g. that generation was unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AnswerResult {
    pub fn direct(text: impl Into<String>, confidence: f32, record_id: impl Into<String>) -> Self {
        Self::build(text.into(), confidence, AnswerMethod::DirectLookup, Some(record_id.into()))
    }

    pub fn augmented(
        text: impl Into<String>,
        confidence: f32,
        record_id: impl Into<String>,
    ) -> Self {
        Self::build(text.into(), confidence, AnswerMethod::Augmented, Some(record_id.into()))
    }

    pub fn generative(text: impl Into<String>, confidence: f32) -> Self {
        Self::build(text.into(), confidence, AnswerMethod::GenerativeFallback, None)
    }

    fn build(text: String, confidence: f32, method: AnswerMethod, source: Option<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            text,
            confidence,
            method,
            source_record_id: source,
            processing_time: Duration::ZERO,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_processing_time(mut self, elapsed: Duration) -> Self {
        self.processing_time = elapsed;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
