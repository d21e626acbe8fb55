//! Knowledge records, match candidates and the index trait that looks them up.
//!
//! The index exclusively owns every [`KnowledgeRecord`]. Other components
//! only ever see snapshots ([`MatchCandidate`], cloned records) and mutate
//! through the trait: `upsert`, `adjust_weight`, `delete`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::IndexError;

/// Namespace for deterministic record ids derived from their content.
const RECORD_ID_NAMESPACE: uuid::Uuid =
    uuid::Uuid::from_u128(0x6a1d_4c0e_93b2_4f57_8e1a_2d5c_7b90_f3e4);

/// A single question/answer (or topic/fact) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Stable unique identifier
    pub id: String,

    /// Short text used as the matching key
    #[serde(alias = "question", alias = "topic")]
    pub question_or_topic: String,

    /// The canonical response body
    #[serde(alias = "answer")]
    pub answer_text: String,

    /// Free-form label (e.g., "admissions", "fees")
    #[serde(default = "default_category")]
    pub category: String,

    /// Feedback-adjusted score; only used to break ties between equally similar records
    #[serde(default = "default_weight")]
    pub weight: f32,

    /// Alternate phrasings of the matching key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variations: Vec<String>,

    /// Where the record came from (file name, "api", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// When this record was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// When this record was last edited or re-weighted
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_category() -> String {
    "general".into()
}

fn default_weight() -> f32 {
    1.0
}

impl KnowledgeRecord {
    /// Create a record with the default weight and a content-derived id.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let question = question.into();
        let answer = answer.into();
        let now = Utc::now();
        Self {
            id: Self::derive_id(&question, &answer),
            question_or_topic: question,
            answer_text: answer,
            category: category.into(),
            weight: default_weight(),
            variations: Vec::new(),
            source: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach alternate phrasings.
    pub fn with_variations(mut self, variations: Vec<String>) -> Self {
        self.variations = variations;
        self
    }

    /// Deterministic id (UUIDv5) for a question/answer pair.
    ///
    /// Re-importing the same corpus yields the same ids, so feedback that
    /// carries a `source_record_id` stays resolvable across restarts.
    pub fn derive_id(question: &str, answer: &str) -> String {
        let key = format!("{}\u{1f}{}", question.trim(), answer.trim());
        uuid::Uuid::new_v5(&RECORD_ID_NAMESPACE, key.as_bytes()).to_string()
    }

    /// Check the structural invariants a record must satisfy before it is stored.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.id.trim().is_empty() {
            return Err(IndexError::InvalidRecord("id must not be empty".into()));
        }
        if self.question_or_topic.trim().is_empty() {
            return Err(IndexError::InvalidRecord(format!(
                "record '{}' has an empty question",
                self.id
            )));
        }
        if self.answer_text.trim().is_empty() {
            return Err(IndexError::InvalidRecord(format!(
                "record '{}' has an empty answer",
                self.id
            )));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(IndexError::InvalidRecord(format!(
                "record '{}' has invalid weight {}",
                self.id, self.weight
            )));
        }
        Ok(())
    }
}

/// Lower and upper clamp for record weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub min: f32,
    pub max: f32,
}

impl WeightBounds {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, weight: f32) -> f32 {
        weight.clamp(self.min, self.max)
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self { min: 0.1, max: 10.0 }
    }
}

/// A ranked lookup hit. Ephemeral: never persisted, never owns the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Weak reference to the matched record
    pub record_id: String,

    /// Similarity from the matching algorithm
    pub raw_score: f32,

    /// Confidence in `[0, 1]`; zero until a scorer fills it in
    #[serde(default)]
    pub normalized_confidence: f32,

    /// The key text (question or variation) that produced the best score
    pub matched_text: String,

    /// Number of normalized terms in the query
    pub query_terms: usize,

    /// Number of normalized terms in `matched_text`
    pub matched_terms: usize,

    /// Snapshot of the record's answer at search time
    pub answer_text: String,

    /// Snapshot of the record's category
    pub category: String,

    /// Snapshot of the record's weight
    pub weight: f32,
}

/// Aggregate counts over the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_records: usize,
    pub categories: BTreeMap<String, usize>,
}

impl IndexStats {
    pub fn from_records(records: &[KnowledgeRecord]) -> Self {
        let mut categories = BTreeMap::new();
        for record in records {
            *categories.entry(record.category.clone()).or_insert(0) += 1;
        }
        Self {
            total_records: records.len(),
            categories,
        }
    }
}

/// Outcome of a batch upsert.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// The core KnowledgeIndex trait.
///
/// `search` must be safe for concurrent readers; mutations are serialized
/// against each other and against readers, and a completed `adjust_weight`
/// is visible to every search issued after it.
///
/// Implementations: in-memory, file-backed JSONL snapshot.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Up to `k` candidates, highest `raw_score` first.
    ///
    /// Ties prefer the higher weight, then the most recently added record.
    /// Fails with [`IndexError::InvalidQuery`] for a blank query or `k == 0`.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<MatchCandidate>, IndexError>;

    /// Insert a record, or replace an existing one when `overwrite` is set.
    async fn upsert(&self, record: KnowledgeRecord, overwrite: bool) -> Result<(), IndexError>;

    /// Insert many records as one mutation.
    ///
    /// Duplicate and invalid records are counted, not fatal. Persistent
    /// backends write once for the whole batch.
    async fn upsert_many(
        &self,
        records: Vec<KnowledgeRecord>,
        overwrite: bool,
    ) -> Result<ImportReport, IndexError> {
        let mut report = ImportReport::default();
        for record in records {
            match self.upsert(record, overwrite).await {
                Ok(()) => report.inserted += 1,
                Err(IndexError::DuplicateId(_)) => report.duplicates += 1,
                Err(IndexError::InvalidRecord(_)) => report.invalid += 1,
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Add `delta` to a record's weight, clamped to the index's bounds.
    ///
    /// Returns the new weight. An unknown id is a logged no-op reported as
    /// [`IndexError::UnknownId`].
    async fn adjust_weight(&self, record_id: &str, delta: f32) -> Result<f32, IndexError>;

    /// Get a record by id.
    async fn get(&self, id: &str) -> Option<KnowledgeRecord>;

    /// Find the record whose answer text equals `answer_text` (trimmed).
    async fn find_by_answer(&self, answer_text: &str) -> Option<KnowledgeRecord>;

    /// All records, optionally restricted to one category, oldest first.
    async fn list(&self, category: Option<&str>) -> Vec<KnowledgeRecord>;

    /// Explicit administrative deletion. Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, IndexError>;

    /// Total record count.
    async fn count(&self) -> usize;

    /// Per-category statistics.
    async fn stats(&self) -> IndexStats {
        IndexStats::from_records(&self.list(None).await)
    }
}
