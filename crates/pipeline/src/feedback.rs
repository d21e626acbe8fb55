//! Feedback recorder: turns likes and dislikes into record weights.
//!
//! Resolution order for the rated answer:
//!
//! 1. the `source_record_id` carried with the event, if that record still exists
//! 2. a record whose stored answer equals the rated answer text
//! 3. a fresh lookup of the question, accepted only at medium tier or better
//!
//! Unresolvable feedback is logged and counted, never an error.

use answerdesk_config::FeedbackConfig;
use answerdesk_core::feedback::{FeedbackEvent, Rating};
use answerdesk_core::knowledge::KnowledgeIndex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::scorer::{ConfidenceScorer, Tier};

/// Instance-scoped learning counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total: u64,
    pub positive: u64,
    pub negative: u64,
    pub unresolved: u64,
}

/// What happened to one feedback event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_weight: Option<f32>,
}

#[derive(Serialize)]
struct ArchivedEvent<'a> {
    #[serde(flatten)]
    event: &'a FeedbackEvent,
    resolved_record_id: Option<&'a str>,
}

/// The parts of an archived event needed to rebuild the counters.
#[derive(Deserialize)]
struct ArchivedOutcome {
    rating: Rating,
    #[serde(default)]
    resolved_record_id: Option<String>,
}

impl LearningStats {
    fn count(&mut self, rating: Rating, resolved: bool) {
        self.total += 1;
        match rating {
            Rating::Positive => self.positive += 1,
            Rating::Negative => self.negative += 1,
        }
        if !resolved {
            self.unresolved += 1;
        }
    }
}

pub struct FeedbackRecorder {
    index: Arc<dyn KnowledgeIndex>,
    scorer: ConfidenceScorer,
    delta: f32,
    stats: RwLock<LearningStats>,
    archive_path: Option<PathBuf>,
}

impl FeedbackRecorder {
    pub fn new(index: Arc<dyn KnowledgeIndex>, scorer: ConfidenceScorer, delta: f32) -> Self {
        Self {
            index,
            scorer,
            delta,
            stats: RwLock::new(LearningStats::default()),
            archive_path: None,
        }
    }

    pub fn from_config(
        config: &FeedbackConfig,
        index: Arc<dyn KnowledgeIndex>,
        scorer: ConfidenceScorer,
    ) -> Self {
        let recorder = Self::new(index, scorer, config.delta);
        match config.resolved_archive_path() {
            Some(path) => recorder.with_archive(path),
            None => recorder,
        }
    }

    /// Append every event to a JSONL archive.
    pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    /// Rebuild the counters from the archive written by earlier runs.
    ///
    /// Weights are already persisted by the index; only the counters are
    /// restored. A missing archive is not an error. Returns the number of
    /// events replayed.
    pub async fn restore_stats(&self) -> std::io::Result<u64> {
        let Some(path) = &self.archive_path else {
            return Ok(0);
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut restored = LearningStats::default();
        for (n, line) in bytes.split(|b| *b == b'\n').enumerate() {
            if line.trim_ascii().is_empty() {
                continue;
            }
            match serde_json::from_slice::<ArchivedOutcome>(line) {
                Ok(event) => restored.count(event.rating, event.resolved_record_id.is_some()),
                Err(e) => warn!(line = n + 1, error = %e, "Skipping malformed archive line"),
            }
        }

        let replayed = restored.total;
        *self.stats.write().await = restored;
        info!(path = %path.display(), events = replayed, "Learning stats restored");
        Ok(replayed)
    }

    /// Apply one feedback event. Best effort: never fails.
    pub async fn record(&self, event: FeedbackEvent) -> FeedbackOutcome {
        let mut outcome = FeedbackOutcome::default();

        if let Some(record_id) = self.resolve(&event).await {
            let delta = event.rating.signed(self.delta);
            match self.index.adjust_weight(&record_id, delta).await {
                Ok(weight) => {
                    info!(
                        record_id = %record_id,
                        rating = ?event.rating,
                        new_weight = weight,
                        "Feedback applied"
                    );
                    outcome.resolved_record_id = Some(record_id);
                    outcome.new_weight = Some(weight);
                }
                Err(e) => warn!(record_id = %record_id, error = %e, "Feedback not applied"),
            }
        }

        if outcome.resolved_record_id.is_none() {
            info!(rating = ?event.rating, "Feedback could not be tied to a record; ignored");
        }

        self.stats
            .write()
            .await
            .count(event.rating, outcome.resolved_record_id.is_some());

        self.archive(&event, outcome.resolved_record_id.as_deref())
            .await;
        outcome
    }

    async fn resolve(&self, event: &FeedbackEvent) -> Option<String> {
        if let Some(id) = event.source_record_id.as_deref().filter(|id| !id.trim().is_empty()) {
            if self.index.get(id).await.is_some() {
                return Some(id.to_string());
            }
            debug!(record_id = %id, "Carried record id no longer exists");
        }

        if let Some(record) = self.index.find_by_answer(&event.answer_text).await {
            return Some(record.id);
        }

        if event.question_text.trim().is_empty() {
            return None;
        }
        let mut best = self
            .index
            .search(&event.question_text, 1)
            .await
            .ok()?
            .into_iter()
            .next()?;
        match self.scorer.score(&mut best) {
            Tier::High | Tier::Medium => Some(best.record_id),
            Tier::Low => None,
        }
    }

    async fn archive(&self, event: &FeedbackEvent, resolved: Option<&str>) {
        let Some(path) = &self.archive_path else {
            return;
        };
        let mut line = match serde_json::to_vec(&ArchivedEvent {
            event,
            resolved_record_id: resolved,
        }) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize feedback event");
                return;
            }
        };
        line.push(b'\n');

        if let Err(e) = append(path, &line).await {
            warn!(path = %path.display(), error = %e, "Failed to archive feedback event");
        }
    }

    pub async fn stats(&self) -> LearningStats {
        self.stats.read().await.clone()
    }
}

async fn append(path: &std::path::Path, line: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line).await
}
