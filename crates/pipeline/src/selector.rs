//! Answer selector: the retrieval-or-generate decision.
//!
//! # Flow
//!
//! 1. Reject blank queries with `InvalidQuery`
//! 2. Retrieve up to `k` candidates from the knowledge index
//! 3. Score the best candidate and pick a policy by tier:
//!    - **high**: return the stored answer verbatim (`direct_lookup`)
//!    - **medium**: have the model rephrase the stored answer (`augmented`)
//!    - **low** or nothing retrieved: let the model answer (`generative_fallback`),
//!      offering a low-tier candidate only as a hint
//! 4. If the model fails or times out, return the best stored answer as a
//!    `direct_lookup` with a note. With nothing retrieved, fail with
//!    `ServiceUnavailable`.

use answerdesk_config::AppConfig;
use answerdesk_core::answer::AnswerResult;
use answerdesk_core::error::{Error, ModelError, Result};
use answerdesk_core::knowledge::{KnowledgeIndex, MatchCandidate};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::generator::{Generation, Generator};
use crate::prompts::{self, ContextRole};
use crate::scorer::{ConfidenceScorer, Tier};

/// Note attached to answers served without the model.
pub const GENERATION_UNAVAILABLE: &str = "generation unavailable";

pub struct AnswerSelector {
    index: Arc<dyn KnowledgeIndex>,
    scorer: ConfidenceScorer,
    /// `None` in offline mode.
    generator: Option<Generator>,
    search_k: usize,
    default_generative_confidence: f32,
}

impl AnswerSelector {
    pub fn new(
        index: Arc<dyn KnowledgeIndex>,
        scorer: ConfidenceScorer,
        generator: Option<Generator>,
    ) -> Self {
        Self {
            index,
            scorer,
            generator,
            search_k: 3,
            default_generative_confidence: 0.3,
        }
    }

    /// Build a selector with scoring and policy taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        index: Arc<dyn KnowledgeIndex>,
        generator: Option<Generator>,
    ) -> Self {
        let generator = if config.offline { None } else { generator };
        Self::new(index, ConfidenceScorer::new(config.scoring.clone()), generator)
            .with_search_k(config.knowledge.search_k)
            .with_default_generative_confidence(config.selector.default_generative_confidence)
    }

    pub fn with_search_k(mut self, k: usize) -> Self {
        self.search_k = k.max(1);
        self
    }

    pub fn with_default_generative_confidence(mut self, confidence: f32) -> Self {
        self.default_generative_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn index(&self) -> &Arc<dyn KnowledgeIndex> {
        &self.index
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    pub fn is_offline(&self) -> bool {
        self.generator.is_none()
    }

    /// Answer a query.
    ///
    /// Model failures never surface: only `InvalidQuery` and
    /// `ServiceUnavailable` are returned as errors.
    pub async fn answer(&self, query: &str) -> Result<AnswerResult> {
        let started = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".into()));
        }

        let candidates = self.index.search(query, self.search_k).await?;
        debug!(candidates = candidates.len(), "Retrieved candidates");

        let result = match candidates.into_iter().next() {
            None => match self.generate(query, ContextRole::None).await {
                Ok(generation) => self.generative(generation),
                Err(e) => {
                    warn!(error = %e, "Nothing retrieved and generation failed");
                    return Err(Error::ServiceUnavailable(format!(
                        "no stored answer matched and generation failed: {e}"
                    )));
                }
            },
            Some(mut best) => {
                let tier = self.scorer.score(&mut best);
                debug!(
                    record_id = %best.record_id,
                    raw_score = best.raw_score,
                    confidence = best.normalized_confidence,
                    ?tier,
                    "Scored best candidate"
                );
                self.resolve(query, best, tier).await
            }
        };

        let result = result.with_processing_time(started.elapsed());
        info!(
            method = %result.method,
            confidence = result.confidence,
            record_id = result.source_record_id.as_deref().unwrap_or("-"),
            elapsed_ms = result.processing_time.as_millis() as u64,
            "Answer selected"
        );
        Ok(result)
    }

    async fn resolve(&self, query: &str, best: MatchCandidate, tier: Tier) -> AnswerResult {
        match tier {
            Tier::High => AnswerResult::direct(
                best.answer_text,
                best.normalized_confidence,
                best.record_id,
            ),
            Tier::Medium => {
                match self
                    .generate(query, ContextRole::Authoritative(&best.answer_text))
                    .await
                {
                    // Augmentation rephrases; it never raises confidence.
                    Ok(generation) => AnswerResult::augmented(
                        generation.text,
                        best.normalized_confidence,
                        best.record_id,
                    ),
                    Err(e) => Self::degraded(best, &e),
                }
            }
            Tier::Low => match self.generate(query, ContextRole::Hint(&best.answer_text)).await {
                Ok(generation) => self.generative(generation),
                Err(e) => Self::degraded(best, &e),
            },
        }
    }

    async fn generate(
        &self,
        query: &str,
        context: ContextRole<'_>,
    ) -> std::result::Result<Generation, ModelError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ModelError::NotConfigured("offline mode".into()))?;
        generator.generate(prompts::build(query, context)).await
    }

    fn generative(&self, generation: Generation) -> AnswerResult {
        let confidence = generation
            .reported_confidence
            .unwrap_or(self.default_generative_confidence);
        AnswerResult::generative(generation.text, confidence)
    }

    /// Serve the stored answer when the model cannot be used.
    fn degraded(best: MatchCandidate, error: &ModelError) -> AnswerResult {
        warn!(
            record_id = %best.record_id,
            error = %error,
            "Generation unavailable, serving stored answer"
        );
        AnswerResult::direct(best.answer_text, best.normalized_confidence, best.record_id)
            .with_note(GENERATION_UNAVAILABLE)
    }
}
