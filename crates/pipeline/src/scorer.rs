//! Maps raw similarity to a calibrated confidence and tier.
//!
//! Raw scores at or below the floor map to 0.0 and at or above the ceiling
//! to 1.0. In between, the score is interpolated linearly and then damped
//! when a very short query matched a much longer key, so one or two shared
//! words cannot look like a confident hit. For fixed query and key lengths
//! the result never decreases as the raw score grows.

use answerdesk_config::ScoringConfig;
use answerdesk_core::knowledge::MatchCandidate;
use serde::{Deserialize, Serialize};

/// Discrete confidence bucket driving the selector's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    config: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Normalize a raw similarity into `[0, 1]`.
    ///
    /// `query_terms` and `match_terms` are the normalized term counts of the
    /// query and of the key text that produced `raw_score`.
    pub fn normalize(&self, raw_score: f32, query_terms: usize, match_terms: usize) -> f32 {
        let c = &self.config;
        if !raw_score.is_finite() || raw_score <= c.floor {
            return 0.0;
        }
        if raw_score >= c.ceiling {
            return 1.0;
        }

        let linear = (raw_score - c.floor) / (c.ceiling - c.floor);
        (linear * self.length_penalty(query_terms, match_terms)).clamp(0.0, 1.0)
    }

    /// Multiplier in `[min_length_penalty, 1]` for short queries against long keys.
    fn length_penalty(&self, query_terms: usize, match_terms: usize) -> f32 {
        let c = &self.config;
        if query_terms > c.short_query_terms || match_terms == 0 {
            return 1.0;
        }
        let ratio = query_terms as f32 / match_terms as f32;
        if ratio >= c.short_query_ratio {
            return 1.0;
        }
        (ratio / c.short_query_ratio).max(c.min_length_penalty)
    }

    pub fn tier(&self, confidence: f32) -> Tier {
        if confidence >= self.config.high_threshold {
            Tier::High
        } else if confidence >= self.config.medium_threshold {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    /// Fill in `normalized_confidence` for a candidate and return its tier.
    pub fn score(&self, candidate: &mut MatchCandidate) -> Tier {
        candidate.normalized_confidence =
            self.normalize(candidate.raw_score, candidate.query_terms, candidate.matched_terms);
        self.tier(candidate.normalized_confidence)
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
