//! # answerdesk core
//!
//! Domain types, traits, and error definitions for the answerdesk
//! retrieval-and-fallback pipeline. This crate has **no framework
//! dependencies**: it defines the model every other crate implements against.
//!
//! ## Layout
//!
//! - [`knowledge`]: Knowledge Records, Match Candidates and the
//!   [`KnowledgeIndex`] trait that owns them.
//! - [`answer`]: the Answer Result handed back to callers.
//! - [`feedback`]: like/dislike events tied to a prior answer.
//! - [`provider`]: the language-model collaborator, consumed as an opaque service.
//! - [`error`]: the error taxonomy shared by all crates.

pub mod answer;
pub mod error;
pub mod feedback;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use answer::{AnswerMethod, AnswerResult};
pub use error::{Error, IndexError, ModelError, Result};
pub use feedback::{FeedbackEvent, Rating};
pub use knowledge::{
    ImportReport, IndexStats, KnowledgeIndex, KnowledgeRecord, MatchCandidate, WeightBounds,
};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
