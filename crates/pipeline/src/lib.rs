//! The retrieval-and-fallback pipeline.
//!
//! A query flows through the [`AnswerSelector`]: the knowledge index returns
//! candidates, the [`ConfidenceScorer`] calibrates the best one, and the
//! selector either serves the stored answer, has the model rephrase it, or
//! lets the model answer on its own. Feedback on served answers goes to the
//! [`FeedbackRecorder`], which nudges record weights.

pub mod feedback;
pub mod generator;
pub mod prompts;
pub mod scorer;
pub mod selector;
pub mod session;

pub use feedback::{FeedbackOutcome, FeedbackRecorder, LearningStats};
pub use generator::{Generation, Generator};
pub use scorer::{ConfidenceScorer, Tier};
pub use selector::{AnswerSelector, GENERATION_UNAVAILABLE};
pub use session::{SessionRegistry, SessionStats};

#[cfg(test)]
pub(crate) mod test_helpers;
