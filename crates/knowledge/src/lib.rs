//! Knowledge index implementations for answerdesk.
//!
//! - [`InMemoryIndex`]: records held in memory behind a read-write lock.
//! - [`FileIndex`]: the same index persisted to a JSONL snapshot.
//! - [`corpus`]: loading records from JSON and JSONL files.
//! - [`text`]: normalization and IDF-weighted cosine similarity.

pub mod corpus;
pub mod file_index;
pub mod index;
pub mod text;

pub use answerdesk_core::knowledge::ImportReport;
pub use corpus::CorpusLoad;
pub use file_index::FileIndex;
pub use index::InMemoryIndex;
