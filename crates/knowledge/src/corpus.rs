//! Corpus loader for JSON and JSONL files.
//!
//! Accepted shapes:
//! - a JSON array of `{question, answer, category | categories, weight?, id?,
//!   question_variations?, keywords?}` objects;
//! - JSONL, one object per line, either the same shape or an instruction
//!   dataset line `{instruction, output}`.
//!
//! Entries missing a question or answer are skipped with a warning. An
//! unreadable or structurally invalid file is an error.

use answerdesk_core::error::IndexError;
use answerdesk_core::knowledge::{ImportReport, KnowledgeIndex, KnowledgeRecord};
use chrono::Utc;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "instruction", alias = "topic")]
    question: Option<String>,
    #[serde(default, alias = "output")]
    answer: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    weight: Option<f32>,
    #[serde(default, alias = "variations")]
    question_variations: Vec<String>,
}

/// Outcome of reading one corpus file.
#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub records: Vec<KnowledgeRecord>,
    pub skipped: usize,
}

/// Keyword families used to label records that arrive without a category.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("fees", &["fee", "tuition", "cost", "price", "payment"]),
    ("admission", &["admission", "requirement", "apply", "enrollment", "deadline"]),
    ("programs", &["program", "course", "department", "cse", "bba", "engineering"]),
    ("contact", &["contact", "phone", "email", "address", "location"]),
    ("facilities", &["facility", "library", "lab", "hostel", "cafeteria", "wifi"]),
    ("scholarships", &["scholarship", "merit", "financial aid"]),
    ("activities", &["club", "society", "extracurricular", "sports"]),
];

/// Pick a category from the first keyword family mentioned in the text.
pub fn auto_categorize(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or("general")
}

impl RawEntry {
    fn into_record(self, source: &str) -> Option<KnowledgeRecord> {
        let question = self.question.filter(|q| !q.trim().is_empty())?;
        let answer = self.answer.filter(|a| !a.trim().is_empty())?;

        let category = self
            .category
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.categories.into_iter().find(|c| !c.trim().is_empty()))
            .unwrap_or_else(|| {
                let hint = format!("{} {}", question, self.keywords.join(" "));
                auto_categorize(&hint).to_string()
            });

        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| KnowledgeRecord::derive_id(&question, &answer));

        let now = Utc::now();
        Some(KnowledgeRecord {
            id,
            question_or_topic: question,
            answer_text: answer,
            category,
            weight: self.weight.unwrap_or(1.0),
            variations: self.question_variations,
            source: Some(source.to_string()),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Read a corpus file.
///
/// `.jsonl` files are read line by line; anything else must be a JSON array.
pub fn load_file(path: &Path) -> Result<CorpusLoad, IndexError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        IndexError::Storage(format!("Failed to read corpus {}: {e}", path.display()))
    })?;

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let is_jsonl = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

    let load = if is_jsonl {
        parse_jsonl(&content, &source)
    } else {
        parse_json_array(&content, &source)?
    };

    info!(
        path = %path.display(),
        records = load.records.len(),
        skipped = load.skipped,
        "Corpus loaded"
    );
    Ok(load)
}

/// Parse a JSON array of entries.
pub fn parse_json_array(content: &str, source: &str) -> Result<CorpusLoad, IndexError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(content)
        .map_err(|e| IndexError::Storage(format!("{source} is not a JSON array: {e}")))?;

    let mut load = CorpusLoad::default();
    for (n, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawEntry>(value)
            .ok()
            .and_then(|raw| raw.into_record(source))
        {
            Some(record) => load.records.push(record),
            None => {
                warn!(source, entry = n, "Skipping entry without question and answer");
                load.skipped += 1;
            }
        }
    }
    Ok(load)
}

/// Parse JSON-lines content, skipping malformed lines.
pub fn parse_jsonl(content: &str, source: &str) -> CorpusLoad {
    let mut load = CorpusLoad::default();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawEntry>(line) {
            Ok(raw) => match raw.into_record(source) {
                Some(record) => load.records.push(record),
                None => {
                    warn!(source, line = n + 1, "Skipping line without question and answer");
                    load.skipped += 1;
                }
            },
            Err(e) => {
                warn!(source, line = n + 1, error = %e, "Skipping malformed line");
                load.skipped += 1;
            }
        }
    }
    load
}

/// Upsert records into an index as one batch, counting duplicates and
/// invalid records instead of failing.
pub async fn import(
    index: &dyn KnowledgeIndex,
    records: Vec<KnowledgeRecord>,
    overwrite: bool,
) -> Result<ImportReport, IndexError> {
    let total = records.len();
    let report = index.upsert_many(records, overwrite).await?;
    info!(
        backend = index.name(),
        total,
        inserted = report.inserted,
        duplicates = report.duplicates,
        invalid = report.invalid,
        "Corpus imported"
    );
    Ok(report)
}
