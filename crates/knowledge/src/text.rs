//! Text normalization and term-weighted similarity.
//!
//! Pure functions, no I/O. The index keeps document frequencies up to date
//! and hands them to [`idf_cosine`] at query time.

use std::collections::{BTreeSet, HashMap};

/// English stop words plus help-desk filler that carries no topical signal.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "out", "over", "own", "please", "same", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "university", "until", "up", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "you", "your", "yours",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Light suffix stemming: `ies` -> `y`, trailing plural `s` dropped.
fn stem(word: &str) -> String {
    if word.len() > 4 {
        if let Some(root) = word.strip_suffix("ies") {
            return format!("{root}y");
        }
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Normalize text into its set of distinct terms.
///
/// Lowercases, replaces every non-alphanumeric character with a separator,
/// drops stop words, then stems.
pub fn terms(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !is_stop_word(w))
        .map(stem)
        .collect()
}

/// Smoothed inverse document frequency.
///
/// A term unseen in the corpus gets the maximum weight, so unmatched query
/// words pull the similarity down.
pub fn idf(doc_freq: usize, total_docs: usize) -> f32 {
    (((1 + total_docs) as f32) / ((1 + doc_freq) as f32)).ln() + 1.0
}

/// Cosine similarity between two term sets, each term weighted by its IDF.
///
/// Returns a value in `[0, 1]`; 0.0 when either side is empty.
pub fn idf_cosine(
    query: &BTreeSet<String>,
    key: &BTreeSet<String>,
    doc_freq: &HashMap<String, usize>,
    total_docs: usize,
) -> f32 {
    if query.is_empty() || key.is_empty() {
        return 0.0;
    }

    let weight = |t: &String| {
        let w = idf(doc_freq.get(t).copied().unwrap_or(0), total_docs);
        w * w
    };

    let dot: f32 = query.intersection(key).map(weight).sum();
    if dot == 0.0 {
        return 0.0;
    }

    let norm_q: f32 = query.iter().map(weight).sum::<f32>().sqrt();
    let norm_k: f32 = key.iter().map(weight).sum::<f32>().sqrt();
    let denom = norm_q * norm_k;
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom).clamp(0.0, 1.0)
}
