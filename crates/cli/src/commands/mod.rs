pub mod ask;
pub mod doctor;
pub mod feedback;
pub mod import;
pub mod onboard;
pub mod serve;
pub mod stats;

use std::sync::Arc;

use answerdesk_config::AppConfig;
use answerdesk_core::knowledge::{KnowledgeIndex, WeightBounds};
use answerdesk_knowledge::{FileIndex, ImportReport, InMemoryIndex, corpus};
use answerdesk_pipeline::{AnswerSelector, ConfidenceScorer, FeedbackRecorder, Generator};
use tracing::{info, warn};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs to answer and learn.
pub struct Pipeline {
    pub config: AppConfig,
    pub index: Arc<dyn KnowledgeIndex>,
    pub selector: Arc<AnswerSelector>,
    pub feedback: Arc<FeedbackRecorder>,
}

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The snapshot-backed index when a snapshot is configured, otherwise an
/// in-memory one.
pub async fn open_index(
    config: &AppConfig,
) -> Result<Arc<dyn KnowledgeIndex>, Box<dyn std::error::Error>> {
    let bounds = WeightBounds::new(config.feedback.min_weight, config.feedback.max_weight);
    Ok(match config.knowledge.resolved_snapshot_path() {
        Some(path) => Arc::new(FileIndex::open(path, bounds).await?),
        None => Arc::new(InMemoryIndex::with_bounds(bounds)),
    })
}

/// Import every configured corpus file.
///
/// Existing records are kept, so weights learned into a snapshot survive
/// a restart with the same corpus.
pub async fn load_corpus(
    config: &AppConfig,
    index: &dyn KnowledgeIndex,
) -> Result<ImportReport, Box<dyn std::error::Error>> {
    let mut total = ImportReport::default();
    for path in config.knowledge.resolved_corpus_paths() {
        let load = corpus::load_file(&path)?;
        let report = corpus::import(index, load.records, false).await?;
        total.inserted += report.inserted;
        total.duplicates += report.duplicates;
        total.invalid += report.invalid + load.skipped;
    }
    Ok(total)
}

/// The generator for the default provider, or `None` in offline mode.
pub fn build_generator(config: &AppConfig) -> Option<Generator> {
    if config.offline {
        return None;
    }
    let router = answerdesk_providers::build_from_config(config);
    let provider = router.default()?;
    let model = answerdesk_providers::router::default_model(config);
    Some(Generator::from_config(config, provider, model))
}

/// Load the corpus and wire the selector and recorder over one index.
pub async fn build_pipeline(config: AppConfig) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let index = open_index(&config).await?;
    let report = load_corpus(&config, index.as_ref()).await?;
    info!(
        backend = index.name(),
        records = index.count().await,
        inserted = report.inserted,
        duplicates = report.duplicates,
        invalid = report.invalid,
        "Knowledge loaded"
    );

    let generator = build_generator(&config);
    let selector = Arc::new(AnswerSelector::from_config(&config, index.clone(), generator));
    let feedback = Arc::new(FeedbackRecorder::from_config(
        &config.feedback,
        index.clone(),
        ConfidenceScorer::new(config.scoring.clone()),
    ));
    if let Err(e) = feedback.restore_stats().await {
        warn!(error = %e, "Feedback archive unreadable; learning stats start at zero");
    }

    Ok(Pipeline {
        config,
        index,
        selector,
        feedback,
    })
}
