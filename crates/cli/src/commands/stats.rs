//! `answerdesk stats` — Knowledge statistics.

use super::CommandResult;

pub async fn run() -> CommandResult {
    let config = super::load_config()?;
    let index = super::open_index(&config).await?;
    let report = super::load_corpus(&config, index.as_ref()).await?;
    let stats = index.stats().await;

    println!("📊 Knowledge Statistics");
    println!("=======================");
    println!("  Backend:     {}", index.name());
    if let Some(path) = config.knowledge.resolved_snapshot_path() {
        println!("  Snapshot:    {}", path.display());
    }
    println!("  Corpus:      {} file(s)", config.knowledge.corpus_paths.len());
    if report.invalid > 0 {
        println!("  Skipped:     {} invalid entries", report.invalid);
    }
    println!("  Records:     {}", stats.total_records);

    if !stats.categories.is_empty() {
        println!("\n  By category:");
        for (category, count) in &stats.categories {
            println!("    {category:<16} {count}");
        }
    }

    Ok(())
}
