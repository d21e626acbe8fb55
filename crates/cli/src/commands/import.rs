//! `answerdesk import` — Load a corpus file into the knowledge snapshot.

use std::path::Path;

use answerdesk_knowledge::corpus;

use super::CommandResult;

pub async fn run(file: &Path, overwrite: bool) -> CommandResult {
    let config = super::load_config()?;
    let Some(snapshot) = config.knowledge.resolved_snapshot_path() else {
        return Err(
            "knowledge.snapshot_path is not set; add it to config.toml so imports persist".into(),
        );
    };

    let index = super::open_index(&config).await?;
    let before = index.count().await;

    let load = corpus::load_file(file)?;
    let report = corpus::import(index.as_ref(), load.records, overwrite).await?;

    println!("📥 Imported {}", file.display());
    println!("   Snapshot:   {}", snapshot.display());
    println!("   Inserted:   {}", report.inserted);
    println!("   Duplicates: {}", report.duplicates);
    println!("   Invalid:    {}", report.invalid + load.skipped);
    println!("   Records:    {} -> {}", before, index.count().await);
    if report.duplicates > 0 && !overwrite {
        println!("\n   Re-run with --overwrite to replace existing records.");
    }

    Ok(())
}
