//! `answerdesk doctor` — Diagnose configuration, corpus and model health.

use answerdesk_config::AppConfig;
use answerdesk_core::knowledge::{KnowledgeIndex, WeightBounds};
use answerdesk_knowledge::{FileIndex, corpus};

use super::CommandResult;

pub async fn run() -> CommandResult {
    println!("🩺 answerdesk Doctor — System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — run `answerdesk onboard` (using defaults)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    // Corpus
    let corpus_paths = config.knowledge.resolved_corpus_paths();
    if corpus_paths.is_empty() {
        println!("  ⚠️  No corpus configured — add knowledge.corpus_paths");
        issues += 1;
    }
    for path in &corpus_paths {
        match corpus::load_file(path) {
            Ok(load) if load.skipped > 0 => {
                println!(
                    "  ⚠️  {}: {} records, {} skipped",
                    path.display(),
                    load.records.len(),
                    load.skipped
                );
                issues += 1;
            }
            Ok(load) => println!("  ✅ {}: {} records", path.display(), load.records.len()),
            Err(e) => {
                println!("  ❌ {e}");
                issues += 1;
            }
        }
    }

    // Snapshot
    match config.knowledge.resolved_snapshot_path() {
        Some(path) if path.exists() => {
            let bounds = WeightBounds::new(config.feedback.min_weight, config.feedback.max_weight);
            match FileIndex::open(&path, bounds).await {
                Ok(index) => println!(
                    "  ✅ Snapshot: {} ({} records)",
                    path.display(),
                    index.count().await
                ),
                Err(e) => {
                    println!("  ❌ {e}");
                    issues += 1;
                }
            }
        }
        Some(path) => println!("  ✅ Snapshot will be created at {}", path.display()),
        None => {
            println!("  ⚠️  No snapshot configured — learned weights are lost on restart")
        }
    }

    // Model
    match super::build_generator(&config) {
        None if config.offline => println!("  ✅ Offline mode — stored answers only"),
        None => {
            println!("  ❌ No provider available for '{}'", config.default_provider);
            issues += 1;
        }
        Some(generator) => match generator.health_check().await {
            Ok(true) => {
                println!(
                    "  ✅ Model reachable: {}/{}",
                    generator.provider_name(),
                    generator.model()
                );
                match generator.model_available().await {
                    Ok(Some(true)) | Ok(None) => {}
                    Ok(Some(false)) => {
                        println!(
                            "  ⚠️  Provider '{}' does not list model '{}'",
                            generator.provider_name(),
                            generator.model()
                        );
                        issues += 1;
                    }
                    Err(e) => println!("  ⚠️  Could not list models: {e}"),
                }
            }
            Ok(false) => {
                println!(
                    "  ⚠️  Provider '{}' answered but reports unhealthy",
                    generator.provider_name()
                );
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", generator.provider_name());
                issues += 1;
            }
        },
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
