//! `answerdesk feedback` — Record a like or dislike for an answer.

use answerdesk_core::feedback::{FeedbackEvent, Rating};

use super::CommandResult;

pub async fn run(
    question: String,
    answer: String,
    rating: Rating,
    record_id: Option<String>,
) -> CommandResult {
    let config = super::load_config()?;
    if config.knowledge.snapshot_path.is_none() {
        eprintln!(
            "  ⚠️  No knowledge.snapshot_path configured; the weight change will not persist."
        );
    }

    let pipeline = super::build_pipeline(config).await?;

    let mut event = FeedbackEvent::new(question, answer, rating);
    if let Some(id) = record_id {
        event = event.with_source(id);
    }

    let outcome = pipeline.feedback.record(event).await;
    match (outcome.resolved_record_id, outcome.new_weight) {
        (Some(id), Some(weight)) => {
            println!("✅ Feedback recorded for '{id}' (weight now {weight:.2})");
        }
        _ => println!("  Feedback acknowledged; no matching record was found."),
    }

    Ok(())
}
