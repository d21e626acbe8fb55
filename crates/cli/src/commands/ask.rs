//! `answerdesk ask` — Answer one question and print how it was produced.

use super::CommandResult;

pub async fn run(query: String) -> CommandResult {
    let config = super::load_config()?;
    let pipeline = super::build_pipeline(config).await?;

    let result = pipeline.selector.answer(&query).await?;

    println!("{}", result.text);
    println!();
    println!("  Method:      {}", result.method);
    println!("  Confidence:  {:.2}", result.confidence);
    println!(
        "  Source:      {}",
        result.source_record_id.as_deref().unwrap_or("-")
    );
    println!("  Time:        {:.3}s", result.processing_time.as_secs_f64());
    if let Some(note) = &result.note {
        println!("  Note:        {note}");
    }

    Ok(())
}
