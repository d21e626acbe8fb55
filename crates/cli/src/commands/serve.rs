//! `answerdesk serve` — Start the HTTP API server.

use std::sync::Arc;

use answerdesk_gateway::AppState;

use super::CommandResult;

pub async fn run(port_override: Option<u16>) -> CommandResult {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let pipeline = super::build_pipeline(config).await?;
    let records = pipeline.index.count().await;

    println!("📚 answerdesk gateway");
    println!(
        "   Listening: {}:{}",
        pipeline.config.gateway.host, pipeline.config.gateway.port
    );
    println!("   Records:   {records}");
    if pipeline.selector.is_offline() {
        println!("   Mode:      offline (stored answers only)");
    } else {
        println!(
            "   Model:     {}/{}",
            pipeline.config.default_provider,
            answerdesk_providers::router::default_model(&pipeline.config)
        );
    }

    let state = Arc::new(AppState::new(
        pipeline.config,
        pipeline.selector,
        pipeline.feedback,
    ));
    answerdesk_gateway::start(state).await?;

    Ok(())
}
