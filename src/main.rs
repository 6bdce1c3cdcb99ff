use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use bullpen::application::ports::AnswerGenerator;
use bullpen::application::services::StreamRelay;
use bullpen::infrastructure::observability::{TracingConfig, init_tracing};
use bullpen::infrastructure::upstream::{HttpAnswerGenerator, ScaffoldAnswerGenerator};
use bullpen::presentation::config::RelaySettings;
use bullpen::presentation::{AppState, Environment, ScaffoldConfig, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(&TracingConfig::from_settings(
        &settings.logging,
        environment.as_str(),
    ));

    let scaffold_config = ScaffoldConfig::default();
    let router = if scaffold_config.enabled {
        tracing::warn!("Scaffold mode enabled, answers are echoed locally");
        let generator = ScaffoldAnswerGenerator::new(Duration::from_millis(
            scaffold_config.token_delay_ms,
        ));
        relay_router(generator, &settings.relay)
    } else {
        let generator = HttpAnswerGenerator::new(&settings.upstream)
            .context("Failed to build upstream client")?;
        tracing::info!(upstream = %settings.upstream.base_url, "Relaying to upstream");
        relay_router(generator, &settings.relay)
    };

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!(%addr, environment = %environment, "Listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn relay_router<G>(generator: G, relay: &RelaySettings) -> Router
where
    G: AnswerGenerator + 'static,
{
    let stream_relay = StreamRelay::new(
        Arc::new(generator),
        relay.max_history,
        relay.fallback_message.clone(),
        Duration::from_millis(relay.fallback_token_delay_ms),
    );
    create_router(AppState::new(Arc::new(stream_relay)))
}
