//! Strictly Tournament - Unified CLI
//!
//! Plays a tournament from the terminal or serves many sessions over HTTP.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use strictly_tournament::{
    AnswerProvider, AppState, ArithmeticAnswerProvider, ClientConfig, FALLBACK_ANSWER,
    HttpTournamentClient, InteractiveAnswerProvider, InteractiveStrategy, Launcher,
    LlmAnswerProvider, LlmClient, PlayerId, PollScheduler, SessionRegistry, StrategyKind, router,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_tournament=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Status { player_id } => run_status(&config, player_id).await,
        Command::Play { name } => run_play(&config, &name).await,
        Command::Auto {
            name,
            strategy,
            llm,
        } => run_auto(&config, &name, strategy, llm).await,
        Command::Reconnect {
            player_id,
            strategy,
            llm,
        } => run_reconnect(&config, player_id, strategy, llm).await,
        Command::Serve { port, host } => run_server(&config, host, port).await,
    }
}

/// Defaults, then the config file, then the environment, then flags.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.server_url {
        config = config.with_server_url(url.clone());
    }
    if let Some(interval) = cli.poll_interval_ms {
        config = config.with_poll_interval_ms(interval);
    }
    let config = config.validate()?;
    info!(
        server_url = %config.server_url(),
        poll_interval_ms = config.poll_interval_ms(),
        "Configuration resolved"
    );
    Ok(config)
}

fn launcher(config: &ClientConfig, answers: Arc<dyn AnswerProvider>) -> Result<Launcher> {
    let transport = HttpTournamentClient::new(config.server_url(), config.request_timeout())?;
    Ok(Launcher::new(
        Arc::new(transport),
        config.poll_settings(),
        answers,
    ))
}

/// LLM answers when asked for, local arithmetic otherwise.
fn auto_answers(config: &ClientConfig, llm: bool) -> Result<Arc<dyn AnswerProvider>> {
    if llm {
        let llm_config = config.create_llm_config()?;
        let client = LlmClient::new(llm_config, config.request_timeout())?;
        Ok(Arc::new(LlmAnswerProvider::new(client)))
    } else {
        Ok(Arc::new(ArithmeticAnswerProvider::new(FALLBACK_ANSWER)))
    }
}

/// Print the rebuilt session without submitting anything
#[instrument(skip(config))]
async fn run_status(config: &ClientConfig, player_id: PlayerId) -> Result<()> {
    let launcher = launcher(config, Arc::new(ArithmeticAnswerProvider::new(FALLBACK_ANSWER)))?;
    let state = launcher.reconnect(player_id, None).await?;
    println!("{}", state.summary());
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// Register and play interactively
#[instrument(skip(config))]
async fn run_play(config: &ClientConfig, name: &str) -> Result<()> {
    let launcher = launcher(config, Arc::new(InteractiveAnswerProvider))?;
    let state = launcher.register(name).await?;
    announce_player(&state);
    drive(launcher.scheduler(state, Arc::new(InteractiveStrategy))).await
}

/// Register and play automatically
#[instrument(skip(config))]
async fn run_auto(config: &ClientConfig, name: &str, strategy: StrategyKind, llm: bool) -> Result<()> {
    let launcher = launcher(config, auto_answers(config, llm)?)?;
    let state = launcher.register(name).await?;
    announce_player(&state);
    drive(launcher.scheduler_for(state, strategy)).await
}

/// Resume an existing player automatically
#[instrument(skip(config))]
async fn run_reconnect(
    config: &ClientConfig,
    player_id: PlayerId,
    strategy: StrategyKind,
    llm: bool,
) -> Result<()> {
    let launcher = launcher(config, auto_answers(config, llm)?)?;
    let state = launcher.reconnect(player_id, None).await?;
    println!("{}", state.summary());
    drive(launcher.scheduler_for(state, strategy)).await
}

fn announce_player(state: &strictly_tournament::SessionState) {
    if let Some(player_id) = state.player_id() {
        println!(
            "Registered as player {} (resume later with `reconnect --player-id {}`)",
            player_id, player_id
        );
    }
}

/// Runs one scheduler to completion, stopping it on Ctrl-C.
async fn drive(scheduler: PollScheduler) -> Result<()> {
    let stop = scheduler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current poll");
            stop.stop();
        }
    });

    let report = scheduler.run().await?;
    println!("Finished: {}", report.outcome);
    println!("{}", report.state.summary());
    for result in report.state.results() {
        println!(
            "  round {:>2}: score {:>3}, answer {}, move {}",
            result.round_number,
            result.score,
            if result.answer_correct { "correct" } else { "wrong" },
            result
                .move_used
                .map(|chosen| chosen.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

/// Run the HTTP session front end
#[instrument(skip(config))]
async fn run_server(config: &ClientConfig, host: String, port: u16) -> Result<()> {
    let launcher = launcher(config, Arc::new(ArithmeticAnswerProvider::new(FALLBACK_ANSWER)))?;
    let registry = SessionRegistry::new();
    let app = router(AppState::new(launcher, registry.clone()));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "✅ Session front end listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down, stopping all sessions");
            }
            registry.stop_all().await;
        })
        .await?;
    Ok(())
}
