//! lambdrag: headless client for the shared lambda token puzzle.
//! Connects to the puzzle server, keeps a reconciled copy of the board and
//! drives the self-token from a scripted player or an external front-end.

use anyhow::Context;
use clap::Parser;
use lambdrag_core::ClientState;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

mod cli;
mod display;
mod driver;
mod scheduler;
mod session_loop;
mod transport;

use display::{FrameSink, JsonLinesSink, LogSink};

const INPUT_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("LAMBDRAG_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let command = args
        .command
        .unwrap_or_else(|| cli::Command::Watch(cli::SessionOpts::default()));
    let opts = command.session();

    let config =
        cli::resolve_config(args.config.as_deref(), opts).context("invalid configuration")?;
    let origin = Url::parse(&args.server)
        .with_context(|| format!("invalid server origin {}", args.server))?;
    let endpoint = transport::ws_url_from_origin(&origin)?;

    tracing::info!(
        %endpoint,
        transition = %config.transition,
        ownership = %config.ownership,
        throttle = %config.throttle.strategy,
        window_ms = config.throttle.window_ms,
        "lambdrag starting"
    );

    let connection = transport::Connection::connect(&endpoint)
        .await
        .with_context(|| format!("failed to connect to {endpoint}"))?;

    let cancel = CancellationToken::new();
    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE);
    let _source = match &command {
        cli::Command::Play(play) => Some(driver::spawn_bot(
            play.bot_config(config.canvas_height),
            input_tx,
            cancel.clone(),
        )),
        cli::Command::Bridge(_) => Some(driver::spawn_stdin(input_tx, cancel.clone())),
        cli::Command::Watch(_) => None,
    };

    let sink: Box<dyn FrameSink> = match command.display() {
        cli::DisplayKind::Log => Box::new(LogSink::new()),
        cli::DisplayKind::Json => Box::new(JsonLinesSink::stdout()),
    };
    let rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
            shutdown.cancel();
        }
    });

    session_loop::run(
        connection,
        ClientState::new(&config),
        input_rx,
        sink,
        rng,
        cancel.clone(),
    )
    .await;
    cancel.cancel();

    tracing::info!("lambdrag stopped");
    Ok(())
}
