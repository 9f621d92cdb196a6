//! CLI definition using clap derive. Every session knob can also come from
//! the environment or a TOML file; flags win over env, env over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use lambdrag_core::{
    ClientConfig, ConfigError, OwnershipPolicy, ThrottleStrategy, TransitionPolicy,
};

use crate::driver::BotConfig;

pub const DEFAULT_SERVER: &str = "http://localhost:8001/";

#[derive(Parser)]
#[command(name = "lambdrag", about = "Headless client for the shared lambda token puzzle")]
pub struct Cli {
    /// Page origin the socket endpoint is derived from
    #[arg(
        long,
        short = 's',
        global = true,
        env = "LAMBDRAG_SERVER",
        default_value = DEFAULT_SERVER
    )]
    pub server: String,

    /// TOML file with policies, throttle and canvas settings
    #[arg(long, short = 'c', global = true, env = "LAMBDRAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Join and drag the assigned token with a scripted player
    Play(PlayOpts),
    /// Join and follow the board without sending (default)
    Watch(SessionOpts),
    /// Bridge an external front-end: input events on stdin, frames on stdout
    Bridge(SessionOpts),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayKind {
    /// Summaries through the log
    Log,
    /// One JSON frame per line on stdout
    Json,
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct SessionOpts {
    /// When a snapshot starts a new puzzle: change | advance
    #[arg(long, env = "LAMBDRAG_TRANSITION")]
    pub transition: Option<TransitionPolicy>,

    /// Who picks the self-token: server | random
    #[arg(long, env = "LAMBDRAG_OWNERSHIP")]
    pub ownership: Option<OwnershipPolicy>,

    /// Outbound pacing: coalesce | periodic
    #[arg(long, env = "LAMBDRAG_THROTTLE")]
    pub throttle: Option<ThrottleStrategy>,

    /// Send window in milliseconds (25..=1000)
    #[arg(long, env = "LAMBDRAG_WINDOW_MS")]
    pub window_ms: Option<u64>,

    /// Logical canvas height in pixels
    #[arg(long, env = "LAMBDRAG_CANVAS_HEIGHT")]
    pub canvas_height: Option<u32>,

    #[arg(long, value_enum)]
    pub display: Option<DisplayKind>,

    /// Seed for random ownership picks and the scripted player
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PlayOpts {
    #[command(flatten)]
    pub session: SessionOpts,

    /// Delay between pointer events while dragging
    #[arg(long, default_value = "16")]
    pub step_ms: u64,

    /// Shortest pause between drags
    #[arg(long, default_value = "200")]
    pub think_min_ms: u64,

    /// Longest pause between drags
    #[arg(long, default_value = "1500")]
    pub think_max_ms: u64,
}

impl PlayOpts {
    pub fn bot_config(&self, canvas_height: u32) -> BotConfig {
        BotConfig {
            canvas_height,
            step: Duration::from_millis(self.step_ms.max(1)),
            think_ms: (self.think_min_ms, self.think_max_ms.max(self.think_min_ms)),
            seed: self.session.seed,
            ..BotConfig::default()
        }
    }
}

impl Command {
    pub fn session(&self) -> &SessionOpts {
        match self {
            Self::Play(opts) => &opts.session,
            Self::Watch(opts) | Self::Bridge(opts) => opts,
        }
    }

    pub fn display(&self) -> DisplayKind {
        let default = match self {
            Self::Bridge(_) => DisplayKind::Json,
            Self::Play(_) | Self::Watch(_) => DisplayKind::Log,
        };
        self.session().display.unwrap_or(default)
    }
}

/// Defaults, then the optional file, then flags and env.
pub fn resolve_config(
    path: Option<&Path>,
    opts: &SessionOpts,
) -> Result<ClientConfig, ConfigError> {
    let mut config = match path {
        Some(p) => ClientConfig::load(p)?,
        None => ClientConfig::default(),
    };
    if let Some(t) = opts.transition {
        config.transition = t;
    }
    if let Some(o) = opts.ownership {
        config.ownership = o;
    }
    if let Some(s) = opts.throttle {
        config.throttle.strategy = s;
    }
    if let Some(w) = opts.window_ms {
        config.throttle.window_ms = w;
    }
    if let Some(h) = opts.canvas_height {
        config.canvas_height = h;
    }
    config.validate()?;
    Ok(config)
}
