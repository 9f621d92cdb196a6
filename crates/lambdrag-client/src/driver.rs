//! Input sources feeding the session loop over an mpsc channel.
//!
//! - bot: sizes the canvas, clicks to pick up its token, then drags it
//!   toward random targets with a short pause between drags.
//! - stdin: one JSON `InputEvent` per line from an external front-end.
//!
//! A source stops when cancelled, when the loop drops its receiver, or
//! (stdin) at end of input.

use std::time::Duration;

use lambdrag_core::{InputEvent, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub canvas_height: u32,
    /// Delay between pointer events within one drag.
    pub step: Duration,
    pub steps_per_drag: (u32, u32),
    pub think_ms: (u64, u64),
    pub seed: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            canvas_height: 400,
            step: Duration::from_millis(16),
            steps_per_drag: (8, 24),
            think_ms: (200, 1500),
            seed: None,
        }
    }
}

pub fn spawn_bot(
    config: BotConfig,
    tx: mpsc::Sender<InputEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move { run_bot(config, tx, cancel).await })
}

async fn run_bot(config: BotConfig, tx: mpsc::Sender<InputEvent>, cancel: CancellationToken) {
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    tracing::debug!(seed, "bot started");

    let height = f64::from(config.canvas_height);
    let width = height * 2.0;
    let setup = [
        InputEvent::Resize {
            height: config.canvas_height,
            left: 0.0,
            top: 0.0,
        },
        InputEvent::Click,
    ];
    for ev in setup {
        if tx.send(ev).await.is_err() {
            return;
        }
    }

    let mut at = Point::new(0.5, 0.5);
    loop {
        let target = Point::new(rng.random_range(0.05..=0.95), rng.random_range(0.05..=0.95));
        let (lo, hi) = config.steps_per_drag;
        let steps = rng.random_range(lo..=hi.max(lo));
        for p in drag_path(at, target, steps) {
            let ev = InputEvent::PointerMove {
                page_x: p.x * width,
                page_y: p.y * height,
            };
            if tx.send(ev).await.is_err() || !pause(&cancel, config.step).await {
                return;
            }
        }
        at = target;

        let think = sample_low_biased(&mut rng, config.think_ms.0, config.think_ms.1);
        if !pause(&cancel, Duration::from_millis(think)).await {
            return;
        }
    }
}

/// Sleep unless cancelled first. Returns false on cancellation.
async fn pause(cancel: &CancellationToken, d: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}

/// Evenly spaced points from `from` (exclusive) to `to` (inclusive).
pub fn drag_path(from: Point, to: Point, steps: u32) -> Vec<Point> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let t = f64::from(i) / f64::from(steps);
            Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
        })
        .collect()
}

/// Pause lengths skew short with the occasional long one.
fn sample_low_biased<R: Rng>(rng: &mut R, min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    let span = (max - min) as f64;
    let shaped = rng.random::<f64>().powf(1.9);
    min.saturating_add((span * shaped).round() as u64)
}

// ---------------------------------------------------------------------------
// Stdin
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStats {
    pub accepted: u64,
    pub rejected: u64,
}

pub fn spawn_stdin(tx: mpsc::Sender<InputEvent>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let stats = read_events(BufReader::new(tokio::io::stdin()), tx, cancel).await;
        tracing::debug!(accepted = stats.accepted, rejected = stats.rejected, "stdin closed");
    })
}

/// Forward JSON-lines input events. Blank lines are skipped; lines that do
/// not parse are logged and skipped.
pub async fn read_events<R>(
    reader: R,
    tx: mpsc::Sender<InputEvent>,
    cancel: CancellationToken,
) -> ReadStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReadStats::default();
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read error");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InputEvent>(line) {
            Ok(ev) => {
                if tx.send(ev).await.is_err() {
                    break;
                }
                stats.accepted += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed input line");
                stats.rejected += 1;
            }
        }
    }
    stats
}
