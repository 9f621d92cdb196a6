//! The session loop: one task owns `ClientState` and multiplexes the
//! socket, local input, the send timer and shutdown with `select!`.
//! Every handler runs to completion before the next event is taken.

use lambdrag_core::{ClientState, InputEvent, InputOutcome, ThrottleStrategy};
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::display::FrameSink;
use crate::scheduler::{Ticker, Timer, tick_opt, wait_until};
use crate::transport::{Connection, Inbound, Outbox, spawn_writer};

/// Counters reported when the loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub snapshots: u64,
    pub rejected: u64,
    pub transitions: u64,
    pub inputs: u64,
    /// Updates handed to the writer; a newer one may replace an unsent one.
    pub posted: u64,
    pub sent: u64,
    pub send_failures: u64,
}

/// Run until cancelled or until the server closes the stream.
///
/// Outbound writes go through the writer task, so no handler here waits on
/// the socket.
pub async fn run<S: FrameSink>(
    connection: Connection,
    mut state: ClientState,
    mut inputs: mpsc::Receiver<InputEvent>,
    mut sink: S,
    mut rng: StdRng,
    cancel: CancellationToken,
) -> SessionStats {
    let (tx, mut rx) = connection.split();
    let (outbox, writer) = spawn_writer(tx);
    let mut stats = SessionStats::default();
    let mut timer = Timer::new();
    let mut ticker = match state.throttler().strategy() {
        ThrottleStrategy::Periodic => Some(Ticker::new(state.throttler().window())),
        ThrottleStrategy::Coalesce => None,
    };
    let mut inputs_open = true;

    loop {
        timer.sync(state.send_deadline());
        let deadline = timer.deadline();

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("session cancelled");
                break;
            }

            // --- server snapshot ---
            inbound = rx.recv() => match inbound {
                Some(Inbound::Snapshot(snapshot)) => {
                    stats.snapshots += 1;
                    let outcome = state.apply_snapshot(&snapshot, &mut rng);
                    if outcome.is_transition() {
                        stats.transitions += 1;
                    }
                    tracing::trace!(
                        puzzle_id = snapshot.puzzle_id,
                        tokens = snapshot.tokens.len(),
                        trimmed = outcome.trimmed,
                        "snapshot applied"
                    );
                    sink.render(&state.frame());
                }
                Some(Inbound::Malformed(e)) => {
                    stats.rejected += 1;
                    tracing::warn!(error = %e, "discarding malformed snapshot");
                }
                None => {
                    tracing::info!("connection closed");
                    break;
                }
            },

            // --- local input ---
            event = inputs.recv(), if inputs_open => match event {
                Some(event) => {
                    stats.inputs += 1;
                    let outcome = state.handle_input(event, std::time::Instant::now());
                    if let InputOutcome::MovingToggled(moving) = outcome {
                        tracing::debug!(moving, "drag mode toggled");
                    }
                    if outcome != InputOutcome::Ignored {
                        sink.render(&state.frame());
                    }
                }
                None => {
                    tracing::debug!("input source finished");
                    inputs_open = false;
                }
            },

            // --- coalescing window expired ---
            _ = wait_until(deadline) => {
                timer.cancel();
                flush(&mut state, &outbox, &mut stats);
            }

            // --- periodic tick ---
            _ = tick_opt(ticker.as_mut()) => {
                flush(&mut state, &outbox, &mut stats);
            }
        }
    }

    drop(outbox);
    match writer.await {
        Ok(w) => {
            stats.sent = w.sent;
            stats.send_failures = w.send_failures;
        }
        Err(e) => tracing::warn!(error = %e, "writer task failed"),
    }
    tracing::info!(
        snapshots = stats.snapshots,
        rejected = stats.rejected,
        posted = stats.posted,
        sent = stats.sent,
        send_failures = stats.send_failures,
        "session ended"
    );
    stats
}

fn flush(state: &mut ClientState, outbox: &Outbox, stats: &mut SessionStats) {
    if let Some(update) = state.poll_send(std::time::Instant::now()) {
        stats.posted += 1;
        outbox.post(update);
    }
}
