//! Frame sinks. The client has no drawing surface of its own: a frame is
//! either summarised to the log or streamed as JSON lines to whatever
//! front-end sits on stdout.

use std::io::Write;

use lambdrag_core::Frame;

pub trait FrameSink: Send {
    fn render(&mut self, frame: &Frame);
}

// ---------------------------------------------------------------------------
// Log sink
// ---------------------------------------------------------------------------

/// Logs what a player would notice: a new goal, new interpreter output,
/// the win banner and lobby counters. Token motion only shows at trace.
#[derive(Debug, Default)]
pub struct LogSink {
    last: Option<Frame>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for LogSink {
    fn render(&mut self, frame: &Frame) {
        let prev = self.last.as_ref();
        if prev.map(|p| (p.puzzle_id, &p.goal)) != Some((frame.puzzle_id, &frame.goal)) {
            tracing::info!(puzzle = ?frame.puzzle_id, goal = %frame.goal, "goal");
        }
        if prev.map(|p| &p.output) != Some(&frame.output) && !frame.output.is_empty() {
            tracing::info!(output = %frame.output, "ghci");
        }
        if frame.won && prev.is_none_or(|p| !p.won) {
            tracing::info!(puzzle = ?frame.puzzle_id, "level clear");
        }
        if prev.map(|p| (p.players, p.lobby)) != Some((frame.players, frame.lobby)) {
            tracing::info!(players = frame.players, lobby = frame.lobby, "counters");
        }
        if prev.map(|p| (p.token_id, p.started)) != Some((frame.token_id, frame.started)) {
            tracing::info!(token = frame.token_id, started = frame.started, "role");
        }
        tracing::trace!(tokens = frame.tokens.len(), moving = frame.moving, "frame");
        self.last = Some(frame.clone());
    }
}

// ---------------------------------------------------------------------------
// JSON-lines sink
// ---------------------------------------------------------------------------

/// Writes every frame as one JSON object per line.
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> FrameSink for JsonLinesSink<W> {
    fn render(&mut self, frame: &Frame) {
        let res = serde_json::to_writer(&mut self.out, frame)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        if let Err(e) = res {
            tracing::warn!(error = %e, "failed to write frame");
        }
    }
}

impl FrameSink for Box<dyn FrameSink> {
    fn render(&mut self, frame: &Frame) {
        (**self).render(frame);
    }
}
