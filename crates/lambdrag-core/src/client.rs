//! The single owned state holder.
//!
//! `ClientState` bundles session identity, puzzle metadata, the token set,
//! the canvas and the outbound throttler. Every handler (inbound snapshot,
//! pointer, click, resize, timer) is a `&mut self` method that runs to
//! completion; the caller keeps the value on one task, so no locking is
//! involved.

use std::time::Instant;

use rand::Rng;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::coords::Canvas;
use crate::input::InputEvent;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::session::SessionState;
use crate::throttle::{ThrottleStrategy, Throttler};
use crate::types::{PuzzleState, TokenSet};
use crate::wire::{Snapshot, TokenUpdate};

/// Result of one local input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputOutcome {
    /// The event had no effect (observe mode, spectator, waiting room).
    Ignored,
    /// The self-token moved and an outbound update was recorded.
    Moved,
    /// Observe/drag mode changed; carries the new `moving` value.
    MovingToggled(bool),
    /// Canvas dimensions were recomputed.
    Resized { width: u32, height: u32 },
}

impl InputOutcome {
    /// Whether the display should be redrawn.
    pub fn needs_render(&self) -> bool {
        matches!(self, Self::Moved | Self::Resized { .. })
    }
}

/// One token as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameToken {
    pub label: String,
    pub px: f64,
    pub py: f64,
    pub own: bool,
}

/// Everything an external renderer needs after a state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub puzzle_id: Option<i64>,
    pub goal: String,
    pub output: String,
    pub won: bool,
    pub players: i64,
    pub lobby: i64,
    pub token_id: i64,
    pub player_id: i64,
    pub started: bool,
    pub moving: bool,
    pub tokens: Vec<FrameToken>,
}

#[derive(Debug, Clone)]
pub struct ClientState {
    reconciler: Reconciler,
    session: SessionState,
    puzzle: PuzzleState,
    tokens: TokenSet,
    canvas: Canvas,
    throttler: Throttler,
}

impl ClientState {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            reconciler: Reconciler::new(config.transition, config.ownership),
            session: SessionState::new(),
            puzzle: PuzzleState::default(),
            tokens: TokenSet::new(),
            canvas: Canvas::with_height(config.canvas_height),
            throttler: Throttler::new(config.throttle.strategy, config.throttle.window()),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn puzzle(&self) -> &PuzzleState {
        &self.puzzle
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    // ─── Remote-read path ─────────────────────────────────────────

    /// Merge an inbound snapshot. A puzzle transition drops any pending
    /// outbound update, since it described the previous puzzle.
    pub fn apply_snapshot<R: Rng>(
        &mut self,
        snapshot: &Snapshot,
        rng: &mut R,
    ) -> ReconcileOutcome {
        let outcome = self.reconciler.apply(
            &mut self.session,
            &mut self.puzzle,
            &mut self.tokens,
            snapshot,
            rng,
        );
        if outcome.is_transition() && self.throttler.pending().is_some() {
            tracing::debug!("dropping pending update from previous puzzle");
            self.throttler.discard();
        }
        outcome
    }

    // ─── Local-write path ─────────────────────────────────────────

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> InputOutcome {
        match event {
            InputEvent::PointerMove { page_x, page_y } => self.pointer_move(page_x, page_y, now),
            InputEvent::Click => InputOutcome::MovingToggled(self.session.toggle_moving()),
            InputEvent::Resize { height, left, top } => {
                if height == 0 {
                    return InputOutcome::Ignored;
                }
                self.canvas.resize(height);
                self.canvas.set_offset(left, top);
                InputOutcome::Resized {
                    width: self.canvas.width(),
                    height: self.canvas.height(),
                }
            }
        }
    }

    fn pointer_move(&mut self, page_x: f64, page_y: f64, now: Instant) -> InputOutcome {
        if !self.session.can_edit() {
            return InputOutcome::Ignored;
        }
        let Some(point) = self.canvas.bounding_box().normalize(page_x, page_y) else {
            return InputOutcome::Ignored;
        };
        let Some(own) = self
            .session
            .token_id()
            .and_then(|slot| self.tokens.get_mut(slot))
        else {
            return InputOutcome::Ignored;
        };
        own.move_to(point);
        self.notify_local_change(now);
        InputOutcome::Moved
    }

    /// Record the self-token's current position for sending. Spectators
    /// never produce updates.
    pub fn notify_local_change(&mut self, now: Instant) {
        if let Some(update) = self.current_update() {
            self.throttler.record(update, now);
        }
    }

    /// The update that would describe the self-token right now.
    pub fn current_update(&self) -> Option<TokenUpdate> {
        let slot = self.session.token_id()?;
        let puzzle_id = self.session.puzzle_id()?;
        let own = self.tokens.get(slot)?;
        Some(TokenUpdate {
            puzzle_id,
            token_id: slot,
            player_id: self.session.player_id(),
            x: own.x,
            y: own.y,
        })
    }

    // ─── Timers ───────────────────────────────────────────────────

    /// When the coalescing window expires, if armed.
    pub fn send_deadline(&self) -> Option<Instant> {
        self.throttler.deadline()
    }

    /// Called on window expiry (coalescing) or on every tick (periodic).
    ///
    /// The payload is rebuilt from current state at send time. A pending
    /// update recorded for a token or puzzle this client no longer holds is
    /// dropped instead of being attributed to the new slot.
    pub fn poll_send(&mut self, now: Instant) -> Option<TokenUpdate> {
        match self.throttler.strategy() {
            ThrottleStrategy::Coalesce => {
                let pending = self.throttler.take_due(now)?;
                let current = self.current_update()?;
                if pending.token_id != current.token_id || pending.puzzle_id != current.puzzle_id {
                    tracing::debug!(
                        pending_token = pending.token_id,
                        current_token = current.token_id,
                        "pending update superseded by reassignment"
                    );
                    return None;
                }
                Some(current)
            }
            ThrottleStrategy::Periodic => {
                let current = self.current_update();
                self.throttler.tick(current)
            }
        }
    }

    // ─── Render ───────────────────────────────────────────────────

    pub fn frame(&self) -> Frame {
        let own = self.session.token_id();
        Frame {
            width: self.canvas.width(),
            height: self.canvas.height(),
            puzzle_id: self.session.puzzle_id(),
            goal: self.puzzle.goal_text.clone(),
            output: self.puzzle.ghci_output.clone(),
            won: self.puzzle.cleared,
            players: self.puzzle.players,
            lobby: self.puzzle.lobby,
            token_id: self.session.token_id_wire(),
            player_id: self.session.player_id(),
            started: self.session.started(),
            moving: self.session.moving(),
            tokens: self
                .tokens
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let (px, py) = self.canvas.to_pixels(t.position());
                    FrameToken {
                        label: t.label.clone(),
                        px,
                        py,
                        own: own == Some(i),
                    }
                })
                .collect(),
        }
    }
}
