//! Session state: who this client is and whether it may edit.
//!
//! Identity fields are written only by the reconciliation engine from
//! inbound snapshots. The `moving` toggle is purely local.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Owned token index; `None` for a spectator.
    token_id: Option<usize>,
    player_id: i64,
    /// Server-side "game running" flag; `false` models the waiting room.
    started: bool,
    /// Last seen puzzle id; `None` until the first snapshot.
    puzzle_id: Option<i64>,
    /// Local observe/drag toggle, never transmitted.
    moving: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_id(&self) -> Option<usize> {
        self.token_id
    }

    /// Token id in the server's integer convention (`-1` = spectator).
    pub fn token_id_wire(&self) -> i64 {
        self.token_id
            .and_then(|t| i64::try_from(t).ok())
            .unwrap_or(-1)
    }

    pub fn player_id(&self) -> i64 {
        self.player_id
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn puzzle_id(&self) -> Option<i64> {
        self.puzzle_id
    }

    pub fn moving(&self) -> bool {
        self.moving
    }

    pub fn is_spectator(&self) -> bool {
        self.token_id.is_none()
    }

    /// Whether pointer motion should move the self-token right now.
    pub fn can_edit(&self) -> bool {
        self.started && self.moving && self.token_id.is_some()
    }

    /// Flip between observe and drag mode. Returns the new mode.
    pub fn toggle_moving(&mut self) -> bool {
        self.moving = !self.moving;
        self.moving
    }

    pub(crate) fn set_token_id(&mut self, token_id: Option<usize>) {
        self.token_id = token_id;
    }

    pub(crate) fn set_player_id(&mut self, player_id: i64) {
        self.player_id = player_id;
    }

    pub(crate) fn set_started(&mut self, started: bool) {
        self.started = started;
    }

    pub(crate) fn set_puzzle_id(&mut self, puzzle_id: i64) {
        self.puzzle_id = Some(puzzle_id);
    }
}
