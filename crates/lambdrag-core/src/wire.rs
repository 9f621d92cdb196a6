//! JSON message schema exchanged with the puzzle server.
//!
//! Field names follow the server's exported Go struct fields verbatim.
//! Inbound snapshots are validated here so nothing partially typed
//! reaches the merge logic.

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// One token as broadcast by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToken {
    #[serde(rename = "Token")]
    pub label: String,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

/// Authoritative server broadcast.
///
/// `PuzzleID` and a sequence-typed `Tokens` are required; everything else
/// was added in later server revisions and decodes as absent or default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "TokenID", default)]
    pub token_id: Option<i64>,
    #[serde(rename = "PlayerID", default)]
    pub player_id: Option<i64>,
    #[serde(rename = "Started", default)]
    pub started: Option<bool>,
    #[serde(rename = "PuzzleID")]
    pub puzzle_id: i64,
    #[serde(rename = "PuzzleGoal", default)]
    pub puzzle_goal: String,
    #[serde(rename = "GHCIOutput", default)]
    pub ghci_output: String,
    #[serde(rename = "LevelClear", default)]
    pub level_clear: bool,
    #[serde(rename = "Players", default)]
    pub players: i64,
    #[serde(rename = "Lobby", default)]
    pub lobby: i64,
    #[serde(rename = "Tokens")]
    pub tokens: Vec<WireToken>,
}

impl Snapshot {
    /// Parse and validate one inbound text frame.
    pub fn decode(text: &str) -> Result<Self, WireError> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), WireError> {
        if let Some(index) = self
            .tokens
            .iter()
            .position(|t| !t.x.is_finite() || !t.y.is_finite())
        {
            return Err(WireError::NonFiniteCoordinate { index });
        }
        Ok(())
    }
}

/// Outbound position report for the self-token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUpdate {
    #[serde(rename = "PuzzleID")]
    pub puzzle_id: i64,
    #[serde(rename = "TokenID")]
    pub token_id: usize,
    #[serde(rename = "PlayerID")]
    pub player_id: i64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

impl TokenUpdate {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
