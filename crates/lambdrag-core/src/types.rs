use serde::{Deserialize, Serialize};

use crate::coords::Point;
use crate::wire::WireToken;

// ─── Token ────────────────────────────────────────────────────────

/// One draggable label at a normalized position.
///
/// Coordinates are nominally in `[0, 1]` but are never clamped: pointer
/// motion near the canvas edge may push them slightly outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

impl Token {
    pub fn new(label: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            x,
            y,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn move_to(&mut self, p: Point) {
        self.x = p.x;
        self.y = p.y;
    }
}

impl From<&WireToken> for Token {
    fn from(w: &WireToken) -> Self {
        Self::new(w.label.clone(), w.x, w.y)
    }
}

// ─── TokenSet ─────────────────────────────────────────────────────

/// Index-addressed token sequence. The index is the token identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    tokens: Vec<Token>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Token> {
        self.tokens.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Replace the whole set, as on a puzzle transition.
    pub fn replace_all(&mut self, remote: &[WireToken]) {
        self.tokens = remote.iter().map(Token::from).collect();
    }

    /// Write `token` at `index`, appending when `index == len()`.
    ///
    /// Indices further past the end are a caller bug; merges walk the remote
    /// sequence in order so the set only ever grows by one slot at a time.
    pub(crate) fn put(&mut self, index: usize, token: Token) {
        if let Some(slot) = self.tokens.get_mut(index) {
            *slot = token;
        } else {
            debug_assert_eq!(index, self.tokens.len());
            self.tokens.push(token);
        }
    }

    /// Drop trailing entries so the set is exactly `len` long.
    /// Returns how many entries were removed.
    pub(crate) fn trim_to(&mut self, len: usize) -> usize {
        let removed = self.tokens.len().saturating_sub(len);
        self.tokens.truncate(len);
        removed
    }
}

impl From<Vec<Token>> for TokenSet {
    fn from(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }
}

impl<'a> IntoIterator for &'a TokenSet {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

// ─── PuzzleState ──────────────────────────────────────────────────

/// Display-only puzzle metadata. The puzzle id itself lives in
/// [`SessionState`](crate::session::SessionState) because it gates edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PuzzleState {
    /// Target value the arranged expression should evaluate to.
    pub goal_text: String,
    /// Latest evaluator transcript for the current arrangement.
    pub ghci_output: String,
    /// Puzzle-solved indicator.
    pub cleared: bool,
    /// Players currently holding a token.
    pub players: i64,
    /// Connected participants waiting without a token.
    pub lobby: i64,
}
