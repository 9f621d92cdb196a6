//! lambdrag-core: client-side state reconciliation and update throttling
//! for the shared token-dragging puzzle.
//!
//! Pure logic, no IO. The binary crate owns the socket, the timers and the
//! input/display plumbing; everything here is driven through [`ClientState`].

pub mod client;
pub mod config;
pub mod coords;
pub mod error;
pub mod input;
pub mod reconcile;
pub mod session;
pub mod throttle;
pub mod types;
pub mod wire;

pub use client::{ClientState, Frame, FrameToken, InputOutcome};
pub use config::{ClientConfig, ThrottleConfig};
pub use coords::{Canvas, CanvasBox, Point};
pub use error::{ConfigError, WireError};
pub use input::InputEvent;
pub use reconcile::{OwnershipPolicy, ReconcileOutcome, TransitionPolicy};
pub use session::SessionState;
pub use throttle::{ThrottleStrategy, Throttler};
pub use types::{PuzzleState, Token, TokenSet};
pub use wire::{Snapshot, TokenUpdate, WireToken};
