//! Local input events: what a pointer, a click or a window resize
//! delivers to the client.
//!
//! Serde-tagged so an external front-end can stream them as JSON lines:
//! `{"type":"pointer_move","page_x":412.0,"page_y":230.5}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Pointer position in page pixels.
    PointerMove { page_x: f64, page_y: f64 },
    /// Toggle between observing and dragging the self-token.
    Click,
    /// New canvas height, optionally with its page offset.
    Resize {
        height: u32,
        #[serde(default)]
        left: f64,
        #[serde(default)]
        top: f64,
    },
}
