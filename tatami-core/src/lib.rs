//! Terminal engine core.
//!
//! This crate provides the two stateful halves of the engine behind the
//! byte-stream parser:
//! - [`State`]: the terminal state machine. Consumes parser events, owns
//!   cursor, pen, modes, tab stops, and the scroll region, and emits
//!   grid-level intents into an [`Output`] sink.
//! - [`Screen`]: the grid. Materialises intents into styled cells,
//!   performs rectangular scroll/erase primitives, reflows on resize, and
//!   reports damage to a renderer through [`Updates`].
//!
//! The core is single-threaded and synchronous; it has no GUI or PTY
//! dependencies and can be driven headlessly.

pub mod buffer;
pub mod cell;
pub mod error;
pub mod line;
pub mod mouse;
pub mod pen;
pub mod screen;
pub mod state;
pub mod types;

pub use buffer::Buffer;
pub use cell::ScreenCell;
pub use error::{Error, Result};
pub use line::Line;
pub use mouse::{MouseEvent, MouseOp};
pub use pen::{Color, PenFlags, PenProp, PenState, Rgb};
pub use screen::{Screen, Updates};
pub use state::{Modes, Output, State};
pub use types::{
    CellRune, LineInfo, MouseMode, MouseProtocol, Pos, Rect, ScrollDirection, ScrollRect, TermProp,
};
