//! tatami: a virtual terminal engine.
//!
//! The engine consumes the byte stream a child process writes to its
//! pseudo-terminal and maintains the logical screen that stream implies —
//! a grid of styled cells, a cursor, scroll regions, tab stops, and
//! terminal modes — while emitting damage rectangles to a renderer. It is
//! the core behind multiplexers and session recorders; PTY attachment,
//! pane layout, and rendering are the embedder's business.
//!
//! Data flows one way:
//!
//! ```text
//! bytes -> Parser -> events -> State -> intents -> Screen -> damage
//! ```
//!
//! [`Session`] bundles the trio; the individual pieces live in
//! [`tatami_parser`] and [`tatami_core`] for embedders that need only one
//! half.

mod session;

pub use session::Session;

pub use tatami_core::{
    Buffer, CellRune, Color, Error, Line, LineInfo, Modes, MouseEvent, MouseMode, MouseOp,
    MouseProtocol, Output, PenFlags, PenProp, PenState, Pos, Rect, Result, Rgb, Screen,
    ScreenCell, ScrollDirection, ScrollRect, State, TermProp, Updates,
};
pub use tatami_parser::{
    c0, csi, CsiCommand, CsiEvent, Event, EventHandler, OscEvent, ParseError, Parser, StringEvent,
    StringKind, ARG_ABSENT,
};
