//! Error type shared by the state machine and the screen.

use thiserror::Error;

use tatami_parser::CsiCommand;

#[derive(Debug, Error)]
pub enum Error {
    /// A read outside the screen rectangle. Internal writes clamp instead.
    #[error("position out of bounds: row {row}, col {col}")]
    OutOfBounds { row: usize, col: usize },

    /// A CSI command with no entry in the dispatch table. Non-fatal: the
    /// caller decides whether to log or abort.
    #[error("unhandled CSI command: {0}")]
    UnhandledCsi(CsiCommand),

    /// A non-CSI escape the state machine does not interpret.
    #[error("unhandled escape sequence: {0:?}")]
    UnhandledEscape(Vec<u8>),

    /// Double-width cells are reserved until the grid pairs two columns
    /// per glyph.
    #[error("cell width {0} not supported")]
    UnsupportedWidth(u8),

    /// Failure in a downstream sink that writes toward the user terminal
    /// or the child process.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
