//! ECMA-48 / VT byte-stream parser.
//!
//! Segments a raw terminal byte stream into typed [`Event`]s: text runs,
//! single-byte controls, and completed ESC / CSI / OSC / DCS sequences.
//! The machine recovers from malformed input (CAN/SUB aborts, embedded
//! ESC restarts) and never fails on sequence contents; the only errors it
//! surfaces come from the byte source or the downstream [`EventHandler`].
//!
//! References:
//! - ECMA-48, 5th edition
//! - XTerm Control Sequences (ctlseqs)

pub mod event;
pub mod parser;

pub use event::{
    c0, csi, CsiCommand, CsiEvent, Event, OscEvent, StringEvent, StringKind, ARG_ABSENT,
};
pub use parser::{EventHandler, ParseError, Parser};
