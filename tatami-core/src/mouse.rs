//! SGR mouse report decoding.
//!
//! Lives at the boundary: the engine core only records which protocol the
//! application selected, while the embedder decodes reports arriving from
//! the user's terminal. SGR reports share the CSI shape the parser already
//! produces (`CSI < button ; col ; row (M|m)`).

use serde::{Deserialize, Serialize};

use tatami_parser::CsiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseOp {
    Down,
    Up,
    Motion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub op: MouseOp,
    pub button: u8,
    pub modifier: u8,
    pub col: usize,
    pub row: usize,
}

impl MouseEvent {
    /// Decode an SGR mouse report. Returns `None` for CSI sequences that
    /// are not well-formed SGR reports.
    pub fn from_csi(ev: &CsiEvent) -> Option<MouseEvent> {
        if ev.leader != [b'<'] || !(ev.command == b'M' || ev.command == b'm') {
            return None;
        }

        if ev.args.len() != 3 {
            return None;
        }

        let mut button = ev.args[0];
        let col = ev.args[1];
        let row = ev.args[2];
        if button < 0 || col < 0 || row < 0 {
            return None;
        }

        let motion = button & 0x20 != 0;
        button &= !0x20;

        let op = if motion {
            MouseOp::Motion
        } else if ev.command == b'm' {
            MouseOp::Up
        } else {
            MouseOp::Down
        };

        // Wheel buttons are reported with a 64 offset.
        let mut base = 0;
        if button & 0x40 != 0 {
            base = 4;
            button -= 64;
        }

        Some(MouseEvent {
            op,
            button: base + (button & 0x3) as u8,
            modifier: (button >> 2) as u8,
            col: col as usize,
            row: row as usize,
        })
    }
}
