//! Typed events produced by the parser.
//!
//! Each event corresponds to one segment of the incoming byte stream: a
//! run of printable text, a single control byte, or a completed escape
//! sequence of one of the structured kinds (ESC, CSI, OSC, DCS).

use std::fmt;

/// An argument slot whose value was never given, e.g. the first slot of
/// `CSI ;5H`. Handlers substitute their own default.
pub const ARG_ABSENT: i32 = -1;

/// One parsed segment of the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A maximal run of printable bytes. Valid UTF-8 for well-formed
    /// input; never contains C0 bytes, DEL, or ESC.
    Text(Vec<u8>),

    /// A single control byte, including 8-bit C1 controls promoted from
    /// their 7-bit `ESC Fe` form.
    Control(u8),

    /// A completed non-CSI/OSC/DCS escape: intermediate bytes followed by
    /// the final byte.
    Escape(Vec<u8>),

    /// A control sequence (`ESC [ … final`).
    Csi(CsiEvent),

    /// An operating system command with a numeric prefix (`ESC ] Ps ; Pt`).
    Osc(OscEvent),

    /// An OSC without a numeric prefix, or any DCS.
    Str(StringEvent),
}

/// A parsed CSI sequence.
///
/// `args` uses [`ARG_ABSENT`] for slots that were separated but never
/// given a digit. `command` is `0` when the sequence was truncated by
/// end-of-input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsiEvent {
    pub command: u8,
    pub leader: Vec<u8>,
    pub args: Vec<i32>,
    pub intermediates: Vec<u8>,
}

impl CsiEvent {
    /// The composite identity used for dispatch.
    pub fn csi_command(&self) -> CsiCommand {
        let mut idx = CsiCommand::new(self.command);

        if self.leader.len() == 1 {
            idx = CsiCommand::with_leader(self.leader[0], self.command);
        }

        if self.intermediates.len() == 1 {
            idx = CsiCommand::with_intermediate(self.intermediates[0], self.command);
        }

        idx
    }

    /// Argument at `idx`, or `default` when the slot is missing or absent.
    pub fn arg(&self, idx: usize, default: i32) -> i32 {
        match self.args.get(idx) {
            Some(&v) if v != ARG_ABSENT => v,
            _ => default,
        }
    }

    /// Argument at `idx` interpreted as a count: missing, absent, and zero
    /// all mean one.
    pub fn count(&self, idx: usize) -> usize {
        match self.args.get(idx) {
            Some(&v) if v > 0 => v as usize,
            _ => 1,
        }
    }
}

impl fmt::Display for CsiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CSI {:?} args={:?} intermediates={:?} final=0x{:02x}",
            self.leader, self.args, self.intermediates, self.command
        )
    }
}

/// An OSC whose payload began with `Ps ;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscEvent {
    pub command: i32,
    pub data: String,
}

/// Which string-sequence introducer produced a [`StringEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    Osc,
    Dcs,
}

impl fmt::Display for StringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringKind::Osc => f.write_str("OSC"),
            StringKind::Dcs => f.write_str("DCS"),
        }
    }
}

/// An uncategorised string sequence: OSC without a numeric prefix, or DCS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEvent {
    pub kind: StringKind,
    pub data: Vec<u8>,
}

/// Composite CSI command identity: the final byte, optionally qualified by
/// a single leader or intermediate byte in the high bits. Leader bytes
/// (`0x3c..=0x3f`) and intermediates (`0x20..=0x2f`) occupy disjoint
/// ranges, so the two qualifications cannot collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CsiCommand(u16);

impl CsiCommand {
    pub const fn new(final_byte: u8) -> Self {
        CsiCommand(final_byte as u16)
    }

    pub const fn with_leader(leader: u8, final_byte: u8) -> Self {
        CsiCommand(((leader as u16) << 8) | final_byte as u16)
    }

    pub const fn with_intermediate(intermediate: u8, final_byte: u8) -> Self {
        CsiCommand(((intermediate as u16) << 8) | final_byte as u16)
    }

    pub const fn final_byte(self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for CsiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifier = (self.0 >> 8) as u8;
        if qualifier == 0 {
            write!(f, "{}", self.final_byte() as char)
        } else {
            write!(f, "{}{}", qualifier as char, self.final_byte() as char)
        }
    }
}

/// Named CSI commands the state machine dispatches on.
pub mod csi {
    use super::CsiCommand;

    pub const ICH: CsiCommand = CsiCommand::new(b'@');
    pub const CUU: CsiCommand = CsiCommand::new(b'A');
    pub const CUD: CsiCommand = CsiCommand::new(b'B');
    pub const CUF: CsiCommand = CsiCommand::new(b'C');
    pub const CUB: CsiCommand = CsiCommand::new(b'D');
    pub const CNL: CsiCommand = CsiCommand::new(b'E');
    pub const CPL: CsiCommand = CsiCommand::new(b'F');
    pub const CHA: CsiCommand = CsiCommand::new(b'G');
    pub const CUP: CsiCommand = CsiCommand::new(b'H');
    pub const CHT: CsiCommand = CsiCommand::new(b'I');
    pub const ED: CsiCommand = CsiCommand::new(b'J');
    pub const EL: CsiCommand = CsiCommand::new(b'K');
    pub const IL: CsiCommand = CsiCommand::new(b'L');
    pub const DL: CsiCommand = CsiCommand::new(b'M');
    pub const DCH: CsiCommand = CsiCommand::new(b'P');
    pub const SU: CsiCommand = CsiCommand::new(b'S');
    pub const SD: CsiCommand = CsiCommand::new(b'T');
    pub const ECH: CsiCommand = CsiCommand::new(b'X');
    pub const CBT: CsiCommand = CsiCommand::new(b'Z');
    pub const HPA: CsiCommand = CsiCommand::new(b'`');
    pub const HPR: CsiCommand = CsiCommand::new(b'a');
    pub const DA: CsiCommand = CsiCommand::new(b'c');
    pub const VPA: CsiCommand = CsiCommand::new(b'd');
    pub const VPR: CsiCommand = CsiCommand::new(b'e');
    pub const HVP: CsiCommand = CsiCommand::new(b'f');
    pub const TBC: CsiCommand = CsiCommand::new(b'g');
    pub const SM: CsiCommand = CsiCommand::new(b'h');
    pub const HPB: CsiCommand = CsiCommand::new(b'j');
    pub const VPB: CsiCommand = CsiCommand::new(b'k');
    pub const RM: CsiCommand = CsiCommand::new(b'l');
    pub const SGR: CsiCommand = CsiCommand::new(b'm');
    pub const DSR: CsiCommand = CsiCommand::new(b'n');
    pub const DECSTBM: CsiCommand = CsiCommand::new(b'r');

    pub const SM_Q: CsiCommand = CsiCommand::with_leader(b'?', b'h');
    pub const RM_Q: CsiCommand = CsiCommand::with_leader(b'?', b'l');
    pub const DSR_Q: CsiCommand = CsiCommand::with_leader(b'?', b'n');
    pub const DA2: CsiCommand = CsiCommand::with_leader(b'>', b'c');

    pub const DECSTR: CsiCommand = CsiCommand::with_intermediate(b'!', b'p');
}

/// C0 control bytes.
pub mod c0 {
    pub const NUL: u8 = 0x00;
    pub const ENQ: u8 = 0x05;
    pub const BEL: u8 = 0x07;
    pub const BS: u8 = 0x08;
    pub const HT: u8 = 0x09;
    pub const LF: u8 = 0x0a;
    pub const VT: u8 = 0x0b;
    pub const FF: u8 = 0x0c;
    pub const CR: u8 = 0x0d;
    pub const SO: u8 = 0x0e;
    pub const SI: u8 = 0x0f;
    pub const CAN: u8 = 0x18;
    pub const SUB: u8 = 0x1a;
    pub const ESC: u8 = 0x1b;
    pub const DEL: u8 = 0x7f;
}
