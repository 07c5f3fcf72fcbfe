//! Byte-stream state machine.
//!
//! The parser segments an arbitrary incoming byte stream into [`Event`]s.
//! It is tolerant by construction: CAN/SUB abort the sequence in progress,
//! an embedded ESC restarts one, and C0 controls that arrive inside a
//! sequence are delivered immediately while the sequence continues around
//! them. Input may be cut at any byte boundary; partial UTF-8 scalars and
//! partial sequences are carried across `feed` calls.

use std::io::{self, Read};

use log::debug;
use thiserror::Error;

use crate::event::{c0, CsiEvent, Event, OscEvent, StringEvent, StringKind, ARG_ABSENT};

/// Consumer of parsed events.
///
/// Handler errors abort parsing and are propagated verbatim; the parser
/// itself never inspects them.
pub trait EventHandler {
    type Error;

    fn handle_event(&mut self, event: Event) -> Result<(), Self::Error>;
}

/// Error from [`Parser::drive`]: either the byte source failed or the
/// handler rejected an event.
#[derive(Debug, Error)]
pub enum ParseError<E>
where
    E: std::error::Error + 'static,
{
    #[error("reading byte stream")]
    Io(#[from] io::Error),

    #[error("handling parsed event")]
    Handler(#[source] E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    Str(StringKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsiPhase {
    Leader,
    Arg,
    Intermediate,
}

fn is_intermediate(b: u8) -> bool {
    (0x20..=0x2f).contains(&b)
}

/// Continuation bytes expected after a UTF-8 lead byte. Zero for ASCII,
/// bare continuation bytes, and invalid leads.
fn utf8_continuations(b: u8) -> usize {
    match b {
        0xc2..=0xdf => 1,
        0xe0..=0xef => 2,
        0xf0..=0xf4 => 3,
        _ => 0,
    }
}

const MAX_STRING_PAYLOAD: usize = 65536;

/// The byte-stream parser.
///
/// Push bytes with [`feed`](Parser::feed), or let [`drive`](Parser::drive)
/// pull them from a reader until end-of-input.
pub struct Parser {
    state: State,

    text: Vec<u8>,
    pending: Vec<u8>,
    utf8_remaining: usize,

    intermediates: Vec<u8>,

    csi_phase: CsiPhase,
    leader: Vec<u8>,
    args: Vec<i32>,
    arg: i32,
    csi_intermediates: Vec<u8>,

    string_data: Vec<u8>,
    string_esc: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            state: State::Ground,
            text: Vec::new(),
            pending: Vec::with_capacity(4),
            utf8_remaining: 0,
            intermediates: Vec::new(),
            csi_phase: CsiPhase::Leader,
            leader: Vec::new(),
            args: Vec::new(),
            arg: ARG_ABSENT,
            csi_intermediates: Vec::new(),
            string_data: Vec::new(),
            string_esc: false,
        }
    }

    /// Advance the machine over `input`.
    ///
    /// Text runs are not flushed at the end of a call — they end only at a
    /// control byte, an escape, or [`finish`](Parser::finish) — so a run
    /// split across reads still comes out as a single [`Event::Text`].
    pub fn feed<H: EventHandler>(&mut self, input: &[u8], handler: &mut H) -> Result<(), H::Error> {
        for &byte in input {
            self.advance(byte, handler)?;
        }

        Ok(())
    }

    /// Signal end-of-input: flush any pending text and emit a truncated
    /// CSI (command byte zero) if one was in progress. Partial OSC/DCS
    /// payloads are dropped. The machine returns to ground.
    pub fn finish<H: EventHandler>(&mut self, handler: &mut H) -> Result<(), H::Error> {
        match self.state {
            State::Ground => self.flush_text(handler)?,
            State::Csi => {
                if self.arg != ARG_ABSENT {
                    self.args.push(self.arg);
                }
                let ev = self.take_csi(0);
                handler.handle_event(Event::Csi(ev))?;
            }
            State::Escape | State::Str(_) => {}
        }

        self.state = State::Ground;
        self.string_esc = false;

        Ok(())
    }

    /// Read from `reader` until end-of-input, feeding every chunk through
    /// the machine. I/O errors are propagated verbatim; a clean EOF
    /// finishes the stream and returns `Ok`.
    pub fn drive<R, H>(&mut self, mut reader: R, handler: &mut H) -> Result<(), ParseError<H::Error>>
    where
        R: Read,
        H: EventHandler,
        H::Error: std::error::Error + 'static,
    {
        let mut buf = [0u8; 4096];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => {
                    self.finish(handler).map_err(ParseError::Handler)?;
                    return Ok(());
                }
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(ParseError::Io(err)),
            };

            self.feed(&buf[..n], handler).map_err(ParseError::Handler)?;
        }
    }

    fn advance<H: EventHandler>(&mut self, byte: u8, handler: &mut H) -> Result<(), H::Error> {
        match self.state {
            State::Ground => self.ground(byte, handler),
            State::Escape => self.escape(byte, handler),
            State::Csi => self.csi(byte, handler),
            State::Str(kind) => self.string(kind, byte, handler),
        }
    }

    fn ground<H: EventHandler>(&mut self, byte: u8, handler: &mut H) -> Result<(), H::Error> {
        match byte {
            c0::NUL | c0::DEL => Ok(()),
            c0::CAN | c0::SUB => Ok(()),
            c0::ESC => {
                self.flush_text(handler)?;
                self.intermediates.clear();
                self.state = State::Escape;
                Ok(())
            }
            0x00..=0x1f => {
                self.flush_text(handler)?;
                handler.handle_event(Event::Control(byte))
            }
            _ => {
                self.accumulate_text(byte);
                Ok(())
            }
        }
    }

    fn accumulate_text(&mut self, byte: u8) {
        if self.utf8_remaining > 0 {
            if byte & 0xc0 == 0x80 {
                self.pending.push(byte);
                self.utf8_remaining -= 1;
                if self.utf8_remaining == 0 {
                    self.text.append(&mut self.pending);
                }
                return;
            }

            // Malformed sequence: keep the bytes, restart classification.
            self.text.append(&mut self.pending);
            self.utf8_remaining = 0;
        }

        let cont = utf8_continuations(byte);
        if cont == 0 {
            self.text.push(byte);
        } else {
            self.pending.push(byte);
            self.utf8_remaining = cont;
        }
    }

    fn flush_text<H: EventHandler>(&mut self, handler: &mut H) -> Result<(), H::Error> {
        if self.utf8_remaining > 0 {
            self.text.append(&mut self.pending);
            self.utf8_remaining = 0;
        }

        if self.text.is_empty() {
            return Ok(());
        }

        let run = std::mem::take(&mut self.text);
        handler.handle_event(Event::Text(run))
    }

    fn escape<H: EventHandler>(&mut self, byte: u8, handler: &mut H) -> Result<(), H::Error> {
        match byte {
            c0::NUL | c0::DEL => Ok(()),
            c0::CAN | c0::SUB => {
                self.state = State::Ground;
                Ok(())
            }
            c0::ESC => {
                self.intermediates.clear();
                Ok(())
            }
            0x00..=0x1f => handler.handle_event(Event::Control(byte)),
            b'P' => {
                self.begin_string(StringKind::Dcs);
                Ok(())
            }
            b'[' => {
                self.begin_csi();
                Ok(())
            }
            b']' => {
                self.begin_string(StringKind::Osc);
                Ok(())
            }
            _ if is_intermediate(byte) => {
                self.intermediates.push(byte);
                Ok(())
            }
            0x40..=0x5f if self.intermediates.is_empty() => {
                // 7-bit Fe escape: promote to the 8-bit C1 control.
                self.state = State::Ground;
                handler.handle_event(Event::Control(byte + 0x40))
            }
            0x30..=0x7e => {
                let mut data = std::mem::take(&mut self.intermediates);
                data.push(byte);
                self.state = State::Ground;
                handler.handle_event(Event::Escape(data))
            }
            _ => {
                debug!("unhandled byte in escape: 0x{:02x}", byte);
                Ok(())
            }
        }
    }

    fn begin_csi(&mut self) {
        self.state = State::Csi;
        self.csi_phase = CsiPhase::Leader;
        self.leader.clear();
        self.args.clear();
        self.arg = ARG_ABSENT;
        self.csi_intermediates.clear();
    }

    fn begin_string(&mut self, kind: StringKind) {
        self.state = State::Str(kind);
        self.string_data.clear();
        self.string_esc = false;
    }

    fn take_csi(&mut self, command: u8) -> CsiEvent {
        CsiEvent {
            command,
            leader: std::mem::take(&mut self.leader),
            args: std::mem::take(&mut self.args),
            intermediates: std::mem::take(&mut self.csi_intermediates),
        }
    }

    fn csi<H: EventHandler>(&mut self, byte: u8, handler: &mut H) -> Result<(), H::Error> {
        match byte {
            c0::NUL | c0::DEL => return Ok(()),
            c0::CAN | c0::SUB => {
                self.state = State::Ground;
                return Ok(());
            }
            c0::ESC => {
                // Abort and begin a fresh escape.
                self.intermediates.clear();
                self.state = State::Escape;
                return Ok(());
            }
            0x00..=0x1f => return handler.handle_event(Event::Control(byte)),
            _ => {}
        }

        if self.csi_phase == CsiPhase::Leader {
            if (0x3c..=0x3f).contains(&byte) {
                self.leader.push(byte);
                return Ok(());
            }
            self.csi_phase = CsiPhase::Arg;
        }

        if self.csi_phase == CsiPhase::Arg {
            match byte {
                b'0'..=b'9' => {
                    let digit = (byte - b'0') as i32;
                    if self.arg == ARG_ABSENT {
                        self.arg = 0;
                    }
                    self.arg = self.arg.saturating_mul(10).saturating_add(digit);
                    return Ok(());
                }
                // Colon-separated subparameters are folded into the
                // ordinary argument list.
                b';' | b':' => {
                    self.args.push(self.arg);
                    self.arg = ARG_ABSENT;
                    return Ok(());
                }
                _ => {
                    if self.arg != ARG_ABSENT {
                        self.args.push(self.arg);
                        self.arg = ARG_ABSENT;
                    }
                    self.csi_phase = CsiPhase::Intermediate;
                }
            }
        }

        match byte {
            _ if is_intermediate(byte) => {
                self.csi_intermediates.push(byte);
                Ok(())
            }
            0x40..=0x7e => {
                let ev = self.take_csi(byte);
                self.state = State::Ground;
                handler.handle_event(Event::Csi(ev))
            }
            _ => {
                // Invalid in CSI: cancel the sequence.
                self.state = State::Ground;
                Ok(())
            }
        }
    }

    fn string<H: EventHandler>(
        &mut self,
        kind: StringKind,
        byte: u8,
        handler: &mut H,
    ) -> Result<(), H::Error> {
        if self.string_esc {
            self.string_esc = false;
            if byte == b'\\' {
                self.state = State::Ground;
                return self.emit_string(kind, handler);
            }

            // Not a string terminator: the string is abandoned and the
            // escape in progress takes over.
            self.intermediates.clear();
            self.state = State::Escape;
            return self.escape(byte, handler);
        }

        match byte {
            c0::NUL | c0::DEL => Ok(()),
            c0::CAN | c0::SUB => {
                self.state = State::Ground;
                Ok(())
            }
            c0::ESC => {
                self.string_esc = true;
                Ok(())
            }
            c0::BEL => {
                self.state = State::Ground;
                self.emit_string(kind, handler)
            }
            0x00..=0x1f => handler.handle_event(Event::Control(byte)),
            _ => {
                if self.string_data.len() < MAX_STRING_PAYLOAD {
                    self.string_data.push(byte);
                }
                Ok(())
            }
        }
    }

    fn emit_string<H: EventHandler>(
        &mut self,
        kind: StringKind,
        handler: &mut H,
    ) -> Result<(), H::Error> {
        let data = std::mem::take(&mut self.string_data);

        if kind == StringKind::Osc {
            if let Some(sep) = data.iter().position(|&b| b == b';') {
                let prefix = std::str::from_utf8(&data[..sep]).ok();
                if let Some(command) = prefix.and_then(|s| s.parse::<i32>().ok()) {
                    let payload = String::from_utf8_lossy(&data[sep + 1..]).into_owned();
                    return handler.handle_event(Event::Osc(OscEvent {
                        command,
                        data: payload,
                    }));
                }
            }
        }

        handler.handle_event(Event::Str(StringEvent { kind, data }))
    }
}
