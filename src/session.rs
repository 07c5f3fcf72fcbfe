//! Wires the parser, state machine, and screen into one driveable unit.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};

use tatami_core::{Error, Screen, State, Updates};
use tatami_parser::{ParseError, Parser};

/// A virtual terminal session: bytes in, damage out.
///
/// The session is single-threaded; feed it from one task and let the
/// renderer drain damage through the [`Updates`] sink. `resize` must not
/// run concurrently with feeding — it mutates the dimensions every write
/// consults.
pub struct Session<U: Updates> {
    parser: Parser,
    state: State<Screen<U>>,
}

impl<U: Updates> Session<U> {
    pub fn new(rows: usize, cols: usize, updates: U) -> Result<Self, Error> {
        let screen = Screen::new(rows, cols, updates)?;
        let state = State::new(rows, cols, screen)?;

        Ok(Session {
            parser: Parser::new(),
            state,
        })
    }

    /// Push a chunk of bytes from the child process.
    pub fn advance(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.parser.feed(bytes, &mut self.state)
    }

    /// Signal end-of-stream, flushing any pending text run.
    pub fn finish(&mut self) -> Result<(), Error> {
        self.parser.finish(&mut self.state)
    }

    /// Read `reader` to end-of-input, feeding the engine.
    pub fn drive<R: Read>(&mut self, reader: R) -> Result<(), ParseError<Error>> {
        self.parser.drive(reader, &mut self.state)
    }

    /// Like [`drive`](Session::drive), but stops between reads once
    /// `cancel` is set. In-flight events run to completion.
    pub fn drive_until<R: Read>(
        &mut self,
        mut reader: R,
        cancel: &AtomicBool,
    ) -> Result<(), ParseError<Error>> {
        let mut buf = [0u8; 4096];

        while !cancel.load(Ordering::Relaxed) {
            let n = match reader.read(&mut buf) {
                Ok(0) => {
                    self.parser.finish(&mut self.state).map_err(ParseError::Handler)?;
                    return Ok(());
                }
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(ParseError::Io(err)),
            };

            self.parser
                .feed(&buf[..n], &mut self.state)
                .map_err(ParseError::Handler)?;
        }

        Ok(())
    }

    /// Resize the whole trio. The continuation flags the state gathered
    /// flow into the screen's reflow; the renderer is expected to repaint.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<(), Error> {
        self.state.resize(rows, cols)
    }

    pub fn state(&self) -> &State<Screen<U>> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State<Screen<U>> {
        &mut self.state
    }

    pub fn screen(&self) -> &Screen<U> {
        self.state.output()
    }

    pub fn screen_mut(&mut self) -> &mut Screen<U> {
        self.state.output_mut()
    }
}
