//! The terminal state machine.
//!
//! [`State`] consumes parser events and owns the logical terminal: cursor,
//! pen, modes, tab stops, scroll region, and saved cursor. It does not
//! store cells; grid mutations are expressed as intents on the [`Output`]
//! sink (normally a [`crate::screen::Screen`]).
//!
//! Invariants maintained across every event: the cursor stays strictly
//! inside the screen, the tab-stop vector has exactly `cols` entries, and
//! the scroll region stays inside `[0, rows)`.

use log::debug;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

use tatami_parser::{c0, csi, CsiEvent, Event, EventHandler, OscEvent, StringKind};

use crate::error::{Error, Result};
use crate::pen::{PenProp, PenState};
use crate::types::{
    CellRune, LineInfo, MouseMode, MouseProtocol, Pos, Rect, ScrollRect, TermProp,
};

/// Grid-level intents and pass-throughs produced by the state.
///
/// Implementations must not call back into the state synchronously.
pub trait Output {
    fn set_cell(&mut self, pos: Pos, val: CellRune) -> Result<()>;
    fn append_cell(&mut self, pos: Pos, c: char) -> Result<()>;
    fn clear_rect(&mut self, rect: Rect) -> Result<()>;
    fn scroll_rect(&mut self, rect: ScrollRect) -> Result<()>;

    /// Bytes to write back toward the child process (device replies).
    fn output(&mut self, data: &[u8]) -> Result<()>;

    fn set_term_prop(&mut self, prop: TermProp) -> Result<()>;
    fn set_pen_prop(&mut self, prop: PenProp, pen: PenState) -> Result<()>;
    fn string_event(&mut self, kind: StringKind, data: &[u8]) -> Result<()>;

    /// Dimension change, carrying the per-row continuation flags gathered
    /// since the last resize.
    fn resize(&mut self, rows: usize, cols: usize, lines: &[LineInfo]) -> Result<()>;
}

/// ANSI and DEC private modes tracked by the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    pub insert: bool,
    pub newline: bool,
    pub cursor_keys: bool,
    pub origin: bool,
    pub autowrap: bool,
    pub left_right_margin: bool,
    pub report_focus: bool,
    pub bracketed_paste: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Modes {
            insert: false,
            newline: false,
            cursor_keys: false,
            origin: false,
            autowrap: true,
            left_right_margin: false,
            report_focus: false,
            bracketed_paste: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ScrollRegion {
    top: usize,
    /// `None` extends the region to the last row.
    bottom: Option<usize>,
}

pub struct State<O: Output> {
    rows: usize,
    cols: usize,
    cursor: Pos,
    pub(crate) pen: PenState,
    pub(crate) output: O,

    /// Position of the last written base glyph; combining marks attach
    /// here even after the cursor has moved on.
    last_pos: Pos,
    tab_stops: Vec<bool>,
    line_info: Vec<LineInfo>,

    modes: Modes,
    mouse_protocol: MouseProtocol,
    saved_cursor: Pos,
    scroll_region: ScrollRegion,
}

impl<O: Output> State<O> {
    pub fn new(rows: usize, cols: usize, output: O) -> Result<Self> {
        let mut state = State {
            rows,
            cols,
            cursor: Pos::default(),
            pen: PenState::default(),
            output,
            last_pos: Pos::default(),
            tab_stops: vec![false; cols],
            line_info: vec![LineInfo::default(); rows],
            modes: Modes::default(),
            mouse_protocol: MouseProtocol::default(),
            saved_cursor: Pos::default(),
            scroll_region: ScrollRegion::default(),
        };

        state.reset();

        Ok(state)
    }

    /// Reset modes, tab stops, and the scroll region to their defaults.
    pub fn reset(&mut self) {
        self.modes = Modes::default();

        for (col, stop) in self.tab_stops.iter_mut().enumerate() {
            *stop = col % 8 == 0;
        }

        self.scroll_region = ScrollRegion::default();
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cursor(&self) -> Pos {
        self.cursor
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn mouse_protocol(&self) -> MouseProtocol {
        self.mouse_protocol
    }

    pub fn line_info(&self) -> &[LineInfo] {
        &self.line_info
    }

    pub fn pen(&self) -> &PenState {
        &self.pen
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Consume one parser event.
    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Text(data) => self.write_data(&data),
            Event::Control(control) => self.handle_control(control),
            Event::Csi(ev) => self.handle_csi(&ev),
            Event::Escape(data) => self.handle_escape(&data),
            Event::Osc(ev) => self.handle_osc(ev),
            Event::Str(ev) => self.output.string_event(ev.kind, &ev.data),
        }
    }

    /// Change dimensions, rebuild dimensioned structures, and broadcast
    /// downstream with the continuation flags collected so far. The caller
    /// must not feed bytes concurrently.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<()> {
        let previous = std::mem::take(&mut self.line_info);

        self.rows = rows;
        self.cols = cols;

        let old_cols = self.tab_stops.len();
        self.tab_stops.resize(cols, false);
        for col in old_cols..cols {
            if col % 8 == 0 {
                self.tab_stops[col] = true;
            }
        }

        self.line_info = vec![LineInfo::default(); rows];
        self.scroll_region = ScrollRegion::default();

        self.cursor.row = self.cursor.row.min(rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.saved_cursor.row = self.saved_cursor.row.min(rows - 1);
        self.saved_cursor.col = self.saved_cursor.col.min(cols - 1);
        self.last_pos.row = self.last_pos.row.min(rows - 1);
        self.last_pos.col = self.last_pos.col.min(cols - 1);

        self.output.resize(rows, cols, &previous)
    }

    fn scroll_bounds(&self) -> (usize, usize) {
        let bottom = match self.scroll_region.bottom {
            Some(bottom) => bottom,
            None => self.rows - 1,
        };

        (self.scroll_region.top, bottom)
    }

    fn set_cursor(&mut self, mut pos: Pos) {
        if self.modes.origin {
            let (top, bottom) = self.scroll_bounds();
            pos.row = pos.row.clamp(top, bottom);
        } else if pos.row >= self.rows {
            pos.row = self.rows - 1;
        }

        if pos.col >= self.cols {
            pos.col = self.cols - 1;
        }

        self.cursor = pos;
    }

    /// The position written to, advancing the cursor and wrapping at the
    /// right edge. The wrapped-onto row is marked as a continuation.
    fn advance_pos(&mut self) -> Pos {
        let pos = self.cursor;

        let mut next = self.cursor;
        next.col += 1;

        if next.col >= self.cols {
            next.row += 1;
            next.col = 0;

            let wrapped = next.row.min(self.rows - 1);
            self.line_info[wrapped].continuation = true;
        }

        self.set_cursor(next);

        pos
    }

    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(data);

        for c in text.chars() {
            if UnicodeWidthChar::width(c) == Some(0) {
                let last = self.last_pos;
                self.output.append_cell(last, c)?;
                continue;
            }

            let pos = self.advance_pos();
            self.last_pos = pos;
            self.output.set_cell(pos, CellRune::new(c))?;
        }

        Ok(())
    }

    fn next_tab_stop(&self, from: usize) -> usize {
        let mut col = from + 1;
        while col < self.cols && !self.tab_stops[col] {
            col += 1;
        }

        col.min(self.cols - 1)
    }

    fn prev_tab_stop(&self, from: usize) -> usize {
        let mut col = from;
        while col > 0 {
            col -= 1;
            if self.tab_stops[col] {
                break;
            }
        }

        col
    }

    fn handle_control(&mut self, control: u8) -> Result<()> {
        let mut pos = self.cursor;

        match control {
            c0::BS => {
                if pos.col > 0 {
                    pos.col -= 1;
                }
            }
            c0::HT => pos.col = self.next_tab_stop(pos.col),
            c0::CR => pos.col = 0,
            c0::LF => pos.row += 1,
            _ => {}
        }

        self.set_cursor(pos);

        Ok(())
    }

    pub(crate) fn handle_csi(&mut self, ev: &CsiEvent) -> Result<()> {
        let cmd = ev.csi_command();

        match cmd {
            csi::CUU | csi::VPB => self.cursor_up(ev),
            csi::CUD | csi::VPR => self.cursor_down(ev),
            csi::CUF | csi::HPR => self.cursor_forward(ev),
            csi::CUB | csi::HPB => self.cursor_backward(ev),
            csi::CNL => self.cursor_next_line(ev),
            csi::CPL => self.cursor_prev_line(ev),
            csi::CHA | csi::HPA => self.cursor_move_col(ev),
            csi::CUP | csi::HVP => self.cursor_move(ev),
            csi::VPA => self.cursor_move_row(ev),
            csi::CHT => self.cursor_tab_forward(ev),
            csi::CBT => self.cursor_tab_backward(ev),

            csi::ICH => self.insert_blank_chars(ev),
            csi::DCH => self.delete_chars(ev),
            csi::ECH => self.erase_chars(ev),
            csi::IL => self.insert_lines(ev),
            csi::DL => self.delete_lines(ev),
            csi::SU => self.scroll_up(ev),
            csi::SD => self.scroll_down(ev),
            csi::ED => self.erase_display(ev),
            csi::EL => self.erase_line(ev),

            csi::TBC => self.clear_tab_stop(ev),

            csi::SM => self.set_mode(ev, true),
            csi::RM => self.set_mode(ev, false),
            csi::SM_Q => self.set_dec_modes(ev, true),
            csi::RM_Q => self.set_dec_modes(ev, false),

            csi::SGR => self.select_graphics(ev),

            csi::DSR => self.status_report(ev),
            csi::DSR_Q => self.status_report_dec(ev),
            csi::DA => self.device_attributes(),
            csi::DA2 => self.device_attributes_secondary(),

            csi::DECSTR => {
                self.reset();
                Ok(())
            }
            csi::DECSTBM => self.set_top_bottom_margin(ev),

            _ => Err(Error::UnhandledCsi(cmd)),
        }
    }

    fn handle_escape(&mut self, data: &[u8]) -> Result<()> {
        let (&final_byte, intermediates) = match data.split_last() {
            Some(split) => split,
            None => return Err(Error::UnhandledEscape(Vec::new())),
        };

        match (intermediates, final_byte) {
            ([], b'7') => {
                self.saved_cursor = self.cursor;
                Ok(())
            }
            ([], b'8') => {
                let saved = self.saved_cursor;
                self.set_cursor(saved);
                Ok(())
            }
            ([], b'c') => {
                self.reset();
                self.cursor = Pos::default();
                Ok(())
            }
            ([], b'H') => {
                self.tab_stops[self.cursor.col] = true;
                Ok(())
            }
            ([], b'D') => self.handle_control(c0::LF),
            ([], b'E') => {
                self.handle_control(c0::LF)?;
                self.handle_control(c0::CR)
            }
            ([], b'M') => {
                let mut pos = self.cursor;
                pos.row = pos.row.saturating_sub(1);
                self.set_cursor(pos);
                Ok(())
            }
            _ => Err(Error::UnhandledEscape(data.to_vec())),
        }
    }

    fn handle_osc(&mut self, ev: OscEvent) -> Result<()> {
        match ev.command {
            0 => {
                self.output
                    .set_term_prop(TermProp::IconName(ev.data.clone()))?;
                self.output.set_term_prop(TermProp::Title(ev.data))
            }
            1 => self.output.set_term_prop(TermProp::IconName(ev.data)),
            2 => self.output.set_term_prop(TermProp::Title(ev.data)),
            _ => {
                debug!("unhandled OSC command {}", ev.command);
                Ok(())
            }
        }
    }

    fn cursor_move(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = Pos::default();

        let row = ev.arg(0, 0);
        if row > 0 {
            pos.row = (row - 1) as usize;
        }

        let col = ev.arg(1, 0);
        if col > 0 {
            pos.col = (col - 1) as usize;
        }

        pos.row = pos.row.min(self.rows - 1);
        pos.col = pos.col.min(self.cols - 1);

        if self.modes.origin {
            pos.row += self.scroll_region.top;
        }

        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_move_col(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;

        let col = ev.arg(0, 0);
        pos.col = if col > 0 { (col - 1) as usize } else { 0 };
        pos.col = pos.col.min(self.cols - 1);

        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_move_row(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;

        let row = ev.arg(0, 1);
        if row > 0 {
            pos.row = (row - 1) as usize;
        }
        pos.row = pos.row.min(self.rows - 1);

        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_up(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        pos.row = pos.row.saturating_sub(ev.count(0));
        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_down(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        pos.row = (pos.row + ev.count(0)).min(self.rows - 1);
        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_forward(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        pos.col = (pos.col + ev.count(0)).min(self.cols - 1);
        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_backward(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        pos.col = pos.col.saturating_sub(ev.count(0));
        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_next_line(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        pos.row = (pos.row + ev.count(0)).min(self.rows - 1);
        pos.col = 0;
        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_prev_line(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        pos.row = pos.row.saturating_sub(ev.count(0));
        pos.col = 0;
        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_tab_forward(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        for _ in 0..ev.count(0) {
            pos.col = self.next_tab_stop(pos.col);
        }
        self.set_cursor(pos);

        Ok(())
    }

    fn cursor_tab_backward(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut pos = self.cursor;
        for _ in 0..ev.count(0) {
            pos.col = self.prev_tab_stop(pos.col);
        }
        self.set_cursor(pos);

        Ok(())
    }

    /// ICH: open blank cells at the cursor by sliding the rest of the row
    /// right.
    fn insert_blank_chars(&mut self, ev: &CsiEvent) -> Result<()> {
        let start = self.cursor;
        let end = Pos::new(start.row, self.cols - 1);

        self.output
            .scroll_rect(Rect::new(start, end).scroll_right(ev.count(0)))
    }

    /// DCH: delete cells at the cursor by sliding the rest of the row
    /// left.
    fn delete_chars(&mut self, ev: &CsiEvent) -> Result<()> {
        let start = self.cursor;
        let end = Pos::new(start.row, self.cols - 1);

        self.output
            .scroll_rect(Rect::new(start, end).scroll_left(ev.count(0)))
    }

    fn erase_chars(&mut self, ev: &CsiEvent) -> Result<()> {
        let start = self.cursor;
        let end = Pos::new(
            start.row,
            (start.col + ev.count(0) - 1).min(self.cols - 1),
        );

        self.output.clear_rect(Rect::new(start, end))
    }

    fn insert_lines(&mut self, ev: &CsiEvent) -> Result<()> {
        let (_, bottom) = self.scroll_bounds();
        let start = Pos::new(self.cursor.row, 0);
        let end = Pos::new(bottom, self.cols - 1);

        self.output
            .scroll_rect(Rect::new(start, end).scroll_down(ev.count(0)))
    }

    fn delete_lines(&mut self, ev: &CsiEvent) -> Result<()> {
        let (_, bottom) = self.scroll_bounds();
        let start = Pos::new(self.cursor.row, 0);
        let end = Pos::new(bottom, self.cols - 1);

        self.output
            .scroll_rect(Rect::new(start, end).scroll_up(ev.count(0)))
    }

    fn scroll_up(&mut self, ev: &CsiEvent) -> Result<()> {
        let (top, bottom) = self.scroll_bounds();
        let rect = Rect::new(Pos::new(top, 0), Pos::new(bottom, self.cols - 1));

        self.output.scroll_rect(rect.scroll_up(ev.count(0)))
    }

    fn scroll_down(&mut self, ev: &CsiEvent) -> Result<()> {
        let (top, bottom) = self.scroll_bounds();
        let rect = Rect::new(Pos::new(top, 0), Pos::new(bottom, self.cols - 1));

        self.output.scroll_rect(rect.scroll_down(ev.count(0)))
    }

    fn erase_display(&mut self, ev: &CsiEvent) -> Result<()> {
        match ev.arg(0, 0) {
            0 => {
                // From the cursor to the end of the screen. A mid-row
                // cursor needs a separate rect for the rest of its row.
                let mut start = self.cursor;
                let end = Pos::new(self.rows - 1, self.cols - 1);

                if start.col > 0 {
                    let row_end = Pos::new(start.row, self.cols - 1);
                    self.output.clear_rect(Rect::new(start, row_end))?;

                    if start.row + 1 >= self.rows {
                        return Ok(());
                    }
                    start.row += 1;
                }

                start.col = 0;
                self.output.clear_rect(Rect::new(start, end))
            }
            1 => {
                // From the start of the screen to the cursor.
                if self.cursor.row > 0 {
                    let rect = Rect::new(
                        Pos::new(0, 0),
                        Pos::new(self.cursor.row - 1, self.cols - 1),
                    );
                    self.output.clear_rect(rect)?;
                }

                let rect = Rect::new(Pos::new(self.cursor.row, 0), self.cursor);
                self.output.clear_rect(rect)
            }
            2 => {
                let rect = Rect::new(
                    Pos::new(0, 0),
                    Pos::new(self.rows - 1, self.cols - 1),
                );
                self.output.clear_rect(rect)
            }
            _ => Ok(()),
        }
    }

    fn erase_line(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut start = self.cursor;
        let mut end = self.cursor;

        match ev.arg(0, 0) {
            0 => end.col = self.cols - 1,
            1 => start.col = 0,
            2 => {
                start.col = 0;
                end.col = self.cols - 1;
            }
            _ => return Ok(()),
        }

        self.output.clear_rect(Rect::new(start, end))
    }

    fn clear_tab_stop(&mut self, ev: &CsiEvent) -> Result<()> {
        match ev.arg(0, 0) {
            0 => self.tab_stops[self.cursor.col] = false,
            3 => self.tab_stops.iter_mut().for_each(|stop| *stop = false),
            _ => {}
        }

        Ok(())
    }

    fn set_mode(&mut self, ev: &CsiEvent, on: bool) -> Result<()> {
        for &mode in &ev.args {
            match mode {
                4 => self.modes.insert = on,
                20 => self.modes.newline = on,
                _ => debug!("unhandled ANSI mode {} (set={})", mode, on),
            }
        }

        Ok(())
    }

    fn set_dec_modes(&mut self, ev: &CsiEvent, on: bool) -> Result<()> {
        for &mode in &ev.args {
            self.set_dec_mode(mode, on)?;
        }

        Ok(())
    }

    fn set_dec_mode(&mut self, mode: i32, on: bool) -> Result<()> {
        match mode {
            1 => self.modes.cursor_keys = on,
            5 => return self.output.set_term_prop(TermProp::Reverse(on)),
            6 => {
                self.modes.origin = on;
                self.cursor = Pos::default();
            }
            7 => self.modes.autowrap = on,
            12 => return self.output.set_term_prop(TermProp::Blink(on)),
            25 => return self.output.set_term_prop(TermProp::Visible(on)),
            69 => self.modes.left_right_margin = on,
            1000 => {
                let mode = if on { MouseMode::Click } else { MouseMode::None };
                return self.output.set_term_prop(TermProp::Mouse(mode));
            }
            1002 => {
                let mode = if on { MouseMode::Drag } else { MouseMode::None };
                return self.output.set_term_prop(TermProp::Mouse(mode));
            }
            1003 => {
                let mode = if on { MouseMode::Move } else { MouseMode::None };
                return self.output.set_term_prop(TermProp::Mouse(mode));
            }
            1004 => self.modes.report_focus = on,
            1005 => {
                self.mouse_protocol = if on {
                    MouseProtocol::Utf8
                } else {
                    MouseProtocol::X10
                };
            }
            1006 => {
                self.mouse_protocol = if on {
                    MouseProtocol::Sgr
                } else {
                    MouseProtocol::X10
                };
            }
            1015 => {
                self.mouse_protocol = if on {
                    MouseProtocol::Rxvt
                } else {
                    MouseProtocol::X10
                };
            }
            1047 => return self.output.set_term_prop(TermProp::Altscreen(on)),
            1048 => {
                if on {
                    self.saved_cursor = self.cursor;
                } else {
                    let saved = self.saved_cursor;
                    self.set_cursor(saved);
                }
            }
            1049 => {
                if on {
                    self.saved_cursor = self.cursor;
                    return self.output.set_term_prop(TermProp::Altscreen(true));
                }

                self.output.set_term_prop(TermProp::Altscreen(false))?;
                let saved = self.saved_cursor;
                self.set_cursor(saved);
            }
            2004 => self.modes.bracketed_paste = on,
            _ => debug!("unhandled DEC private mode {} (set={})", mode, on),
        }

        Ok(())
    }

    fn reply(&mut self, body: &str) -> Result<()> {
        // Replies use the 8-bit CSI introducer.
        let mut data = vec![0x9b];
        data.extend_from_slice(body.as_bytes());
        self.output.output(&data)
    }

    fn status_report(&mut self, ev: &CsiEvent) -> Result<()> {
        match ev.arg(0, 0) {
            5 => self.reply("0n"),
            6 => {
                let body = format!("{};{}R", self.cursor.row + 1, self.cursor.col + 1);
                self.reply(&body)
            }
            _ => Ok(()),
        }
    }

    fn status_report_dec(&mut self, ev: &CsiEvent) -> Result<()> {
        match ev.arg(0, 0) {
            5 => self.reply("?0n"),
            6 => {
                let body = format!("?{};{}R", self.cursor.row + 1, self.cursor.col + 1);
                self.reply(&body)
            }
            _ => Ok(()),
        }
    }

    /// DA: report as a VT102 with advanced video.
    fn device_attributes(&mut self) -> Result<()> {
        self.reply("?1;2c")
    }

    fn device_attributes_secondary(&mut self) -> Result<()> {
        self.reply(">0;100;0c")
    }

    fn set_top_bottom_margin(&mut self, ev: &CsiEvent) -> Result<()> {
        let mut bottom = None;
        if ev.args.len() >= 2 {
            let arg = ev.args[1];
            if arg >= 1 {
                bottom = Some(((arg - 1) as usize).min(self.rows - 1));
            }
        }

        let mut top = 1;
        if !ev.args.is_empty() {
            top = ev.args[0];
        }
        let top = top.clamp(1, self.rows as i32) as usize;

        self.scroll_region.top = top - 1;
        self.scroll_region.bottom = bottom;

        Ok(())
    }
}

impl<O: Output> EventHandler for State<O> {
    type Error = Error;

    fn handle_event(&mut self, event: Event) -> Result<()> {
        State::handle_event(self, event)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Recording sink for state tests.
    #[derive(Debug, Default)]
    pub(crate) struct OpSink {
        pub set_cells: Vec<(Pos, CellRune)>,
        pub append_cells: Vec<(Pos, char)>,
        pub clear_rects: Vec<Rect>,
        pub scroll_rects: Vec<ScrollRect>,
        pub outputs: Vec<Vec<u8>>,
        pub term_props: Vec<TermProp>,
        pub pen_props: Vec<PenProp>,
        pub string_events: Vec<(StringKind, Vec<u8>)>,
        pub resize: Option<(usize, usize, Vec<LineInfo>)>,
    }

    impl Output for OpSink {
        fn set_cell(&mut self, pos: Pos, val: CellRune) -> Result<()> {
            self.set_cells.push((pos, val));
            Ok(())
        }

        fn append_cell(&mut self, pos: Pos, c: char) -> Result<()> {
            self.append_cells.push((pos, c));
            Ok(())
        }

        fn clear_rect(&mut self, rect: Rect) -> Result<()> {
            self.clear_rects.push(rect);
            Ok(())
        }

        fn scroll_rect(&mut self, rect: ScrollRect) -> Result<()> {
            self.scroll_rects.push(rect);
            Ok(())
        }

        fn output(&mut self, data: &[u8]) -> Result<()> {
            self.outputs.push(data.to_vec());
            Ok(())
        }

        fn set_term_prop(&mut self, prop: TermProp) -> Result<()> {
            self.term_props.push(prop);
            Ok(())
        }

        fn set_pen_prop(&mut self, prop: PenProp, _pen: PenState) -> Result<()> {
            self.pen_props.push(prop);
            Ok(())
        }

        fn string_event(&mut self, kind: StringKind, data: &[u8]) -> Result<()> {
            self.string_events.push((kind, data.to_vec()));
            Ok(())
        }

        fn resize(&mut self, rows: usize, cols: usize, lines: &[LineInfo]) -> Result<()> {
            self.resize = Some((rows, cols, lines.to_vec()));
            Ok(())
        }
    }

    pub(crate) fn csi_ev(command: u8, args: &[i32]) -> CsiEvent {
        CsiEvent {
            command,
            args: args.to_vec(),
            ..Default::default()
        }
    }

    pub(crate) fn sgr(args: &[i32]) -> CsiEvent {
        csi_ev(b'm', args)
    }

    fn dec_mode(command: u8, args: &[i32]) -> CsiEvent {
        CsiEvent {
            command,
            leader: vec![b'?'],
            args: args.to_vec(),
            ..Default::default()
        }
    }

    fn state(rows: usize, cols: usize) -> State<OpSink> {
        State::new(rows, cols, OpSink::default()).unwrap()
    }

    #[test]
    fn normal_output_generates_set_cells() {
        let mut s = state(25, 80);
        s.handle_event(Event::Text(b"hello".to_vec())).unwrap();

        let cells = &s.output().set_cells;
        assert_eq!(cells.len(), 5);
        for (i, expected) in "hello".chars().enumerate() {
            assert_eq!(cells[i].0, Pos::new(0, i));
            assert_eq!(cells[i].1, CellRune::new(expected));
        }
        assert_eq!(s.cursor(), Pos::new(0, 5));
    }

    #[test]
    fn utf8_input_decodes_to_runes() {
        let mut s = state(25, 80);
        s.handle_event(Event::Text(b"\xe2\x9d\xaf".to_vec()))
            .unwrap();

        let cells = &s.output().set_cells;
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].0, Pos::new(0, 0));
        assert_eq!(cells[0].1, CellRune::new('\u{276f}'));
        assert_eq!(s.cursor(), Pos::new(0, 1));
    }

    #[test]
    fn combining_char_appends_to_last_cell() {
        let mut s = state(25, 80);
        s.handle_event(Event::Text("e\u{0301}Z".as_bytes().to_vec()))
            .unwrap();

        let sink = s.output();
        assert_eq!(sink.set_cells.len(), 2);
        assert_eq!(sink.set_cells[0], (Pos::new(0, 0), CellRune::new('e')));
        assert_eq!(sink.set_cells[1], (Pos::new(0, 1), CellRune::new('Z')));
        assert_eq!(sink.append_cells, vec![(Pos::new(0, 0), '\u{0301}')]);
        assert_eq!(s.cursor(), Pos::new(0, 2));
    }

    #[test]
    fn combining_char_ignores_cursor_motion() {
        let mut s = state(25, 80);
        s.handle_event(Event::Text(b"e".to_vec())).unwrap();
        s.handle_csi(&csi_ev(b'B', &[3])).unwrap();
        s.handle_event(Event::Text("\u{0301}".as_bytes().to_vec()))
            .unwrap();

        // The mark lands on the glyph written before the cursor moved.
        assert_eq!(s.output().append_cells, vec![(Pos::new(0, 0), '\u{0301}')]);
    }

    #[test]
    fn control_characters_move_cursor() {
        let mut s = state(25, 80);
        s.handle_event(Event::Text(b"abc".to_vec())).unwrap();
        assert_eq!(s.cursor(), Pos::new(0, 3));

        s.handle_event(Event::Control(0x08)).unwrap();
        assert_eq!(s.cursor(), Pos::new(0, 2));

        s.handle_event(Event::Control(0x09)).unwrap();
        assert_eq!(s.cursor(), Pos::new(0, 8));

        s.handle_event(Event::Control(0x0a)).unwrap();
        assert_eq!(s.cursor(), Pos::new(1, 8));

        s.handle_event(Event::Control(0x0d)).unwrap();
        assert_eq!(s.cursor(), Pos::new(1, 0));
    }

    #[test]
    fn csi_cursor_movement_table() {
        let tests: &[(u8, &[i32], Pos)] = &[
            (b'H', &[4, 2], Pos::new(3, 1)),
            (b'C', &[], Pos::new(3, 2)),
            (b'C', &[3], Pos::new(3, 5)),
            (b'C', &[0], Pos::new(3, 6)),
            (b'C', &[1], Pos::new(3, 7)),
            (b'B', &[], Pos::new(4, 7)),
            (b'B', &[3], Pos::new(7, 7)),
            (b'B', &[0], Pos::new(8, 7)),
            (b'B', &[1], Pos::new(9, 7)),
            (b'A', &[], Pos::new(8, 7)),
            (b'A', &[3], Pos::new(5, 7)),
            (b'A', &[0], Pos::new(4, 7)),
            (b'A', &[1], Pos::new(3, 7)),
            (b'D', &[], Pos::new(3, 6)),
            (b'D', &[3], Pos::new(3, 3)),
            (b'D', &[0], Pos::new(3, 2)),
            (b'D', &[1], Pos::new(3, 1)),
            (b'E', &[], Pos::new(4, 0)),
            (b'E', &[3], Pos::new(7, 0)),
            (b'E', &[0], Pos::new(8, 0)),
            (b'E', &[1], Pos::new(9, 0)),
            (b'H', &[10, 2], Pos::new(9, 1)),
            (b'F', &[], Pos::new(8, 0)),
            (b'F', &[3], Pos::new(5, 0)),
            (b'F', &[0], Pos::new(4, 0)),
            (b'F', &[1], Pos::new(3, 0)),
            (b'H', &[10, 2], Pos::new(9, 1)),
            (b'G', &[], Pos::new(9, 0)),
            (b'G', &[3], Pos::new(9, 2)),
            (b'H', &[8], Pos::new(7, 0)),
            (b'H', &[], Pos::new(0, 0)),
            (b'A', &[], Pos::new(0, 0)),
            (b'D', &[], Pos::new(0, 0)),
            (b'H', &[25, 80], Pos::new(24, 79)),
            (b'B', &[], Pos::new(24, 79)),
            (b'C', &[], Pos::new(24, 79)),
            (b'E', &[], Pos::new(24, 0)),
            (b'H', &[], Pos::new(0, 0)),
            (b'F', &[], Pos::new(0, 0)),
            (b'G', &[999], Pos::new(0, 79)),
            (b'H', &[99, 99], Pos::new(24, 79)),
            (b'd', &[5], Pos::new(4, 79)),
            (b'H', &[1, 41], Pos::new(0, 40)),
            (b'I', &[], Pos::new(0, 48)),
            (b'I', &[2], Pos::new(0, 64)),
            (b'Z', &[], Pos::new(0, 56)),
            (b'Z', &[2], Pos::new(0, 40)),
        ];

        let mut s = state(25, 80);
        s.set_cursor(Pos::new(0, 3));

        for (i, (command, args, expected)) in tests.iter().enumerate() {
            s.handle_csi(&csi_ev(*command, args)).unwrap();
            assert_eq!(
                s.cursor(),
                *expected,
                "entry {}: CSI {:?} {}",
                i,
                args,
                *command as char
            );
        }
    }

    #[test]
    fn insert_blank_chars_emits_scroll_right() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(1, 3));

        s.handle_csi(&csi_ev(b'@', &[])).unwrap();
        assert_eq!(
            s.output().scroll_rects[0],
            Rect::new(Pos::new(1, 3), Pos::new(1, 79)).scroll_right(1)
        );

        s.handle_csi(&csi_ev(b'@', &[10])).unwrap();
        assert_eq!(
            s.output().scroll_rects[1],
            Rect::new(Pos::new(1, 3), Pos::new(1, 79)).scroll_right(10)
        );
    }

    #[test]
    fn delete_chars_emits_scroll_left() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(2, 5));

        s.handle_csi(&csi_ev(b'P', &[4])).unwrap();
        assert_eq!(
            s.output().scroll_rects[0],
            Rect::new(Pos::new(2, 5), Pos::new(2, 79)).scroll_left(4)
        );
    }

    #[test]
    fn erase_chars_clears_rect() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(1, 3));

        s.handle_csi(&csi_ev(b'X', &[])).unwrap();
        assert_eq!(
            s.output().clear_rects[0],
            Rect::new(Pos::new(1, 3), Pos::new(1, 3))
        );

        s.handle_csi(&csi_ev(b'X', &[10])).unwrap();
        assert_eq!(
            s.output().clear_rects[1],
            Rect::new(Pos::new(1, 3), Pos::new(1, 12))
        );
    }

    #[test]
    fn erase_display_from_cursor_decomposes() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(1, 3));

        s.handle_csi(&csi_ev(b'J', &[])).unwrap();
        assert_eq!(
            s.output().clear_rects,
            vec![
                Rect::new(Pos::new(1, 3), Pos::new(1, 79)),
                Rect::new(Pos::new(2, 0), Pos::new(24, 79)),
            ]
        );
    }

    #[test]
    fn erase_display_from_column_zero_is_one_rect() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(2, 0));

        s.handle_csi(&csi_ev(b'J', &[0])).unwrap();
        assert_eq!(
            s.output().clear_rects,
            vec![Rect::new(Pos::new(2, 0), Pos::new(24, 79))]
        );
    }

    #[test]
    fn erase_display_above_cursor() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(3, 10));

        s.handle_csi(&csi_ev(b'J', &[1])).unwrap();
        assert_eq!(
            s.output().clear_rects,
            vec![
                Rect::new(Pos::new(0, 0), Pos::new(2, 79)),
                Rect::new(Pos::new(3, 0), Pos::new(3, 10)),
            ]
        );
    }

    #[test]
    fn erase_display_whole_screen() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(3, 10));

        s.handle_csi(&csi_ev(b'J', &[2])).unwrap();
        assert_eq!(
            s.output().clear_rects,
            vec![Rect::new(Pos::new(0, 0), Pos::new(24, 79))]
        );
    }

    #[test]
    fn erase_line_modes() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(4, 7));

        s.handle_csi(&csi_ev(b'K', &[])).unwrap();
        s.handle_csi(&csi_ev(b'K', &[1])).unwrap();
        s.handle_csi(&csi_ev(b'K', &[2])).unwrap();

        assert_eq!(
            s.output().clear_rects,
            vec![
                Rect::new(Pos::new(4, 7), Pos::new(4, 79)),
                Rect::new(Pos::new(4, 0), Pos::new(4, 7)),
                Rect::new(Pos::new(4, 0), Pos::new(4, 79)),
            ]
        );
    }

    #[test]
    fn insert_and_delete_lines_scroll_to_region_bottom() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(5, 9));

        s.handle_csi(&csi_ev(b'L', &[2])).unwrap();
        assert_eq!(
            s.output().scroll_rects[0],
            Rect::new(Pos::new(5, 0), Pos::new(24, 79)).scroll_down(2)
        );

        s.handle_csi(&csi_ev(b'M', &[])).unwrap();
        assert_eq!(
            s.output().scroll_rects[1],
            Rect::new(Pos::new(5, 0), Pos::new(24, 79)).scroll_up(1)
        );
    }

    #[test]
    fn scroll_region_bounds_scroll_operations() {
        let mut s = state(25, 80);

        s.handle_csi(&csi_ev(b'r', &[5, 15])).unwrap();
        s.handle_csi(&csi_ev(b'S', &[3])).unwrap();
        assert_eq!(
            s.output().scroll_rects[0],
            Rect::new(Pos::new(4, 0), Pos::new(14, 79)).scroll_up(3)
        );

        s.handle_csi(&csi_ev(b'T', &[])).unwrap();
        assert_eq!(
            s.output().scroll_rects[1],
            Rect::new(Pos::new(4, 0), Pos::new(14, 79)).scroll_down(1)
        );
    }

    #[test]
    fn margin_without_bottom_extends_to_last_row() {
        let mut s = state(25, 80);

        s.handle_csi(&csi_ev(b'r', &[10])).unwrap();
        s.handle_csi(&csi_ev(b'S', &[])).unwrap();
        assert_eq!(
            s.output().scroll_rects[0],
            Rect::new(Pos::new(9, 0), Pos::new(24, 79)).scroll_up(1)
        );
    }

    #[test]
    fn status_reports() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(10, 20));

        s.handle_csi(&csi_ev(b'n', &[5])).unwrap();
        assert_eq!(s.output().outputs[0], b"\x9b0n");

        s.handle_csi(&csi_ev(b'n', &[6])).unwrap();
        assert_eq!(s.output().outputs[1], b"\x9b11;21R");

        s.handle_csi(&dec_mode(b'n', &[6])).unwrap();
        assert_eq!(s.output().outputs[2], b"\x9b?11;21R");
    }

    #[test]
    fn device_attribute_replies() {
        let mut s = state(25, 80);

        s.handle_csi(&csi_ev(b'c', &[])).unwrap();
        assert_eq!(s.output().outputs[0], b"\x9b?1;2c");

        s.handle_csi(&CsiEvent {
            command: b'c',
            leader: vec![b'>'],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.output().outputs[1], b"\x9b>0;100;0c");
    }

    #[test]
    fn dec_modes_emit_term_props() {
        let mut s = state(25, 80);

        s.handle_csi(&dec_mode(b'h', &[25])).unwrap();
        assert_eq!(s.output().term_props[0], TermProp::Visible(true));

        s.handle_csi(&dec_mode(b'l', &[25])).unwrap();
        assert_eq!(s.output().term_props[1], TermProp::Visible(false));

        s.handle_csi(&dec_mode(b'h', &[1000])).unwrap();
        assert_eq!(s.output().term_props[2], TermProp::Mouse(MouseMode::Click));

        s.handle_csi(&dec_mode(b'l', &[1000])).unwrap();
        assert_eq!(s.output().term_props[3], TermProp::Mouse(MouseMode::None));

        s.handle_csi(&dec_mode(b'h', &[1006])).unwrap();
        assert_eq!(s.mouse_protocol(), MouseProtocol::Sgr);

        s.handle_csi(&dec_mode(b'l', &[1006])).unwrap();
        assert_eq!(s.mouse_protocol(), MouseProtocol::X10);
    }

    #[test]
    fn altscreen_with_cursor_save() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(7, 11));

        s.handle_csi(&dec_mode(b'h', &[1049])).unwrap();
        assert_eq!(s.output().term_props[0], TermProp::Altscreen(true));

        s.set_cursor(Pos::new(0, 0));
        s.handle_csi(&dec_mode(b'l', &[1049])).unwrap();
        assert_eq!(s.output().term_props[1], TermProp::Altscreen(false));
        assert_eq!(s.cursor(), Pos::new(7, 11));
    }

    #[test]
    fn origin_mode_homes_and_confines_cursor() {
        let mut s = state(25, 80);
        s.handle_csi(&csi_ev(b'r', &[5, 15])).unwrap();

        s.handle_csi(&dec_mode(b'h', &[6])).unwrap();
        assert!(s.modes().origin);

        // CUP is relative to the scroll top and clamped to the region.
        s.handle_csi(&csi_ev(b'H', &[3, 1])).unwrap();
        assert_eq!(s.cursor(), Pos::new(6, 0));

        s.handle_csi(&csi_ev(b'H', &[99, 1])).unwrap();
        assert_eq!(s.cursor(), Pos::new(14, 0));
    }

    #[test]
    fn mode_settings_toggle() {
        let mut s = state(25, 80);

        s.handle_csi(&csi_ev(b'h', &[4])).unwrap();
        assert!(s.modes().insert);
        s.handle_csi(&csi_ev(b'l', &[4])).unwrap();
        assert!(!s.modes().insert);

        s.handle_csi(&dec_mode(b'h', &[2004])).unwrap();
        assert!(s.modes().bracketed_paste);
        s.handle_csi(&dec_mode(b'l', &[2004])).unwrap();
        assert!(!s.modes().bracketed_paste);
    }

    #[test]
    fn tab_stop_clearing() {
        let mut s = state(25, 80);

        s.set_cursor(Pos::new(0, 8));
        s.handle_csi(&csi_ev(b'g', &[])).unwrap();
        s.set_cursor(Pos::new(0, 0));
        s.handle_event(Event::Control(0x09)).unwrap();
        assert_eq!(s.cursor(), Pos::new(0, 16));

        s.handle_csi(&csi_ev(b'g', &[3])).unwrap();
        s.set_cursor(Pos::new(0, 0));
        s.handle_event(Event::Control(0x09)).unwrap();
        assert_eq!(s.cursor(), Pos::new(0, 79));
    }

    #[test]
    fn soft_reset_restores_defaults() {
        let mut s = state(25, 80);

        s.handle_csi(&csi_ev(b'h', &[4])).unwrap();
        s.handle_csi(&csi_ev(b'r', &[5, 15])).unwrap();

        s.handle_csi(&CsiEvent {
            command: b'p',
            intermediates: vec![b'!'],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(*s.modes(), Modes::default());
        s.handle_csi(&csi_ev(b'S', &[])).unwrap();
        assert_eq!(
            s.output().scroll_rects[0],
            Rect::new(Pos::new(0, 0), Pos::new(24, 79)).scroll_up(1)
        );
    }

    #[test]
    fn unknown_csi_is_surfaced() {
        let mut s = state(25, 80);

        let err = s.handle_csi(&csi_ev(b'y', &[])).unwrap_err();
        assert!(matches!(err, Error::UnhandledCsi(_)));
    }

    #[test]
    fn osc_sets_title_props() {
        let mut s = state(25, 80);
        s.handle_event(Event::Osc(OscEvent {
            command: 0,
            data: "shell".to_string(),
        }))
        .unwrap();

        assert_eq!(
            s.output().term_props,
            vec![
                TermProp::IconName("shell".to_string()),
                TermProp::Title("shell".to_string()),
            ]
        );
    }

    #[test]
    fn dcs_passes_through() {
        let mut s = state(25, 80);
        s.handle_event(Event::Str(tatami_parser::StringEvent {
            kind: StringKind::Dcs,
            data: b"payload".to_vec(),
        }))
        .unwrap();

        assert_eq!(
            s.output().string_events,
            vec![(StringKind::Dcs, b"payload".to_vec())]
        );
    }

    #[test]
    fn escape_save_restore_cursor() {
        let mut s = state(25, 80);
        s.set_cursor(Pos::new(6, 12));

        s.handle_event(Event::Escape(b"7".to_vec())).unwrap();
        s.set_cursor(Pos::new(0, 0));
        s.handle_event(Event::Escape(b"8".to_vec())).unwrap();

        assert_eq!(s.cursor(), Pos::new(6, 12));
    }

    #[test]
    fn wrap_marks_continuation_rows() {
        let mut s = state(20, 80);
        let long = "X".repeat(100);

        s.handle_event(Event::Text(long.into_bytes())).unwrap();

        assert!(s.line_info()[1].continuation);
        assert!(!s.line_info()[0].continuation);
        assert_eq!(s.cursor(), Pos::new(1, 20));
    }

    #[test]
    fn resize_broadcasts_line_info() {
        let mut s = state(20, 80);
        let long = "X".repeat(100);
        s.handle_event(Event::Text(long.into_bytes())).unwrap();

        s.resize(20, 110).unwrap();

        let (rows, cols, lines) = s.output().resize.clone().unwrap();
        assert_eq!(rows, 20);
        assert_eq!(cols, 110);
        assert!(lines[1].continuation);

        // The local vector restarts; tab stops cover the new width.
        assert!(!s.line_info()[1].continuation);
        s.set_cursor(Pos::new(0, 100));
        s.handle_event(Event::Control(0x09)).unwrap();
        assert_eq!(s.cursor(), Pos::new(0, 104));
    }
}
