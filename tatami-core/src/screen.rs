//! The screen buffer: materialises grid intents into cells and reports
//! damage to the renderer.
//!
//! `Screen` implements the [`Output`] contract the state emits into, owns
//! the primary and alternate buffers, and performs the rectangular scroll
//! and erase primitives. Reflow on resize lives here; it is driven by the
//! continuation vector the state passes down.

use std::rc::Rc;

use tatami_parser::StringKind;

use crate::buffer::Buffer;
use crate::cell::ScreenCell;
use crate::error::{Error, Result};
use crate::line::Line;
use crate::pen::{PenProp, PenState};
use crate::state::Output;
use crate::types::{CellRune, LineInfo, Pos, Rect, ScrollDirection, ScrollRect, TermProp};

/// Renderer-facing interface: damage notifications and pass-throughs.
pub trait Updates {
    /// A region whose cells changed and must be repainted. Rects arrive in
    /// generation order and are never wider than the operation that
    /// produced them.
    fn damage_done(&mut self, rect: Rect) -> Result<()>;

    fn move_cursor(&mut self, pos: Pos) -> Result<()>;
    fn set_term_prop(&mut self, prop: TermProp) -> Result<()>;

    /// Bytes to forward toward the child process.
    fn output(&mut self, data: &[u8]) -> Result<()>;

    fn string_event(&mut self, kind: StringKind, data: &[u8]) -> Result<()>;
}

pub struct Screen<U: Updates> {
    rows: usize,
    cols: usize,

    /// Pen attached to subsequently written cells; replaced wholesale on
    /// every pen change so cells share one allocation per rendition.
    pen: Rc<PenState>,

    primary: Buffer,
    alternate: Buffer,
    using_alternate: bool,

    updates: U,
}

impl<U: Updates> Screen<U> {
    pub fn new(rows: usize, cols: usize, updates: U) -> Result<Self> {
        Ok(Screen {
            rows,
            cols,
            pen: Rc::default(),
            primary: Buffer::new(rows, cols),
            alternate: Buffer::new(rows, cols),
            using_alternate: false,
            updates,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_using_alternate(&self) -> bool {
        self.using_alternate
    }

    pub fn updates(&self) -> &U {
        &self.updates
    }

    pub fn updates_mut(&mut self) -> &mut U {
        &mut self.updates
    }

    fn buffer(&self) -> &Buffer {
        if self.using_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn buffer_mut(&mut self) -> &mut Buffer {
        if self.using_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Result<&ScreenCell> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::OutOfBounds { row, col });
        }

        Ok(self.buffer().cell(row, col))
    }

    /// The row's text with empty cells rendered as spaces and the tail
    /// trimmed. Combining marks are included after their base.
    pub fn row_text(&self, row: usize) -> String {
        let mut text = String::new();

        for col in 0..self.cols {
            let (base, combining) = self.buffer().cell(row, col).value();
            text.push(if base == '\0' { ' ' } else { base });
            text.extend(combining);
        }

        text.trim_end().to_string()
    }

    pub fn move_cursor(&mut self, pos: Pos) -> Result<()> {
        self.updates.move_cursor(pos)
    }

    fn damage_pos(&mut self, pos: Pos) -> Result<()> {
        self.updates.damage_done(Rect::new(pos, pos))
    }

    fn damage_rect(&mut self, rect: Rect) -> Result<()> {
        self.updates.damage_done(rect)
    }

    /// Intersect with the screen rectangle; `None` when nothing remains.
    fn clamp_rect(&self, mut rect: Rect) -> Option<Rect> {
        if rect.start.row >= self.rows || rect.start.col >= self.cols {
            return None;
        }

        rect.end.row = rect.end.row.min(self.rows - 1);
        rect.end.col = rect.end.col.min(self.cols - 1);

        if rect.end.row < rect.start.row || rect.end.col < rect.start.col {
            return None;
        }

        Some(rect)
    }

    fn slide_right(&mut self, rect: Rect, distance: usize) {
        let keep = rect.width() - distance;
        let blank = Rc::new(PenState::default());
        let start = rect.start.col;

        for row in rect.start.row..=rect.end.row {
            let buffer = self.buffer_mut();
            buffer.move_in_row(row, start, start + distance, keep);
            buffer.erase_in_row(row, start, distance, &blank);
        }
    }

    fn slide_left(&mut self, rect: Rect, distance: usize) {
        let keep = rect.width() - distance;
        let blank = Rc::new(PenState::default());
        let start = rect.start.col;

        for row in rect.start.row..=rect.end.row {
            let buffer = self.buffer_mut();
            buffer.move_in_row(row, start + distance, start, keep);
            buffer.erase_in_row(row, start + keep, distance, &blank);
        }
    }

    fn slide_down(&mut self, rect: Rect, distance: usize) {
        let width = rect.width();
        let blank = Rc::new(PenState::default());
        let start = rect.start.col;

        for row in (rect.start.row..=rect.end.row - distance).rev() {
            self.buffer_mut()
                .move_between_rows(row, row + distance, start, width);
        }

        for row in rect.start.row..rect.start.row + distance {
            self.buffer_mut().erase_in_row(row, start, width, &blank);
        }
    }

    fn slide_up(&mut self, rect: Rect, distance: usize) {
        let width = rect.width();
        let blank = Rc::new(PenState::default());
        let start = rect.start.col;

        for row in rect.start.row + distance..=rect.end.row {
            self.buffer_mut()
                .move_between_rows(row, row - distance, start, width);
        }

        for row in rect.end.row - distance + 1..=rect.end.row {
            self.buffer_mut().erase_in_row(row, start, width, &blank);
        }
    }

    fn erase_rect(&mut self, rect: Rect, pen: &Rc<PenState>) {
        let start = rect.start.col;
        let width = rect.width();

        for row in rect.start.row..=rect.end.row {
            self.buffer_mut().erase_in_row(row, start, width, pen);
        }
    }

    /// Rebuild the primary buffer at the new dimensions, joining
    /// continuation rows into logical lines and re-wrapping them. Rows
    /// carry their own continuation flags from earlier reflows; `info`
    /// adds the wraps the state observed since. No damage is emitted —
    /// the renderer repaints after a resize.
    fn reflow(&mut self, new_rows: usize, new_cols: usize, info: &[LineInfo]) {
        let old = std::mem::replace(&mut self.primary, Buffer::new(new_rows, new_cols));

        let mut logical: Vec<Vec<ScreenCell>> = Vec::new();
        for (idx, line) in old.into_lines().into_iter().enumerate() {
            let continuation =
                line.continuation || info.get(idx).map(|li| li.continuation).unwrap_or(false);

            let occupied = line.occupied();
            let mut cells = line.into_cells();
            cells.truncate(occupied);

            match logical.last_mut() {
                Some(last) if continuation => last.extend(cells),
                _ => logical.push(cells),
            }
        }

        let mut lines: Vec<Line> = Vec::new();
        for cells in logical {
            if cells.is_empty() {
                lines.push(Line::new(new_cols));
                continue;
            }

            for (i, chunk) in cells.chunks(new_cols).enumerate() {
                let mut padded = chunk.to_vec();
                padded.resize(new_cols, ScreenCell::default());

                let mut line = Line::from_cells(padded);
                line.continuation = i > 0;
                lines.push(line);
            }
        }

        if lines.len() > new_rows {
            lines.drain(..lines.len() - new_rows);
        }
        while lines.len() < new_rows {
            lines.push(Line::new(new_cols));
        }

        self.primary = Buffer::from_lines(new_rows, new_cols, lines);
        self.alternate = Buffer::new(new_rows, new_cols);
        self.rows = new_rows;
        self.cols = new_cols;
    }

    fn set_altscreen(&mut self, on: bool) {
        if on && !self.using_alternate {
            self.alternate = Buffer::new(self.rows, self.cols);
            self.using_alternate = true;
        } else if !on && self.using_alternate {
            self.using_alternate = false;
        }
    }
}

impl<U: Updates> Output for Screen<U> {
    fn set_cell(&mut self, pos: Pos, val: CellRune) -> Result<()> {
        if val.width != 1 {
            return Err(Error::UnsupportedWidth(val.width));
        }

        if pos.row >= self.rows || pos.col >= self.cols {
            return Ok(());
        }

        let pen = Rc::clone(&self.pen);
        self.buffer_mut().cell_mut(pos.row, pos.col).reset(val.c, pen);

        self.damage_pos(pos)
    }

    fn append_cell(&mut self, pos: Pos, c: char) -> Result<()> {
        if pos.row >= self.rows || pos.col >= self.cols {
            return Ok(());
        }

        self.buffer_mut().cell_mut(pos.row, pos.col).add_combining(c);

        self.damage_pos(pos)
    }

    fn clear_rect(&mut self, rect: Rect) -> Result<()> {
        let rect = match self.clamp_rect(rect) {
            Some(rect) => rect,
            None => return Ok(()),
        };

        let pen = Rc::clone(&self.pen);
        self.erase_rect(rect, &pen);

        self.damage_rect(rect)
    }

    fn scroll_rect(&mut self, sr: ScrollRect) -> Result<()> {
        let rect = match self.clamp_rect(sr.rect) {
            Some(rect) => rect,
            None => return Ok(()),
        };

        if sr.distance == 0 {
            return Ok(());
        }

        let blank = Rc::new(PenState::default());

        match sr.direction {
            ScrollDirection::Right => {
                if sr.distance >= rect.width() {
                    self.erase_rect(rect, &blank);
                } else {
                    self.slide_right(rect, sr.distance);
                }
            }
            ScrollDirection::Left => {
                if sr.distance >= rect.width() {
                    self.erase_rect(rect, &blank);
                } else {
                    self.slide_left(rect, sr.distance);
                }
            }
            ScrollDirection::Down => {
                if sr.distance >= rect.height() {
                    self.erase_rect(rect, &blank);
                } else {
                    self.slide_down(rect, sr.distance);
                }
            }
            ScrollDirection::Up => {
                if sr.distance >= rect.height() {
                    self.erase_rect(rect, &blank);
                } else {
                    self.slide_up(rect, sr.distance);
                }
            }
        }

        self.damage_rect(rect)
    }

    fn output(&mut self, data: &[u8]) -> Result<()> {
        self.updates.output(data)
    }

    fn set_term_prop(&mut self, prop: TermProp) -> Result<()> {
        if let TermProp::Altscreen(on) = prop {
            self.set_altscreen(on);
        }

        self.updates.set_term_prop(prop)
    }

    fn set_pen_prop(&mut self, _prop: PenProp, pen: PenState) -> Result<()> {
        self.pen = Rc::new(pen);
        Ok(())
    }

    fn string_event(&mut self, kind: StringKind, data: &[u8]) -> Result<()> {
        self.updates.string_event(kind, data)
    }

    fn resize(&mut self, rows: usize, cols: usize, lines: &[LineInfo]) -> Result<()> {
        self.reflow(rows, cols, lines);
        Ok(())
    }
}
