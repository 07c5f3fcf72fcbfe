//! Geometry and value types shared across the engine.

use serde::{Deserialize, Serialize};

/// A cell position: 0-based row and column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }
}

/// An inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub start: Pos,
    pub end: Pos,
}

impl Rect {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Rect { start, end }
    }

    pub fn width(&self) -> usize {
        self.end.col - self.start.col + 1
    }

    pub fn height(&self) -> usize {
        self.end.row - self.start.row + 1
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.row >= self.start.row
            && pos.row <= self.end.row
            && pos.col >= self.start.col
            && pos.col <= self.end.col
    }

    /// Split into left and right halves; the right half takes the odd
    /// column.
    pub fn split_even_columns(&self) -> (Rect, Rect) {
        self.split_at_col(self.start.col + self.width() / 2)
    }

    /// Split into top and bottom halves; the bottom half takes the odd
    /// row.
    pub fn split_even_rows(&self) -> (Rect, Rect) {
        self.split_at_row(self.start.row + self.height() / 2)
    }

    /// Split vertically, giving the right side `pct` percent of the
    /// columns (rounded up).
    pub fn split_columns(&self, pct: f32) -> (Rect, Rect) {
        let right = ((self.width() as f32) * pct / 100.0).ceil() as usize;
        self.split_at_col(self.start.col + self.width() - right)
    }

    /// Split horizontally, giving the bottom side `pct` percent of the
    /// rows (rounded up).
    pub fn split_rows(&self, pct: f32) -> (Rect, Rect) {
        let bottom = ((self.height() as f32) * pct / 100.0).ceil() as usize;
        self.split_at_row(self.start.row + self.height() - bottom)
    }

    fn split_at_col(&self, col: usize) -> (Rect, Rect) {
        let left = Rect::new(self.start, Pos::new(self.end.row, col - 1));
        let right = Rect::new(Pos::new(self.start.row, col), self.end);
        (left, right)
    }

    fn split_at_row(&self, row: usize) -> (Rect, Rect) {
        let top = Rect::new(self.start, Pos::new(row - 1, self.end.col));
        let bottom = Rect::new(Pos::new(row, self.start.col), self.end);
        (top, bottom)
    }

    pub fn scroll_up(self, distance: usize) -> ScrollRect {
        ScrollRect {
            rect: self,
            direction: ScrollDirection::Up,
            distance,
        }
    }

    pub fn scroll_down(self, distance: usize) -> ScrollRect {
        ScrollRect {
            rect: self,
            direction: ScrollDirection::Down,
            distance,
        }
    }

    pub fn scroll_left(self, distance: usize) -> ScrollRect {
        ScrollRect {
            rect: self,
            direction: ScrollDirection::Left,
            distance,
        }
    }

    pub fn scroll_right(self, distance: usize) -> ScrollRect {
        ScrollRect {
            rect: self,
            direction: ScrollDirection::Right,
            distance,
        }
    }
}

/// Which way a [`ScrollRect`] moves its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollDirection {
    /// Content moves toward the top of the rect.
    Up,
    /// Content moves toward the bottom of the rect.
    Down,
    /// Content moves toward the left edge of the rect.
    Left,
    /// Content moves toward the right edge of the rect.
    Right,
}

/// A rectangle together with a scroll direction and distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollRect {
    pub rect: Rect,
    pub direction: ScrollDirection,
    pub distance: usize,
}

/// A glyph to be written into a cell.
///
/// Width 2 is reserved for full-width glyphs; the screen refuses it until
/// the grid pairs two columns per glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRune {
    pub c: char,
    pub width: u8,
}

impl CellRune {
    pub const fn new(c: char) -> Self {
        CellRune { c, width: 1 }
    }
}

/// Per-row metadata the state hands to the screen on resize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    /// The row continues the logical line started on the previous row.
    pub continuation: bool,
}

/// Mouse reporting granularity requested by the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseMode {
    #[default]
    None,
    Click,
    Drag,
    Move,
}

/// Wire encoding for mouse reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseProtocol {
    #[default]
    X10,
    Utf8,
    Sgr,
    Rxvt,
}

/// Terminal-level properties forwarded to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermProp {
    Reverse(bool),
    Blink(bool),
    Visible(bool),
    Mouse(MouseMode),
    Altscreen(bool),
    Title(String),
    IconName(String),
}
