//! Graphic rendition: colors, pen attributes, and the SGR decoder.
//!
//! The pen is a compact description of how subsequently written cells are
//! drawn. `CSI … m` mutates it; every effective change is mirrored to the
//! sink as a [`PenProp`] so a renderer can track the rendition without
//! re-reading cells. Re-asserting an attribute the pen already carries
//! emits nothing.

use log::trace;
use serde::{Deserialize, Serialize};

use tatami_parser::CsiEvent;

use crate::error::Result;
use crate::state::{Output, State};

/// A terminal color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    /// The terminal's configured foreground or background.
    #[default]
    Default,
    /// Palette index: 0-15 for the ANSI colors, 16-255 for the extended
    /// palette.
    Indexed(u8),
    /// 24-bit true color.
    Rgb(Rgb),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

/// Bitset of graphic attributes.
///
/// Some attributes are grouped: at most one of each group is active at a
/// time, and the grouped masks select the whole group for replacement.
/// Curly underline is represented as both underline bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PenFlags {
    bits: u16,
}

impl PenFlags {
    pub const NONE: u16 = 0;

    pub const BOLD: u16 = 1 << 0;
    pub const FAINT: u16 = 1 << 1;
    pub const BLINK: u16 = 1 << 2;
    pub const CONCEAL: u16 = 1 << 3;
    pub const ITALIC: u16 = 1 << 4;
    pub const FRAKTUR: u16 = 1 << 5;
    pub const UNDERLINE_SINGLE: u16 = 1 << 6;
    pub const UNDERLINE_DOUBLE: u16 = 1 << 7;
    pub const REVERSE: u16 = 1 << 8;
    pub const STRIKETHROUGH: u16 = 1 << 9;
    pub const FRAMED: u16 = 1 << 10;
    pub const ENCIRCLED: u16 = 1 << 11;
    pub const OVERLINED: u16 = 1 << 12;

    pub const INTENSITY: u16 = Self::BOLD | Self::FAINT;
    pub const STYLE: u16 = Self::ITALIC | Self::FRAKTUR;
    pub const UNDERLINE_CURLY: u16 = Self::UNDERLINE_SINGLE | Self::UNDERLINE_DOUBLE;
    pub const UNDERLINE: u16 = Self::UNDERLINE_CURLY;
    pub const WRAPPER: u16 = Self::FRAMED | Self::ENCIRCLED;

    pub const fn empty() -> Self {
        PenFlags { bits: Self::NONE }
    }

    pub const fn new(bits: u16) -> Self {
        PenFlags { bits }
    }

    pub fn contains(&self, flag: u16) -> bool {
        self.bits & flag != 0
    }

    pub fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.bits |= flag;
        } else {
            self.bits &= !flag;
        }
    }

    /// The bits selected by `mask`.
    pub fn masked(&self, mask: u16) -> PenFlags {
        PenFlags {
            bits: self.bits & mask,
        }
    }

    /// Replace the group selected by `mask` with `bits`.
    pub fn replace(&mut self, mask: u16, bits: u16) {
        self.bits = (self.bits & !mask) | (bits & mask);
    }

    pub fn bits(&self) -> u16 {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

/// The full drawing state attached to written cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenState {
    pub flags: PenFlags,
    pub font: u8,
    pub fg: Color,
    pub bg: Color,
}

/// One effective pen change, forwarded to the sink alongside the full pen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenProp {
    Intensity(PenFlags),
    Style(PenFlags),
    Underline(PenFlags),
    Wrapper(PenFlags),
    Blink(bool),
    Reverse(bool),
    Conceal(bool),
    Strikethrough(bool),
    Overlined(bool),
    Font(u8),
    Foreground(Color),
    Background(Color),
}

/// `38;5;N`, `38;2;R;G;B` and the `48` background forms. Returns the color
/// and the number of arguments consumed including the introducer.
fn parse_extended_color(args: &[i32]) -> Option<(Color, usize)> {
    match args.get(1)? {
        5 => {
            let idx = *args.get(2)?;
            Some((Color::Indexed(idx.clamp(0, 255) as u8), 3))
        }
        2 if args.len() >= 5 => {
            let r = args[2].clamp(0, 255) as u8;
            let g = args[3].clamp(0, 255) as u8;
            let b = args[4].clamp(0, 255) as u8;
            Some((Color::Rgb(Rgb::new(r, g, b)), 5))
        }
        _ => None,
    }
}

impl<O: Output> State<O> {
    /// Select Graphic Rendition (`CSI … m`).
    pub(crate) fn select_graphics(&mut self, ev: &CsiEvent) -> Result<()> {
        let default = [0i32];
        let args: &[i32] = if ev.args.is_empty() {
            &default
        } else {
            &ev.args
        };

        let mut i = 0;
        while i < args.len() {
            let code = args[i].max(0);
            match code {
                0 => self.reset_pen()?,
                1 => self.set_intensity(PenFlags::BOLD)?,
                2 => self.set_intensity(PenFlags::FAINT)?,
                3 => self.set_style(PenFlags::ITALIC)?,
                4 => {
                    // A trailing 0-3 selects the underline shape; anything
                    // else is an unrelated code and 4 means single.
                    let bits = if i + 2 == args.len() && (0..=3).contains(&args[i + 1]) {
                        i += 1;
                        match args[i] {
                            1 => PenFlags::UNDERLINE_SINGLE,
                            2 => PenFlags::UNDERLINE_DOUBLE,
                            3 => PenFlags::UNDERLINE_CURLY,
                            _ => PenFlags::NONE,
                        }
                    } else {
                        PenFlags::UNDERLINE_SINGLE
                    };
                    self.set_underline(bits)?;
                }
                5 | 6 => self.set_pen_flag(PenFlags::BLINK, true, PenProp::Blink)?,
                7 => self.set_pen_flag(PenFlags::REVERSE, true, PenProp::Reverse)?,
                8 => self.set_pen_flag(PenFlags::CONCEAL, true, PenProp::Conceal)?,
                9 => self.set_pen_flag(PenFlags::STRIKETHROUGH, true, PenProp::Strikethrough)?,
                10..=19 => self.set_font((code - 10) as u8)?,
                20 => self.set_style(PenFlags::FRAKTUR)?,
                21 => self.set_underline(PenFlags::UNDERLINE_DOUBLE)?,
                22 => self.set_intensity(PenFlags::NONE)?,
                23 => self.set_style(PenFlags::NONE)?,
                24 => self.set_underline(PenFlags::NONE)?,
                25 => self.set_pen_flag(PenFlags::BLINK, false, PenProp::Blink)?,
                27 => self.set_pen_flag(PenFlags::REVERSE, false, PenProp::Reverse)?,
                28 => self.set_pen_flag(PenFlags::CONCEAL, false, PenProp::Conceal)?,
                29 => self.set_pen_flag(PenFlags::STRIKETHROUGH, false, PenProp::Strikethrough)?,
                30..=37 => self.set_foreground(Color::Indexed((code - 30) as u8))?,
                38 => {
                    if let Some((color, consumed)) = parse_extended_color(&args[i..]) {
                        self.set_foreground(color)?;
                        i += consumed - 1;
                    }
                }
                39 => self.set_foreground(Color::Default)?,
                40..=47 => self.set_background(Color::Indexed((code - 40) as u8))?,
                48 => {
                    if let Some((color, consumed)) = parse_extended_color(&args[i..]) {
                        self.set_background(color)?;
                        i += consumed - 1;
                    }
                }
                49 => self.set_background(Color::Default)?,
                51 => self.set_wrapper(PenFlags::FRAMED)?,
                52 => self.set_wrapper(PenFlags::ENCIRCLED)?,
                53 => self.set_pen_flag(PenFlags::OVERLINED, true, PenProp::Overlined)?,
                54 => self.set_wrapper(PenFlags::NONE)?,
                55 => self.set_pen_flag(PenFlags::OVERLINED, false, PenProp::Overlined)?,
                90..=97 => self.set_foreground(Color::Indexed((code - 90 + 8) as u8))?,
                100..=107 => self.set_background(Color::Indexed((code - 100 + 8) as u8))?,
                _ => trace!("unhandled SGR code {}", code),
            }
            i += 1;
        }

        Ok(())
    }

    /// SGR 0: one emission per group that was not already default.
    pub(crate) fn reset_pen(&mut self) -> Result<()> {
        self.set_intensity(PenFlags::NONE)?;
        self.set_style(PenFlags::NONE)?;
        self.set_underline(PenFlags::NONE)?;
        self.set_wrapper(PenFlags::NONE)?;
        self.set_pen_flag(PenFlags::BLINK, false, PenProp::Blink)?;
        self.set_pen_flag(PenFlags::REVERSE, false, PenProp::Reverse)?;
        self.set_pen_flag(PenFlags::CONCEAL, false, PenProp::Conceal)?;
        self.set_pen_flag(PenFlags::STRIKETHROUGH, false, PenProp::Strikethrough)?;
        self.set_pen_flag(PenFlags::OVERLINED, false, PenProp::Overlined)?;
        self.set_font(0)?;
        self.set_foreground(Color::Default)?;
        self.set_background(Color::Default)
    }

    fn emit_pen(&mut self, prop: PenProp) -> Result<()> {
        let pen = self.pen;
        self.output.set_pen_prop(prop, pen)
    }

    fn set_intensity(&mut self, bits: u16) -> Result<()> {
        if self.pen.flags.masked(PenFlags::INTENSITY).bits() == bits {
            return Ok(());
        }
        self.pen.flags.replace(PenFlags::INTENSITY, bits);
        self.emit_pen(PenProp::Intensity(PenFlags::new(bits)))
    }

    fn set_style(&mut self, bits: u16) -> Result<()> {
        if self.pen.flags.masked(PenFlags::STYLE).bits() == bits {
            return Ok(());
        }
        self.pen.flags.replace(PenFlags::STYLE, bits);
        self.emit_pen(PenProp::Style(PenFlags::new(bits)))
    }

    fn set_underline(&mut self, bits: u16) -> Result<()> {
        if self.pen.flags.masked(PenFlags::UNDERLINE).bits() == bits {
            return Ok(());
        }
        self.pen.flags.replace(PenFlags::UNDERLINE, bits);
        self.emit_pen(PenProp::Underline(PenFlags::new(bits)))
    }

    fn set_wrapper(&mut self, bits: u16) -> Result<()> {
        if self.pen.flags.masked(PenFlags::WRAPPER).bits() == bits {
            return Ok(());
        }
        self.pen.flags.replace(PenFlags::WRAPPER, bits);
        self.emit_pen(PenProp::Wrapper(PenFlags::new(bits)))
    }

    fn set_pen_flag(&mut self, flag: u16, on: bool, prop: fn(bool) -> PenProp) -> Result<()> {
        if self.pen.flags.contains(flag) == on {
            return Ok(());
        }
        self.pen.flags.set(flag, on);
        self.emit_pen(prop(on))
    }

    fn set_font(&mut self, font: u8) -> Result<()> {
        if self.pen.font == font {
            return Ok(());
        }
        self.pen.font = font;
        self.emit_pen(PenProp::Font(font))
    }

    fn set_foreground(&mut self, color: Color) -> Result<()> {
        if self.pen.fg == color {
            return Ok(());
        }
        self.pen.fg = color;
        self.emit_pen(PenProp::Foreground(color))
    }

    fn set_background(&mut self, color: Color) -> Result<()> {
        if self.pen.bg == color {
            return Ok(());
        }
        self.pen.bg = color;
        self.emit_pen(PenProp::Background(color))
    }
}
