use crossterm::{
    cursor::{Hide, Show},
    queue,
    style::Print,
};
use std::io::{self, Stdout, Write};

use crate::types::LevelPair;

pub const DISPLAY_WIDTH: usize = 100;

const FULL: char = '█';
const UPPER: char = '▀';
const LOWER: char = '▄';
const BLANK: char = ' ';

/// Does a channel at `level` reach the column with threshold `t`?
///
/// A silent channel reaches nothing, so a zero pair renders an empty row.
/// This also applies when only one channel is silent: `(0.5, 0.0)` starts
/// with a half block at column 0, not a full one.
fn reaches(level: f32, t: f32) -> bool {
    level > 0.0 && t <= level
}

fn glyph(levels: LevelPair, t: f32) -> char {
    match (reaches(levels.left, t), reaches(levels.right, t)) {
        (true, true) => FULL,
        (true, false) => UPPER,
        (false, true) => LOWER,
        (false, false) => BLANK,
    }
}

/// One meter row: the left channel fills the upper half of each cell, the
/// right channel the lower half.
pub fn render_row(levels: LevelPair, width: usize) -> String {
    (0..width)
        .map(|i| glyph(levels, i as f32 / width as f32))
        .collect()
}

/// Live single-line meter that rewrites itself in place.
pub struct TerminalMeter<W: Write> {
    out: W,
    width: usize,
}

impl TerminalMeter<Stdout> {
    pub fn stdout(width: usize) -> Result<TerminalMeter<Stdout>, anyhow::Error> {
        TerminalMeter::new(io::stdout(), width)
    }
}

impl<W: Write> TerminalMeter<W> {
    pub fn new(mut out: W, width: usize) -> Result<TerminalMeter<W>, anyhow::Error> {
        queue!(out, Hide)?;
        out.flush()?;
        Ok(TerminalMeter { out, width })
    }

    pub fn draw(&mut self, levels: LevelPair) -> io::Result<()> {
        let row = render_row(levels, self.width);
        queue!(self.out, Print('\r'), Print(row))?;
        self.out.flush()
    }

    #[cfg(test)]
    fn output(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Drop for TerminalMeter<W> {
    fn drop(&mut self) {
        let _ = queue!(self.out, Print("\r\n"), Show);
        let _ = self.out.flush();
    }
}
