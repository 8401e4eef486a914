//! Scrolling level history.
//!
//! The grid is stored column-major in a ring: `head` is the physical index of
//! the oldest (leftmost) column, so scrolling by one column only clears the
//! slot that becomes the newest column and moves the head.

use crate::types::LevelPair;

/// Packed `0xRGBA` color, 4 bits per channel.
pub type Rgba4444 = u16;

pub const BACKGROUND: Rgba4444 = 0x000F;
pub const GREEN: Rgba4444 = 0x0F0F;
pub const YELLOW: Rgba4444 = 0xFF0F;
pub const RED: Rgba4444 = 0xF00F;

/// Upper edge of the safe band, as a fraction of the half height.
pub const SAFE_LIMIT: f32 = 1.0 / 3.0;
/// Upper edge of the caution band.
pub const CAUTION_LIMIT: f32 = SAFE_LIMIT + 1.0 / 8.0;

pub fn band_color(proportion: f32) -> Rgba4444 {
    if proportion < SAFE_LIMIT {
        GREEN
    } else if proportion < CAUTION_LIMIT {
        YELLOW
    } else {
        RED
    }
}

/// Widens a packed color to the `0x00RRGGBB` layout of the display surface.
pub fn to_xrgb(color: Rgba4444) -> u32 {
    let expand = |shift: u16| ((color >> shift) & 0xF) as u32 * 0x11;
    (expand(12) << 16) | (expand(8) << 8) | expand(4)
}

pub struct ScrollBuffer {
    width: usize,
    height: usize,
    head: usize,
    pixels: Vec<Rgba4444>,
}

impl ScrollBuffer {
    pub fn new(width: usize, height: usize) -> ScrollBuffer {
        assert!(width > 0 && height > 0, "scroll buffer must not be empty");
        ScrollBuffer {
            width,
            height,
            head: 0,
            pixels: vec![BACKGROUND; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn slot(&self, x: usize) -> usize {
        (self.head + x) % self.width
    }

    /// Logical column `x`, top to bottom; column `width - 1` is the newest.
    pub fn column(&self, x: usize) -> &[Rgba4444] {
        let start = self.slot(x) * self.height;
        &self.pixels[start..start + self.height]
    }

    fn newest_mut(&mut self) -> &mut [Rgba4444] {
        let start = self.slot(self.width - 1) * self.height;
        &mut self.pixels[start..start + self.height]
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgba4444 {
        self.column(x)[y]
    }

    /// Scrolls one column to the left and clears the newest column.
    pub fn shift(&mut self) {
        self.head = (self.head + 1) % self.width;
        self.newest_mut().fill(BACKGROUND);
    }

    /// Draws the pair into the newest column: left grows up from the center,
    /// right grows down.
    pub fn draw_levels(&mut self, levels: LevelPair) {
        let height = self.height;
        let half = height / 2;
        if half == 0 {
            return;
        }
        let bar = |level: f32| ((level.max(0.0) * half as f32).round() as usize).min(half);
        let (up, down) = (bar(levels.left), bar(levels.right));

        let column = self.newest_mut();
        for d in 0..up {
            column[half - 1 - d] = band_color(d as f32 / half as f32);
        }
        for d in 0..down {
            if half + d < height {
                column[half + d] = band_color(d as f32 / half as f32);
            }
        }
    }

    pub fn push(&mut self, levels: LevelPair) {
        self.shift();
        self.draw_levels(levels);
    }
}
