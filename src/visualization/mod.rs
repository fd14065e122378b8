//! Terminal Raster Rendering
//!
//! A presentation sink that draws the decode raster into the terminal
//! with ANSI truecolor half-block characters. Notifications arrive once
//! per recognized packet (up to 300/s); the sink throttles redraws
//! internally and returns immediately in between, as the sink contract
//! requires.

use crate::screen::{Palette, Raster, ScreenHandler, HEIGHT, WIDTH};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Minimum milliseconds between terminal redraws (~30 fps)
pub const DISPLAY_UPDATE_MS: u64 = 33;

/// Horizontal downsampling step (300 pixels -> 150 columns)
const X_STEP: usize = 2;

/// Vertical downsampling step; one half-block row covers two sampled
/// pixel rows (216 pixels -> 54 text rows)
const Y_STEP: usize = 4;

/// Presentation sink rendering the raster as ANSI half-blocks
pub struct TerminalScreen {
    palette: Palette,
    last_draw: Option<Instant>,
    min_interval: Duration,
}

impl TerminalScreen {
    /// Create a terminal sink and hide the cursor
    pub fn new() -> Self {
        print!("\x1B[2J\x1B[?25l");
        let _ = io::stdout().flush();
        TerminalScreen {
            palette: Palette::new(),
            last_draw: None,
            min_interval: Duration::from_millis(DISPLAY_UPDATE_MS),
        }
    }

    fn due_for_redraw(&self) -> bool {
        match self.last_draw {
            Some(at) => at.elapsed() >= self.min_interval,
            None => true,
        }
    }

    fn draw(&mut self, raster: &Raster) {
        let frame = render_half_blocks(raster, &self.palette);
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(b"\x1B[H");
        let _ = stdout.write_all(frame.as_bytes());
        let _ = stdout.flush();
        self.last_draw = Some(Instant::now());
    }
}

impl Default for TerminalScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenHandler for TerminalScreen {
    fn on_palette(&mut self, palette: &Palette) {
        self.palette = *palette;
    }

    fn on_frame(&mut self, raster: &Raster) {
        if self.due_for_redraw() {
            self.draw(raster);
        }
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        // Restore the cursor and the default colors
        print!("\x1B[0m\x1B[?25h\n");
        let _ = io::stdout().flush();
    }
}

/// Render the raster into one string of half-block characters.
///
/// Each character cell shows two vertically stacked pixels: foreground
/// color for the top one, background color for the bottom one.
fn render_half_blocks(raster: &Raster, palette: &Palette) -> String {
    let rows = HEIGHT / Y_STEP;
    let cols = WIDTH / X_STEP;
    // 40 bytes per cell covers the two escape sequences plus the glyph
    let mut frame = String::with_capacity(rows * cols * 40);

    for row in 0..rows {
        let top = row * Y_STEP;
        let bottom = top + Y_STEP / 2;
        for col in 0..cols {
            let x = col * X_STEP;
            let (tr, tg, tb) = palette.rgb(raster.get(top, x) as usize);
            let (br, bg, bb) = palette.rgb(raster.get(bottom, x) as usize);
            frame.push_str(&format!(
                "\x1B[38;2;{tr};{tg};{tb}m\x1B[48;2;{br};{bg};{bb}m\u{2580}"
            ));
        }
        frame.push_str("\x1B[0m\n");
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dimensions() {
        let raster = Raster::new();
        let palette = Palette::new();
        let frame = render_half_blocks(&raster, &palette);
        assert_eq!(frame.lines().count(), HEIGHT / Y_STEP);
        assert_eq!(frame.matches('\u{2580}').count(), (HEIGHT / Y_STEP) * (WIDTH / X_STEP));
    }

    #[test]
    fn test_render_uses_palette_colors() {
        let mut raster = Raster::new();
        raster.set(0, 0, 1);
        let mut palette = Palette::new();
        palette.set(1, 0xF00);

        let frame = render_half_blocks(&raster, &palette);
        // Top-left pixel: red foreground, black (entry 0) background
        assert!(frame.starts_with("\x1B[38;2;255;0;0m\x1B[48;2;0;0;0m\u{2580}"));
    }
}
