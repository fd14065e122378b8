//! Raster and Palette State
//!
//! A CD+G screen is a persistent 300x216 grid of 4-bit palette indices
//! backed by a 16-entry table of 12-bit packed colors (4 bits per channel).
//! Both live for one decode session and are mutated in place by the
//! instruction interpreter.

/// Raster width in pixels
pub const WIDTH: usize = 300;

/// Raster height in pixels
pub const HEIGHT: usize = 216;

/// Tile width in pixels
pub const TILE_WIDTH: usize = 6;

/// Tile height in pixels
pub const TILE_HEIGHT: usize = 12;

/// Number of palette entries
pub const MAX_COLORS: usize = 16;

/// Red channel mask of a packed 12-bit color
pub const RED_MASK: u16 = 0x0F00;
/// Green channel mask of a packed 12-bit color
pub const GREEN_MASK: u16 = 0x00F0;
/// Blue channel mask of a packed 12-bit color
pub const BLUE_MASK: u16 = 0x000F;

/// The raw pixel grid, indexed `[row][column]`
pub type RasterGrid = [[u8; WIDTH]; HEIGHT];

/// Persistent indexed-color pixel grid built up across packets.
///
/// Heap-allocated; the grid is 64 KiB and owned by exactly one session.
pub struct Raster {
    cells: Box<RasterGrid>,
}

impl Raster {
    /// Create a raster with all cells set to palette index 0
    pub fn new() -> Self {
        Raster {
            cells: Box::new([[0u8; WIDTH]; HEIGHT]),
        }
    }

    /// The raw pixel grid
    pub fn grid(&self) -> &RasterGrid {
        &self.cells
    }

    /// Read one cell
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[row][col]
    }

    /// Write one cell
    pub fn set(&mut self, row: usize, col: usize, color: u8) {
        self.cells[row][col] = color;
    }

    /// XOR a color index into one cell
    pub fn xor(&mut self, row: usize, col: usize, color: u8) {
        self.cells[row][col] ^= color;
    }

    /// Fill every cell with one color index
    pub fn fill(&mut self, color: u8) {
        for row in self.cells.iter_mut() {
            row.fill(color);
        }
    }
}

impl Default for Raster {
    fn default() -> Self {
        Self::new()
    }
}

/// 16-entry color lookup table of 12-bit packed values.
///
/// Loaded in two independent halves; entries default to zero until loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Palette {
    entries: [u16; MAX_COLORS],
}

impl Palette {
    /// Create a palette with all entries zero
    pub fn new() -> Self {
        Palette::default()
    }

    /// All 16 packed entries
    pub fn entries(&self) -> &[u16; MAX_COLORS] {
        &self.entries
    }

    /// Read one packed entry
    pub fn get(&self, index: usize) -> u16 {
        self.entries[index]
    }

    /// Write one packed entry
    pub fn set(&mut self, index: usize, value: u16) {
        self.entries[index] = value;
    }

    /// Expand one entry to 8-bit RGB channels
    pub fn rgb(&self, index: usize) -> (u8, u8, u8) {
        let packed = self.entries[index];
        // 4-bit channels scaled to 8 bits (0xF -> 0xFF)
        let r = ((packed & RED_MASK) >> 8) as u8 * 17;
        let g = ((packed & GREEN_MASK) >> 4) as u8 * 17;
        let b = (packed & BLUE_MASK) as u8 * 17;
        (r, g, b)
    }
}

/// Presentation sink receiving the finished raster and palette.
///
/// Invoked synchronously from the consumer thread after every recognized
/// instruction packet; implementations must not block indefinitely but may
/// buffer or throttle internally before returning.
pub trait ScreenHandler: Send {
    /// Palette changed; called before the frame notification
    fn on_palette(&mut self, palette: &Palette);
    /// A recognized instruction was applied to the raster
    fn on_frame(&mut self, raster: &Raster);
}

/// Sink that drops every notification, for headless decoding
pub struct DiscardScreen;

impl ScreenHandler for DiscardScreen {
    fn on_palette(&mut self, _palette: &Palette) {}
    fn on_frame(&mut self, _raster: &Raster) {}
}
