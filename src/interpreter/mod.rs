//! CD+G Instruction Interpreter
//!
//! Decodes each graphics packet's opcode and payload and mutates the
//! session's raster and palette accordingly. After every recognized packet
//! the presentation sink is notified with the current raster, preceded by
//! a palette notification when a color-table load fired, preserving the
//! format's redraw-every-frame behavior.
//!
//! Payload semantics follow the CD+G subcode spec: colors are 4-bit
//! palette indices, palette entries are 12-bit packed values split over
//! two 6-bit payload bytes, and tiles are 6x12 two-color bitmaps.

use crate::packet::{Opcode, SubCodePacket};
use crate::screen::{Palette, Raster, ScreenHandler, HEIGHT, TILE_HEIGHT, TILE_WIDTH, WIDTH};

/// Rows/columns covered by the border region on each edge
const BORDER_ROWS: usize = 12;
const BORDER_COLS: usize = 6;

/// Applies graphics instructions to a session's raster and palette
pub struct Interpreter {
    raster: Raster,
    palette: Palette,
    sink: Box<dyn ScreenHandler>,
}

impl Interpreter {
    /// Create an interpreter with a blank raster and zeroed palette
    pub fn new(sink: Box<dyn ScreenHandler>) -> Self {
        Interpreter {
            raster: Raster::new(),
            palette: Palette::new(),
            sink,
        }
    }

    /// The current raster
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// The current palette
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Apply one packet.
    ///
    /// Returns true iff the packet carried the graphics command marker, in
    /// which case the sink has been notified — even for opcodes that are
    /// unknown or deliberately unimplemented.
    pub fn apply(&mut self, packet: &SubCodePacket) -> bool {
        if !packet.is_graphics_instruction() {
            return false;
        }

        let mut palette_changed = false;
        match packet.opcode() {
            Some(Opcode::MemoryPreset) => self.memory_preset(&packet.data),
            Some(Opcode::BorderPreset) => self.border_preset(&packet.data),
            Some(Opcode::TileBlockNormal) => self.tile_block(&packet.data, false),
            Some(Opcode::TileBlockXor) => self.tile_block(&packet.data, true),
            Some(Opcode::LoadColorTableLow) => {
                self.load_color_table(&packet.data, 0);
                palette_changed = true;
            }
            Some(Opcode::LoadColorTableHigh) => {
                self.load_color_table(&packet.data, 8);
                palette_changed = true;
            }
            // Scrolling and transparency are deliberately left as no-ops;
            // they still count as recognized instructions.
            Some(Opcode::ScrollPreset)
            | Some(Opcode::ScrollCopy)
            | Some(Opcode::DefineTransparentColor) => {}
            None => {
                tracing::debug!(opcode = packet.opcode_bits(), "unrecognized opcode");
            }
        }

        if palette_changed {
            self.sink.on_palette(&self.palette);
        }
        self.sink.on_frame(&self.raster);
        true
    }

    /// Opcode 1: fill the whole raster with one color.
    ///
    /// The repeat field guards against redundant re-transmissions of the
    /// same preset on a lossy channel; only repeat 0 takes effect.
    fn memory_preset(&mut self, data: &[u8; 16]) {
        let repeat = data[1] & 0x0F;
        if repeat == 0 {
            self.raster.fill(data[0] & 0x0F);
        }
    }

    /// Opcode 2: fill the border region with one color.
    ///
    /// Top and bottom 12 rows across the full width, plus the left and
    /// right 6 columns of the interior rows.
    fn border_preset(&mut self, data: &[u8; 16]) {
        let color = data[0] & 0x0F;
        for row in 0..BORDER_ROWS {
            for col in 0..WIDTH {
                self.raster.set(row, col, color);
                self.raster.set(HEIGHT - 1 - row, col, color);
            }
        }
        for row in BORDER_ROWS..HEIGHT - BORDER_ROWS {
            for col in 0..BORDER_COLS {
                self.raster.set(row, col, color);
                self.raster.set(row, WIDTH - 1 - col, color);
            }
        }
    }

    /// Opcodes 6 and 38: draw a 6x12 two-color tile.
    ///
    /// Each of the 12 payload rows is a 6-bit mask, bit 0x20 leftmost; a
    /// set bit selects color1, a clear bit color0. Normal tiles overwrite
    /// the cells, XOR tiles combine with what is already there.
    fn tile_block(&mut self, data: &[u8; 16], xor: bool) {
        let color0 = data[0] & 0x0F;
        let color1 = data[1] & 0x0F;
        let row = (data[2] & 0x1F) as usize * TILE_HEIGHT;
        let col = (data[3] & 0x3F) as usize * TILE_WIDTH;

        // The raw field ranges address more tiles than the raster holds;
        // out-of-range tiles are ignored rather than wrapped.
        if row + TILE_HEIGHT > HEIGHT || col + TILE_WIDTH > WIDTH {
            tracing::debug!(row, col, "tile block outside raster ignored");
            return;
        }

        for (dy, &pixels) in data[4..4 + TILE_HEIGHT].iter().enumerate() {
            let mut mask = 0x20u8;
            for dx in 0..TILE_WIDTH {
                let color = if pixels & mask != 0 { color1 } else { color0 };
                if xor {
                    self.raster.xor(row + dy, col + dx, color);
                } else {
                    self.raster.set(row + dy, col + dx, color);
                }
                mask >>= 1;
            }
        }
    }

    /// Opcodes 30/31: load one half of the color table.
    ///
    /// Two payload bytes per entry, 6 significant bits each; the first
    /// byte supplies the high 6 bits of the 12-bit packed color.
    fn load_color_table(&mut self, data: &[u8; 16], base: usize) {
        for i in 0..8 {
            let hi = u16::from(data[i * 2] & 0x3F);
            let lo = u16::from(data[i * 2 + 1] & 0x3F);
            self.palette.set(base + i, (hi << 6) | lo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PACKET_SIZE;
    use crate::screen::MAX_COLORS;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Sink that records the order and content of notifications
    #[derive(Default)]
    struct Recording {
        frames: u64,
        palettes: Vec<[u16; MAX_COLORS]>,
    }

    #[derive(Clone, Default)]
    struct RecordingScreen {
        log: Arc<Mutex<Recording>>,
    }

    impl ScreenHandler for RecordingScreen {
        fn on_palette(&mut self, palette: &Palette) {
            self.log.lock().palettes.push(*palette.entries());
        }

        fn on_frame(&mut self, _raster: &Raster) {
            self.log.lock().frames += 1;
        }
    }

    fn instruction(opcode: u8, data: &[u8]) -> SubCodePacket {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[0] = 9;
        bytes[1] = opcode;
        bytes[4..4 + data.len()].copy_from_slice(data);
        SubCodePacket::from_bytes(&bytes)
    }

    fn tile_payload(color0: u8, color1: u8, tile_row: u8, tile_col: u8, rows: [u8; 12]) -> [u8; 16] {
        let mut data = [0u8; 16];
        data[0] = color0;
        data[1] = color1;
        data[2] = tile_row;
        data[3] = tile_col;
        data[4..16].copy_from_slice(&rows);
        data
    }

    fn new_interpreter() -> (Interpreter, RecordingScreen) {
        let screen = RecordingScreen::default();
        let interpreter = Interpreter::new(Box::new(screen.clone()));
        (interpreter, screen)
    }

    #[test]
    fn test_non_graphics_packet_is_ignored() {
        let (mut interpreter, screen) = new_interpreter();
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[0] = 8;
        bytes[1] = 1;
        assert!(!interpreter.apply(&SubCodePacket::from_bytes(&bytes)));
        assert_eq!(screen.log.lock().frames, 0);
    }

    #[test]
    fn test_memory_preset_fills_raster() {
        let (mut interpreter, _) = new_interpreter();
        assert!(interpreter.apply(&instruction(1, &[5, 0])));
        assert_eq!(interpreter.raster().get(0, 0), 5);
        assert_eq!(interpreter.raster().get(HEIGHT - 1, WIDTH - 1), 5);
    }

    #[test]
    fn test_memory_preset_repeat_guard() {
        let (mut interpreter, _) = new_interpreter();
        interpreter.apply(&instruction(1, &[5, 0]));
        // Nonzero repeat field: recognized, but the raster is untouched
        assert!(interpreter.apply(&instruction(1, &[9, 3])));
        assert_eq!(interpreter.raster().get(100, 100), 5);
    }

    #[test]
    fn test_border_preset_geometry() {
        let (mut interpreter, _) = new_interpreter();
        interpreter.apply(&instruction(1, &[5, 0]));
        interpreter.apply(&instruction(2, &[2]));

        let raster = interpreter.raster();
        // Top and bottom bands, full width
        assert_eq!(raster.get(0, 150), 2);
        assert_eq!(raster.get(11, 0), 2);
        assert_eq!(raster.get(204, 150), 2);
        assert_eq!(raster.get(215, 299), 2);
        // Side bands on interior rows, including the first interior row
        assert_eq!(raster.get(12, 5), 2);
        assert_eq!(raster.get(12, 294), 2);
        assert_eq!(raster.get(203, 0), 2);
        // Interior untouched
        assert_eq!(raster.get(12, 6), 5);
        assert_eq!(raster.get(100, 150), 5);
        assert_eq!(raster.get(203, 293), 5);
    }

    #[test]
    fn test_tile_block_normal_bit_order() {
        let (mut interpreter, _) = new_interpreter();
        let mut rows = [0u8; 12];
        rows[0] = 0b10_0001; // leftmost and rightmost pixel of the top row
        interpreter.apply(&instruction(6, &tile_payload(3, 7, 1, 2, rows)));

        let raster = interpreter.raster();
        let (top, left) = (12, 12);
        assert_eq!(raster.get(top, left), 7);
        assert_eq!(raster.get(top, left + 1), 3);
        assert_eq!(raster.get(top, left + 5), 7);
        assert_eq!(raster.get(top + 1, left), 3);
    }

    #[test]
    fn test_tile_block_xor_round_trip() {
        let (mut interpreter, _) = new_interpreter();
        interpreter.apply(&instruction(1, &[5, 0]));

        let payload = tile_payload(0xA, 0x6, 3, 4, [0b11_0101u8; 12]);
        interpreter.apply(&instruction(38, &payload));
        // XOR changed the region
        assert_ne!(interpreter.raster().get(36, 24), 5);
        // Applying the identical tile again restores it
        interpreter.apply(&instruction(38, &payload));
        for dy in 0..12 {
            for dx in 0..6 {
                assert_eq!(interpreter.raster().get(36 + dy, 24 + dx), 5);
            }
        }
    }

    #[test]
    fn test_out_of_range_tile_is_ignored() {
        let (mut interpreter, screen) = new_interpreter();
        // Tile row 18 would start at pixel row 216, past the raster
        let recognized = interpreter.apply(&instruction(6, &tile_payload(0, 15, 18, 0, [0x3F; 12])));
        assert!(recognized);
        assert_eq!(screen.log.lock().frames, 1);
        assert_eq!(interpreter.raster().get(HEIGHT - 1, 0), 0);
    }

    #[test]
    fn test_color_table_halves_are_independent() {
        let (mut interpreter, _) = new_interpreter();
        // Entry 0 = 0xF00: high byte 0b111100, low byte 0b000000
        let mut low = [0u8; 16];
        low[0] = 0x3C;
        low[1] = 0x00;
        interpreter.apply(&instruction(30, &low));

        let mut high = [0u8; 16];
        high[14] = 0x00;
        high[15] = 0x3F; // entry 15 = 0x03F
        interpreter.apply(&instruction(31, &high));

        let palette = interpreter.palette();
        assert_eq!(palette.get(0), 0xF00);
        assert_eq!(palette.get(15), 0x03F);
        // The other half was not disturbed by either load
        assert_eq!(palette.get(7), 0);
        assert_eq!(palette.get(8), 0);
    }

    #[test]
    fn test_palette_bytes_mask_high_bits() {
        let (mut interpreter, _) = new_interpreter();
        let mut data = [0u8; 16];
        data[0] = 0xFF; // only the low 6 bits count
        data[1] = 0xC1;
        interpreter.apply(&instruction(30, &data));
        assert_eq!(interpreter.palette().get(0), (0x3F << 6) | 0x01);
    }

    #[test]
    fn test_noop_opcodes_still_notify() {
        let (mut interpreter, screen) = new_interpreter();
        for opcode in [20u8, 24, 28, 33] {
            assert!(interpreter.apply(&instruction(opcode, &[])));
        }
        let log = screen.log.lock();
        assert_eq!(log.frames, 4);
        assert!(log.palettes.is_empty());
    }

    #[test]
    fn test_palette_notification_precedes_frame() {
        let (mut interpreter, screen) = new_interpreter();
        let mut data = [0u8; 16];
        data[0] = 0x3C;
        interpreter.apply(&instruction(30, &data));

        let log = screen.log.lock();
        assert_eq!(log.frames, 1);
        assert_eq!(log.palettes.len(), 1);
        // The palette passed to the sink already carries the new entry
        assert_eq!(log.palettes[0][0], 0xF00);
    }

    #[test]
    fn test_end_to_end_three_packet_scenario() {
        let (mut interpreter, screen) = new_interpreter();

        // memory preset to color 5, palette entry 0 = 0xF00, border to 2
        interpreter.apply(&instruction(1, &[5, 0]));
        let mut palette_data = [0u8; 16];
        palette_data[0] = 0x3C;
        interpreter.apply(&instruction(30, &palette_data));
        interpreter.apply(&instruction(2, &[2]));

        let raster = interpreter.raster();
        for row in 0..HEIGHT {
            for col in 0..WIDTH {
                let border = row < 12 || row >= 204 || col < 6 || col >= 294;
                let expected = if border { 2 } else { 5 };
                assert_eq!(raster.get(row, col), expected, "cell ({row},{col})");
            }
        }
        assert_eq!(interpreter.palette().get(0), 0xF00);
        assert_eq!(screen.log.lock().frames, 3);
    }
}
