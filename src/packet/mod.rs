//! CD+G Subcode Packet Format
//!
//! The CD+G channel delivers fixed 24-byte subcode packets at a constant
//! rate of 300 packets per second. Each packet carries a command byte, an
//! instruction byte, 16 payload bytes and 6 parity bytes. Parity is read
//! and discarded; no error correction is performed.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

/// Size of one subcode packet in bytes
pub const PACKET_SIZE: usize = 24;

/// Number of packets emitted per second of stream
pub const PACKETS_PER_SECOND: u64 = 300;

/// Time slot occupied by one packet, in microseconds (1/300 s)
pub const PACKET_INTERVAL_MICROS: u64 = 1_000_000 / PACKETS_PER_SECOND;

/// Command-byte marker for CD+G graphics instructions
const CDG_COMMAND: u8 = 9;

/// Mask applied to the command and instruction bytes; the upper bits carry
/// subcode channel/parity information and are not part of the opcode space.
const SUBCODE_MASK: u8 = 0x3F;

/// One 24-byte subcode packet, read verbatim from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubCodePacket {
    /// Command byte; low 6 bits select the subcode channel
    pub command: u8,
    /// Instruction byte; low 6 bits select the opcode
    pub instruction: u8,
    /// Q-parity bytes (unused)
    pub parity_q: [u8; 2],
    /// Instruction payload
    pub data: [u8; 16],
    /// P-parity bytes (unused)
    pub parity_p: [u8; 4],
}

impl SubCodePacket {
    /// Decode one packet from its 24-byte wire representation.
    ///
    /// Single-byte fields only; no byte-order conversion, no checksum.
    pub fn from_bytes(bytes: &[u8; PACKET_SIZE]) -> Self {
        let mut parity_q = [0u8; 2];
        parity_q.copy_from_slice(&bytes[2..4]);
        let mut data = [0u8; 16];
        data.copy_from_slice(&bytes[4..20]);
        let mut parity_p = [0u8; 4];
        parity_p.copy_from_slice(&bytes[20..24]);

        SubCodePacket {
            command: bytes[0],
            instruction: bytes[1],
            parity_q,
            data,
            parity_p,
        }
    }

    /// Whether this packet carries a CD+G graphics instruction
    pub fn is_graphics_instruction(&self) -> bool {
        self.command & SUBCODE_MASK == CDG_COMMAND
    }

    /// The packet's 6-bit opcode value
    pub fn opcode_bits(&self) -> u8 {
        self.instruction & SUBCODE_MASK
    }

    /// The packet's opcode, if it maps to a known instruction
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode_bits())
    }
}

/// CD+G instruction opcodes (low 6 bits of the instruction byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Opcode {
    /// Fill the whole raster with one color (guarded by a repeat field)
    MemoryPreset = 1,
    /// Fill the border region with one color
    BorderPreset = 2,
    /// Draw a 6x12 two-color tile
    TileBlockNormal = 6,
    /// Scroll the raster, filling vacated cells (not implemented)
    ScrollPreset = 20,
    /// Scroll the raster with wraparound (not implemented)
    ScrollCopy = 24,
    /// Designate a palette index as transparent (not implemented)
    DefineTransparentColor = 28,
    /// Load palette entries 0-7
    LoadColorTableLow = 30,
    /// Load palette entries 8-15
    LoadColorTableHigh = 31,
    /// Draw a 6x12 tile, XORing colors into the raster
    TileBlockXor = 38,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_packet(command: u8, instruction: u8) -> [u8; PACKET_SIZE] {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[0] = command;
        bytes[1] = instruction;
        for (i, b) in bytes[4..20].iter_mut().enumerate() {
            *b = i as u8;
        }
        bytes
    }

    #[test]
    fn test_from_bytes_field_layout() {
        let mut bytes = raw_packet(0x09, 0x06);
        bytes[2] = 0xAA;
        bytes[3] = 0xBB;
        bytes[23] = 0xCC;

        let packet = SubCodePacket::from_bytes(&bytes);
        assert_eq!(packet.command, 0x09);
        assert_eq!(packet.instruction, 0x06);
        assert_eq!(packet.parity_q, [0xAA, 0xBB]);
        assert_eq!(packet.data[0], 0);
        assert_eq!(packet.data[15], 15);
        assert_eq!(packet.parity_p[3], 0xCC);
    }

    #[test]
    fn test_command_marker_masks_high_bits() {
        // Parity bits above the low 6 must not affect recognition
        let packet = SubCodePacket::from_bytes(&raw_packet(0xC9, 0x01));
        assert!(packet.is_graphics_instruction());

        let packet = SubCodePacket::from_bytes(&raw_packet(0x08, 0x01));
        assert!(!packet.is_graphics_instruction());
    }

    #[test]
    fn test_opcode_mapping() {
        let cases = [
            (1, Opcode::MemoryPreset),
            (2, Opcode::BorderPreset),
            (6, Opcode::TileBlockNormal),
            (20, Opcode::ScrollPreset),
            (24, Opcode::ScrollCopy),
            (28, Opcode::DefineTransparentColor),
            (30, Opcode::LoadColorTableLow),
            (31, Opcode::LoadColorTableHigh),
            (38, Opcode::TileBlockXor),
        ];
        for (bits, expected) in cases {
            let packet = SubCodePacket::from_bytes(&raw_packet(9, bits));
            assert_eq!(packet.opcode(), Some(expected));
        }
    }

    #[test]
    fn test_unknown_opcode_is_none() {
        let packet = SubCodePacket::from_bytes(&raw_packet(9, 0x3F));
        assert_eq!(packet.opcode(), None);
        assert_eq!(packet.opcode_bits(), 0x3F);
    }

    #[test]
    fn test_opcode_bits_mask_high_bits() {
        // Instruction byte 0x41 carries opcode 1 in its low 6 bits
        let packet = SubCodePacket::from_bytes(&raw_packet(9, 0x41));
        assert_eq!(packet.opcode(), Some(Opcode::MemoryPreset));
    }
}
