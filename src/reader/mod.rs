//! Packet Stream Reading Domain
//!
//! Turns a raw byte stream into an ordered, backpressured sequence of
//! subcode packets by overlapping file I/O with decoding: a background
//! producer fills one of two fixed-capacity buffer slots while the
//! consumer drains the other.

pub mod double_buffer;

pub use double_buffer::{PacketSource, SourceHandle, SLOT_CAPACITY};
