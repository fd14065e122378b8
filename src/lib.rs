//! CD+G Stream Decoder
//!
//! A real-time decoder for the CD+G (CD+Graphics) subcode format used by
//! karaoke discs: fixed 24-byte instruction packets emitted at 300 per
//! second, interpreted into a persistent 300x216 indexed-color raster
//! with a 16-entry palette. Decoding is paced to real playback time,
//! locked to the companion audio track when one is attached.
//!
//! # Features
//! - Double-buffered background reader overlapping file I/O with decoding
//! - Pacing against an audio position provider or the wall clock
//! - Exact bit-level interpretation of the CD+G opcode set
//! - Presentation-sink notification after every recognized instruction
//! - Optional rodio playback of the companion audio track
//! - Optional terminal raster rendering
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Companion-track audio playback (enables
//!   optional `rodio` dep)
//! - `visualization` (default): Terminal raster rendering (`visualization`)
//!
//! # Quick start
//! ## Decode a file, headless
//! ```no_run
//! use cdg::screen::DiscardScreen;
//! use cdg::{DecodeSession, PacketSource, PlaybackClock};
//! use std::path::Path;
//!
//! let source = PacketSource::open(Path::new("song.cdg")).unwrap();
//! let mut session = DecodeSession::start(
//!     source,
//!     PlaybackClock::wall_clock(),
//!     Box::new(DiscardScreen),
//! )
//! .unwrap();
//! session.wait_until_done();
//! ```
//!
//! ## Pace against the companion audio track
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use cdg::screen::DiscardScreen;
//! use cdg::streaming::KaraokeAudio;
//! use cdg::{DecodeSession, PacketSource, PlaybackClock};
//! use std::path::Path;
//!
//! let source = PacketSource::open(Path::new("song.cdg")).unwrap();
//! let audio = KaraokeAudio::open(Path::new("song.mp3")).unwrap();
//! let mut session = DecodeSession::start(
//!     source,
//!     PlaybackClock::audio(Box::new(audio)),
//!     Box::new(DiscardScreen),
//! )
//! .unwrap();
//! session.wait_until_done();
//! # }
//! ```

#![warn(missing_docs)]

// Domain modules
pub mod clock; // Playback Clock & Audio Position Capability
pub mod dispatch; // Paced Packet Dispatch
pub mod interpreter; // Instruction Interpretation
pub mod packet; // Subcode Packet Format
pub mod reader; // Double-Buffered Packet Source
pub mod screen; // Raster, Palette & Presentation Sink
pub mod session; // Decode Session Lifecycle
#[cfg(feature = "streaming")]
pub mod streaming; // Companion-Track Audio Output
#[cfg(feature = "visualization")]
pub mod visualization; // Terminal Raster Rendering

/// Error types for decoder operations
#[derive(thiserror::Error, Debug)]
pub enum CdgError {
    /// IO error from the packet stream or filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure allocating a thread or synchronization primitive at startup
    #[error("Resource error: {0}")]
    Resource(String),

    /// Audio device or decoding error
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for CdgError {
    /// Converts a String into `CdgError::Other`.
    ///
    /// Convenience for generic string errors; prefer the specific variant
    /// constructors where the error class is known.
    fn from(msg: String) -> Self {
        CdgError::Other(msg)
    }
}

impl From<&str> for CdgError {
    /// Converts a string slice into `CdgError::Other`.
    fn from(msg: &str) -> Self {
        CdgError::Other(msg.to_string())
    }
}

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, CdgError>;

// Public API exports
pub use clock::{AudioPosition, PlaybackClock};
pub use dispatch::{DecodeStats, PacedDispatcher};
pub use interpreter::Interpreter;
pub use packet::{Opcode, SubCodePacket, PACKETS_PER_SECOND, PACKET_SIZE};
pub use reader::{PacketSource, SourceHandle};
pub use screen::{Palette, Raster, ScreenHandler};
pub use session::DecodeSession;
#[cfg(feature = "streaming")]
pub use streaming::KaraokeAudio;
#[cfg(feature = "visualization")]
pub use visualization::TerminalScreen;
