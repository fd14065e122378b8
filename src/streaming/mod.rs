//! Audio Output & Streaming
//!
//! Plays the companion audio track of a karaoke pair and exposes its
//! playback position as the session's pacing reference, keeping the
//! raster locked to the audio actually being heard.

pub mod audio;

pub use audio::KaraokeAudio;
