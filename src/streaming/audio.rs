//! Companion-track playback using rodio
//!
//! Implements the [`AudioPosition`] capability over a rodio sink so the
//! playback clock can pace packets against the decoded audio position.

use crate::clock::AudioPosition;
use crate::Result;
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Audio player for the karaoke track paired with a CD+G stream
pub struct KaraokeAudio {
    // The output stream must outlive the sink or playback stops
    _stream: OutputStream,
    sink: Sink,
}

impl KaraokeAudio {
    /// Open an audio file and prepare it for playback, paused.
    ///
    /// The file is decoded by rodio's format detection (mp3, ogg, flac,
    /// wav). Playback starts when the clock anchors the session.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| format!("Cannot decode audio file '{}': {}", path.display(), e))?;

        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| crate::CdgError::AudioDevice(format!("Failed to create audio stream: {e}")))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| crate::CdgError::AudioDevice(format!("Failed to create audio sink: {e}")))?;

        sink.pause();
        sink.append(decoder);

        Ok(KaraokeAudio {
            _stream: stream,
            sink,
        })
    }
}

impl AudioPosition for KaraokeAudio {
    fn play(&mut self) -> bool {
        if self.sink.empty() {
            tracing::warn!("nothing to play on the audio sink");
            return false;
        }
        self.sink.play();
        true
    }

    fn position_ms(&mut self) -> u32 {
        self.sink.get_pos().as_millis() as u32
    }

    fn tick(&mut self) {
        // rodio pumps its own output thread; the periodic-update slot
        // exists for engines that need an explicit pump.
    }
}
