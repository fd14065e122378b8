//! Playback Clock
//!
//! Supplies elapsed-time-since-start for pacing. Two strategies, fixed at
//! session construction: delegate to an external audio-position provider
//! (preferred, keeps the raster locked to the audio actually being heard),
//! or wall-clock time since the session began. Readings are clamped to be
//! monotonically non-decreasing either way.

use std::time::Instant;

/// Audio position provider capability.
///
/// Modeled on the narrow surface a playback engine exposes: start playback,
/// report the current position, and run any periodic internal update the
/// engine requires (a no-op for engines that pump themselves).
pub trait AudioPosition: Send {
    /// Begin playback; returns false if there is nothing to play
    fn play(&mut self) -> bool;
    /// Current playback position in milliseconds
    fn position_ms(&mut self) -> u32;
    /// Periodic internal update
    fn tick(&mut self);
}

enum ClockStrategy {
    /// Position reported by the audio subsystem
    Audio(Box<dyn AudioPosition>),
    /// Wall-clock elapsed time since `start()`
    WallClock,
}

/// Monotonically non-decreasing elapsed time for one decode session
pub struct PlaybackClock {
    strategy: ClockStrategy,
    anchor: Instant,
    last_ms: u64,
    audio_started: bool,
}

impl PlaybackClock {
    /// Clock driven by an external audio-position provider
    pub fn audio(provider: Box<dyn AudioPosition>) -> Self {
        PlaybackClock {
            strategy: ClockStrategy::Audio(provider),
            anchor: Instant::now(),
            last_ms: 0,
            audio_started: false,
        }
    }

    /// Clock driven by wall-clock time
    pub fn wall_clock() -> Self {
        PlaybackClock {
            strategy: ClockStrategy::WallClock,
            anchor: Instant::now(),
            last_ms: 0,
            audio_started: false,
        }
    }

    /// Anchor the clock and start audio playback if a provider is attached.
    ///
    /// Called once, at the moment packet 0 is dispatched.
    pub fn start(&mut self) {
        self.anchor = Instant::now();
        self.last_ms = 0;
        if let ClockStrategy::Audio(provider) = &mut self.strategy {
            if !provider.play() {
                tracing::warn!("audio provider refused to start; pacing on wall clock");
                self.strategy = ClockStrategy::WallClock;
            }
        }
    }

    /// Elapsed milliseconds since `start()`, never decreasing.
    ///
    /// Until the audio provider begins reporting a nonzero position the
    /// wall clock stands in for it; the monotonic clamp absorbs the
    /// crossover and any backwards jitter from the audio engine.
    pub fn elapsed_ms(&mut self) -> u64 {
        let wall = self.anchor.elapsed().as_millis() as u64;
        let raw = match &mut self.strategy {
            ClockStrategy::Audio(provider) => {
                let pos = u64::from(provider.position_ms());
                if pos > 0 {
                    self.audio_started = true;
                }
                if self.audio_started {
                    pos
                } else {
                    wall
                }
            }
            ClockStrategy::WallClock => wall,
        };
        self.last_ms = self.last_ms.max(raw);
        self.last_ms
    }

    /// Forward the provider's periodic update
    pub fn tick(&mut self) {
        if let ClockStrategy::Audio(provider) = &mut self.strategy {
            provider.tick();
        }
    }
}
