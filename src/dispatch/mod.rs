//! Paced Packet Dispatch
//!
//! Drives the consumer side of a decode session: fetches packets from the
//! source one at a time and holds each one back until its scheduled time.
//! Every packet on the wire occupies one 1/300-second slot, recognized
//! instruction or not, so the schedule for packet n is simply
//! `n * 3333` microseconds after the clock anchor.

use crate::clock::PlaybackClock;
use crate::interpreter::Interpreter;
use crate::packet::PACKET_INTERVAL_MICROS;
use crate::reader::PacketSource;
use parking_lot::Mutex;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cap on a single pacing sleep so a stop request is observed promptly
const MAX_SLEEP_MICROS: u64 = 50_000;

/// Counters accumulated over one decode session
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeStats {
    /// Packets fetched from the source (recognized or not)
    pub packets_dispatched: u64,
    /// Packets recognized as graphics instructions
    pub instructions_applied: u64,
    /// Color-table loads observed
    pub palette_loads: u64,
}

/// Throttles packet consumption to the stream's fixed emission rate
pub struct PacedDispatcher {
    clock: PlaybackClock,
    packet_index: u64,
    stats: Arc<Mutex<DecodeStats>>,
}

impl PacedDispatcher {
    /// Create a dispatcher pacing against the given clock
    pub fn new(clock: PlaybackClock) -> Self {
        PacedDispatcher {
            clock,
            packet_index: 0,
            stats: Arc::new(Mutex::new(DecodeStats::default())),
        }
    }

    /// Shared handle to the session counters
    pub fn stats(&self) -> Arc<Mutex<DecodeStats>> {
        Arc::clone(&self.stats)
    }

    /// How long packet `n` must still wait, given the clock reading.
    ///
    /// `None` means dispatch immediately: packet 0 anchors the clock, and a
    /// clock at or past the scheduled time is never treated as an error.
    fn delay_for(packet_index: u64, elapsed_micros: u64) -> Option<Duration> {
        if packet_index == 0 {
            return None;
        }
        let scheduled = packet_index * PACKET_INTERVAL_MICROS;
        if scheduled > elapsed_micros {
            Some(Duration::from_micros(scheduled - elapsed_micros))
        } else {
            None
        }
    }

    /// Run the session loop until the source is exhausted or `stop` is set.
    ///
    /// Pacing suspends cooperatively in bounded slices and never holds a
    /// lock while sleeping.
    pub fn run<R: Read + Send + 'static>(
        &mut self,
        source: &mut PacketSource<R>,
        interpreter: &mut Interpreter,
        stop: &AtomicBool,
    ) {
        self.clock.start();
        tracing::debug!("dispatch loop started");

        while !stop.load(Ordering::Relaxed) {
            self.clock.tick();
            if let Some(mut delay) = Self::delay_for(self.packet_index, self.elapsed_micros()) {
                while delay > Duration::ZERO && !stop.load(Ordering::Relaxed) {
                    let slice = delay.min(Duration::from_micros(MAX_SLEEP_MICROS));
                    thread::sleep(slice);
                    delay = delay.saturating_sub(slice);
                }
                if stop.load(Ordering::Relaxed) {
                    break;
                }
            }

            let Some(packet) = source.next_packet() else {
                break;
            };
            self.packet_index += 1;

            let recognized = interpreter.apply(&packet);
            let mut stats = self.stats.lock();
            stats.packets_dispatched += 1;
            if recognized {
                stats.instructions_applied += 1;
            }
            if packet.is_graphics_instruction() && packet.opcode().is_some_and(is_palette_load) {
                stats.palette_loads += 1;
            }
        }

        tracing::debug!(
            packets = self.packet_index,
            "dispatch loop finished"
        );
    }

    fn elapsed_micros(&mut self) -> u64 {
        self.clock.elapsed_ms() * 1_000
    }
}

fn is_palette_load(opcode: crate::packet::Opcode) -> bool {
    use crate::packet::Opcode;
    matches!(opcode, Opcode::LoadColorTableLow | Opcode::LoadColorTableHigh)
}
