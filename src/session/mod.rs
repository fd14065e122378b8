//! Decode Session
//!
//! Owns one packet source, one pacing dispatcher and one interpreter
//! (and thus one raster and palette) for a single pass over a CD+G
//! stream. The session runs the consumer loop on its own thread; the
//! source's producer thread makes two threads of control per session.
//! Stopping the session unblocks both.

use crate::clock::PlaybackClock;
use crate::dispatch::{DecodeStats, PacedDispatcher};
use crate::interpreter::Interpreter;
use crate::reader::{PacketSource, SourceHandle};
use crate::screen::ScreenHandler;
use crate::Result;
use parking_lot::Mutex;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One decode session over a CD+G packet stream.
///
/// Created on stream start, destroyed when the stream is exhausted,
/// fails, or is explicitly stopped; the raster and palette live exactly
/// as long as the session.
pub struct DecodeSession {
    consumer: Option<JoinHandle<()>>,
    source_handle: SourceHandle,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    stats: Arc<Mutex<DecodeStats>>,
}

impl DecodeSession {
    /// Start decoding: spawn the producer and the consumer loop.
    ///
    /// The sink receives a notification after every recognized
    /// instruction, synchronously from the consumer thread.
    pub fn start<R: Read + Send + 'static>(
        mut source: PacketSource<R>,
        clock: PlaybackClock,
        sink: Box<dyn ScreenHandler>,
    ) -> Result<Self> {
        source.start()?;
        let source_handle = source.handle();

        let mut dispatcher = PacedDispatcher::new(clock);
        let stats = dispatcher.stats();
        let stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let consumer = {
            let stop = Arc::clone(&stop);
            let finished = Arc::clone(&finished);
            thread::Builder::new()
                .name("cdg-decode".into())
                .spawn(move || {
                    let mut interpreter = Interpreter::new(sink);
                    dispatcher.run(&mut source, &mut interpreter, &stop);
                    source.stop();
                    finished.store(true, Ordering::Release);
                })
                .map_err(|e| {
                    crate::CdgError::Resource(format!("failed to spawn decode thread: {e}"))
                })?
        };

        Ok(DecodeSession {
            consumer: Some(consumer),
            source_handle,
            stop,
            finished,
            stats,
        })
    }

    /// Whether the session has finished (stream exhausted, failed, or
    /// stopped)
    pub fn is_done(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> DecodeStats {
        *self.stats.lock()
    }

    /// Block until the stream has been fully decoded
    pub fn wait_until_done(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.join();
        }
    }

    /// Stop the session, unblocking both threads, and wait for them to
    /// exit. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Wake a consumer blocked on the slot rendezvous
        self.source_handle.shutdown();
        self.wait_until_done();
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.stop();
    }
}
