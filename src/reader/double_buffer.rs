//! Double-Buffered Packet Source
//!
//! One producer thread reads batches of up to 300 packets (one second of
//! stream) into whichever slot is `Empty`, marks it `Full` and signals the
//! consumer. The consumer drains the `Full` slot packet by packet while the
//! producer refills the other one, giving a read-ahead depth of exactly one
//! batch: the producer never runs more than one undrained batch ahead.
//!
//! Cross-thread signaling uses two named condition variables ("slot
//! filled", "slot freed") under one mutex; the consumer's only blocking
//! point is waiting for a `Full` slot and the producer's only blocking
//! point is waiting for a freed one. A distinguished shutdown condition
//! unblocks both sides so a stopped session cannot deadlock.

use crate::packet::{SubCodePacket, PACKET_SIZE};
use crate::{CdgError, Result};
use parking_lot::{Condvar, Mutex};
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Packets per buffer slot: one second of stream at 300 packets/s
pub const SLOT_CAPACITY: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// Available for filling
    Empty,
    /// Filled, awaiting consumption
    Full,
    /// Currently being read packet-by-packet
    Draining,
}

struct BufferSlot {
    packets: Vec<SubCodePacket>,
    /// Number of valid packets held; a short final batch leaves this below
    /// capacity, zero marks the end-of-stream sentinel
    ready_count: usize,
    state: SlotState,
}

impl BufferSlot {
    fn new() -> Self {
        BufferSlot {
            packets: Vec::new(),
            ready_count: 0,
            state: SlotState::Empty,
        }
    }
}

struct Shared {
    slots: [BufferSlot; 2],
    producer_failed: bool,
    shutdown: bool,
}

/// The two-slot rendezvous shared between producer and consumer
struct Rendezvous {
    shared: Mutex<Shared>,
    slot_filled: Condvar,
    slot_freed: Condvar,
}

impl Rendezvous {
    fn new() -> Self {
        Rendezvous {
            shared: Mutex::new(Shared {
                slots: [BufferSlot::new(), BufferSlot::new()],
                producer_failed: false,
                shutdown: false,
            }),
            slot_filled: Condvar::new(),
            slot_freed: Condvar::new(),
        }
    }
}

/// Cancellation handle for a running packet source.
///
/// Cloneable so a controlling thread can request shutdown while the
/// consumer owns the source itself.
#[derive(Clone)]
pub struct SourceHandle {
    sync: Arc<Rendezvous>,
}

impl SourceHandle {
    /// Signal shutdown, waking a blocked producer and consumer
    pub fn shutdown(&self) {
        let mut shared = self.sync.shared.lock();
        shared.shutdown = true;
        self.sync.slot_filled.notify_all();
        self.sync.slot_freed.notify_all();
    }
}

/// Double-buffered reader producing subcode packets in stream order.
///
/// Generic over the byte source so tests can feed in-memory streams; any
/// sequential reader works, consumed only via reads of up to
/// `SLOT_CAPACITY * PACKET_SIZE` bytes at a time.
pub struct PacketSource<R: Read + Send + 'static> {
    sync: Arc<Rendezvous>,
    byte_source: Option<R>,
    producer: Option<JoinHandle<()>>,
    /// Slot currently (or next to be) drained
    drain_slot: usize,
    /// Batch taken out of the draining slot
    batch: Vec<SubCodePacket>,
    read_ptr: usize,
    done: bool,
}

impl PacketSource<std::fs::File> {
    /// Open a CD+G file as a packet source
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(PacketSource::new(file))
    }
}

impl<R: Read + Send + 'static> PacketSource<R> {
    /// Create a packet source over an already-open byte stream
    pub fn new(byte_source: R) -> Self {
        PacketSource {
            sync: Arc::new(Rendezvous::new()),
            byte_source: Some(byte_source),
            producer: None,
            drain_slot: 0,
            batch: Vec::new(),
            read_ptr: 0,
            done: false,
        }
    }

    /// Cancellation handle usable from another thread
    pub fn handle(&self) -> SourceHandle {
        SourceHandle {
            sync: Arc::clone(&self.sync),
        }
    }

    /// Begin background filling.
    ///
    /// Fails with [`CdgError::Resource`] if the producer thread cannot be
    /// spawned, or [`CdgError::Config`] if already started.
    pub fn start(&mut self) -> Result<()> {
        let byte_source = self
            .byte_source
            .take()
            .ok_or_else(|| CdgError::Config("packet source already started".into()))?;
        let sync = Arc::clone(&self.sync);
        let producer = thread::Builder::new()
            .name("cdg-reader".into())
            .spawn(move || fill_loop(byte_source, &sync))
            .map_err(|e| CdgError::Resource(format!("failed to spawn reader thread: {e}")))?;
        self.producer = Some(producer);
        Ok(())
    }

    /// Next packet in stream order, or `None` once the stream is exhausted
    /// or the producer has failed.
    ///
    /// Blocks only while waiting for the producer to fill the next slot.
    pub fn next_packet(&mut self) -> Option<SubCodePacket> {
        loop {
            if self.done {
                return None;
            }

            // End-of-slot detection is governed purely by ready_count (the
            // batch length); the read pointer never goes stale.
            if self.read_ptr < self.batch.len() {
                let packet = self.batch[self.read_ptr];
                self.read_ptr += 1;
                if self.read_ptr == self.batch.len() {
                    // Last packet taken: hand the slot back right away so
                    // the producer can start on the next batch.
                    self.release_drained_slot();
                }
                return Some(packet);
            }

            // Acquire the next slot, blocking until it becomes Full.
            // Shutdown is an explicit cancel and takes priority; a producer
            // failure is only observed once no published slot remains, so a
            // batch that was successfully read is never dropped.
            let mut shared = self.sync.shared.lock();
            loop {
                if shared.shutdown {
                    self.done = true;
                    return None;
                }
                if shared.slots[self.drain_slot].state == SlotState::Full {
                    break;
                }
                if shared.producer_failed {
                    self.done = true;
                    return None;
                }
                self.sync.slot_filled.wait(&mut shared);
            }

            let slot = &mut shared.slots[self.drain_slot];
            if slot.ready_count == 0 {
                // End-of-stream sentinel
                slot.state = SlotState::Empty;
                drop(shared);
                self.done = true;
                return None;
            }
            slot.state = SlotState::Draining;
            self.batch = std::mem::take(&mut slot.packets);
            drop(shared);
            self.read_ptr = 0;
        }
    }

    /// Transition the draining slot back to Empty and release the producer.
    ///
    /// The spent batch vector goes back with the slot so the producer can
    /// refill it in place; after warmup no batch allocates.
    fn release_drained_slot(&mut self) {
        self.batch.clear();
        let mut shared = self.sync.shared.lock();
        let slot = &mut shared.slots[self.drain_slot];
        slot.ready_count = 0;
        slot.state = SlotState::Empty;
        slot.packets = std::mem::take(&mut self.batch);
        self.sync.slot_freed.notify_one();
        drop(shared);
        self.read_ptr = 0;
        self.drain_slot = (self.drain_slot + 1) % 2;
    }

    /// True once end of stream has been observed, the source was shut
    /// down, or the producer has failed with no packets left to deliver.
    ///
    /// Stays false as long as `next_packet()` would still return
    /// something: a pending `Full` slot or the consumer's in-hand batch
    /// outlives a producer failure.
    pub fn is_done(&self) -> bool {
        if self.done {
            return true;
        }
        if self.read_ptr < self.batch.len() {
            return false;
        }
        let shared = self.sync.shared.lock();
        if shared.shutdown {
            return true;
        }
        let slot = &shared.slots[self.drain_slot];
        if slot.state == SlotState::Full && slot.ready_count > 0 {
            return false;
        }
        shared.producer_failed
    }

    /// Stop the source, unblocking and joining the producer. Idempotent.
    pub fn stop(&mut self) {
        self.handle().shutdown();
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
        self.done = true;
    }
}

impl<R: Read + Send + 'static> Drop for PacketSource<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read until `buf` is full or end of stream
fn read_batch<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Producer loop: claim an Empty slot, fill it, mark it Full, alternate.
fn fill_loop<R: Read>(mut byte_source: R, sync: &Rendezvous) {
    let mut fill_slot = 0usize;
    let mut bytes = vec![0u8; SLOT_CAPACITY * PACKET_SIZE];

    loop {
        // Claim the slot and take its vector for in-place refill; only
        // this thread can transition it Empty -> Full, so the claim stays
        // valid once the lock is released.
        let mut packets = {
            let mut shared = sync.shared.lock();
            while shared.slots[fill_slot].state != SlotState::Empty && !shared.shutdown {
                sync.slot_freed.wait(&mut shared);
            }
            if shared.shutdown {
                return;
            }
            std::mem::take(&mut shared.slots[fill_slot].packets)
        };
        packets.clear();

        // File I/O happens outside the lock so the consumer can keep
        // draining the other slot meanwhile.
        let size = match read_batch(&mut byte_source, &mut bytes) {
            Ok(size) => size,
            Err(err) => {
                tracing::warn!("packet stream read failed: {err}");
                let mut shared = sync.shared.lock();
                shared.producer_failed = true;
                sync.slot_filled.notify_all();
                return;
            }
        };

        let trailing = size % PACKET_SIZE;
        if trailing != 0 {
            tracing::warn!(
                "stream ends with an incomplete packet; discarding {trailing} trailing bytes"
            );
        }
        let count = size / PACKET_SIZE;
        packets.reserve(count);
        for record in bytes[..count * PACKET_SIZE].chunks_exact(PACKET_SIZE) {
            let mut fixed = [0u8; PACKET_SIZE];
            fixed.copy_from_slice(record);
            packets.push(SubCodePacket::from_bytes(&fixed));
        }

        let at_end = count == 0;
        {
            let mut shared = sync.shared.lock();
            if shared.shutdown {
                return;
            }
            let slot = &mut shared.slots[fill_slot];
            slot.packets = packets;
            slot.ready_count = count;
            slot.state = SlotState::Full;
            sync.slot_filled.notify_one();
        }
        if at_end {
            // The empty Full slot is the end-of-stream sentinel
            return;
        }
        fill_slot = (fill_slot + 1) % 2;
    }
}
