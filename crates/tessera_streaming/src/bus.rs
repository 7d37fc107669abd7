//! # Message Bus
//!
//! Two bounded queues between the consumer thread and the worker:
//!
//! ```text
//! ┌──────────────┐  to_worker (priority, rank then FIFO)  ┌──────────────┐
//! │   Consumer   │ ─────────────────────────────────────▶ │    Worker    │
//! │ WorldManager │ ◀───────────────────────────────────── │              │
//! └──────────────┘  to_main (FIFO)                        └──────────────┘
//! ```
//!
//! Sends never block. A full queue drops the message and logs a warning;
//! callers re-request on a later tick. Shutdown is the only message
//! allowed past a full worker queue.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use tessera_core::{ChunkCoord, Priority, WorldConfig};

use crate::messages::{request_id, ChunkRequest, ChunkResponse, Message, Payload, StatusUpdate};

/// A worker-queue entry ordered by `(rank, seq)`, smallest first.
struct Queued {
    rank: u8,
    seq: u64,
    message: Message,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap.
        (other.rank, other.seq).cmp(&(self.rank, self.seq))
    }
}

/// Bounded priority queue with a blocking, timed pop.
struct PriorityQueue {
    heap: Mutex<BinaryHeap<Queued>>,
    not_empty: Condvar,
    capacity: usize,
}

impl PriorityQueue {
    fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::with_capacity(capacity.min(4096))),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Pushes an entry. Returns it back if the queue is full.
    fn push(&self, entry: Queued, force: bool) -> Result<(), Message> {
        let mut heap = self.heap.lock();
        if !force && heap.len() >= self.capacity {
            return Err(entry.message);
        }
        heap.push(entry);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pops the best entry, waiting up to `timeout` for one to arrive.
    fn pop(&self, timeout: Duration) -> Option<Message> {
        let mut heap = self.heap.lock();
        if heap.is_empty() {
            self.not_empty.wait_for(&mut heap, timeout);
        }
        heap.pop().map(|entry| entry.message)
    }

    fn len(&self) -> usize {
        self.heap.lock().len()
    }
}

/// Bus counters snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Messages accepted by either queue.
    pub messages_sent: u64,
    /// Messages handed to a receiver.
    pub messages_received: u64,
    /// Messages dropped on a full queue.
    pub messages_dropped: u64,
    /// Current worker queue depth.
    pub to_worker_len: usize,
    /// Current consumer queue depth.
    pub to_main_len: usize,
}

#[derive(Default)]
struct BusCounters {
    sent: AtomicU64,
    received: AtomicU64,
    dropped: AtomicU64,
}

/// The two queues between consumer and worker.
pub struct MessageBus {
    to_worker: PriorityQueue,
    to_main_tx: Sender<Message>,
    to_main_rx: Receiver<Message>,
    next_seq: AtomicU64,
    counters: BusCounters,
}

impl MessageBus {
    /// Creates a bus whose queues each hold `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (to_main_tx, to_main_rx) = bounded(capacity);
        Self {
            to_worker: PriorityQueue::new(capacity),
            to_main_tx,
            to_main_rx,
            next_seq: AtomicU64::new(1),
            counters: BusCounters::default(),
        }
    }

    /// Creates a bus sized by `config.queue_capacity`.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.queue_capacity)
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn enqueue(&self, payload: Payload, seq: u64) -> bool {
        let rank = payload.rank();
        let force = matches!(payload, Payload::Shutdown);
        let entry = Queued {
            rank,
            seq,
            message: Message::new(payload),
        };
        match self.to_worker.push(entry, force) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(message) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    kind = %message.kind(),
                    coord = ?message.payload.coord(),
                    "worker queue full, message dropped"
                );
                false
            }
        }
    }

    /// Queues a message for the worker. Returns `false` if it was dropped.
    pub fn send_to_worker(&self, payload: Payload) -> bool {
        let seq = self.next_seq();
        self.enqueue(payload, seq)
    }

    /// Queues a message for the consumer. Returns `false` if it was dropped.
    pub fn send_to_main(&self, payload: Payload) -> bool {
        match self.to_main_tx.try_send(Message::new(payload)) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(message) | TrySendError::Disconnected(message)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    kind = %message.kind(),
                    coord = ?message.payload.coord(),
                    "consumer queue full, message dropped"
                );
                false
            }
        }
    }

    /// Worker side: waits up to `timeout` for the next message by rank.
    pub fn receive_from_main(&self, timeout: Duration) -> Option<Message> {
        let message = self.to_worker.pop(timeout)?;
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        Some(message)
    }

    /// Consumer side: drains at most `max` messages without blocking.
    pub fn receive_from_worker(&self, max: usize) -> Vec<Message> {
        let messages: Vec<Message> = self.to_main_rx.try_iter().take(max).collect();
        self.counters
            .received
            .fetch_add(messages.len() as u64, Ordering::Relaxed);
        messages
    }

    /// Requests a chunk. Returns the request's ticket, or `None` if dropped.
    pub fn request_chunk(&self, coord: ChunkCoord, priority: Priority) -> Option<u64> {
        let ticket = self.next_seq();
        let payload = Payload::ChunkRequest(ChunkRequest {
            coord,
            priority,
            request_id: request_id(coord),
            ticket,
        });
        self.enqueue(payload, ticket).then_some(ticket)
    }

    /// Cancels requests for `coord` up to and including `ticket`.
    pub fn cancel_chunk(&self, coord: ChunkCoord, ticket: u64) -> bool {
        self.send_to_worker(Payload::ChunkCancel {
            request_id: request_id(coord),
            ticket,
        })
    }

    /// Asks the worker to stop. Never dropped.
    pub fn send_shutdown(&self) -> bool {
        self.send_to_worker(Payload::Shutdown)
    }

    /// Sends a chunk response to the consumer.
    pub fn send_response(&self, response: ChunkResponse) -> bool {
        self.send_to_main(Payload::ChunkResponse(response))
    }

    /// Sends a worker status report to the consumer.
    pub fn send_status(&self, status: StatusUpdate) -> bool {
        self.send_to_main(Payload::StatusUpdate(status))
    }

    /// Messages waiting for the worker.
    #[must_use]
    pub fn to_worker_len(&self) -> usize {
        self.to_worker.len()
    }

    /// Messages waiting for the consumer.
    #[must_use]
    pub fn to_main_len(&self) -> usize {
        self.to_main_rx.len()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            messages_sent: self.counters.sent.load(Ordering::Relaxed),
            messages_received: self.counters.received.load(Ordering::Relaxed),
            messages_dropped: self.counters.dropped.load(Ordering::Relaxed),
            to_worker_len: self.to_worker_len(),
            to_main_len: self.to_main_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn coord_of(message: &Message) -> ChunkCoord {
        message.payload.coord().unwrap()
    }

    #[test]
    fn test_priority_then_fifo() {
        let bus = MessageBus::new(16);
        bus.request_chunk(ChunkCoord::new(0, 0), Priority::Normal).unwrap();
        bus.request_chunk(ChunkCoord::new(1, 0), Priority::Low).unwrap();
        bus.request_chunk(ChunkCoord::new(2, 0), Priority::Urgent).unwrap();
        bus.request_chunk(ChunkCoord::new(3, 0), Priority::Normal).unwrap();

        let order: Vec<i64> = (0..4)
            .map(|_| coord_of(&bus.receive_from_main(Duration::ZERO).unwrap()).x)
            .collect();
        assert_eq!(order, vec![2, 0, 3, 1]);
    }

    #[test]
    fn test_control_messages_first() {
        let bus = MessageBus::new(16);
        bus.request_chunk(ChunkCoord::new(0, 0), Priority::Urgent).unwrap();
        assert!(bus.cancel_chunk(ChunkCoord::new(5, 5), 1));
        assert!(bus.send_shutdown());

        let first = bus.receive_from_main(Duration::ZERO).unwrap();
        assert!(matches!(first.payload, Payload::Shutdown));
        let second = bus.receive_from_main(Duration::ZERO).unwrap();
        assert!(matches!(second.payload, Payload::ChunkCancel { ref request_id, .. } if request_id == "chunk_5_5"));
    }

    #[test]
    fn test_full_worker_queue_drops() {
        let bus = MessageBus::new(2);
        assert!(bus.request_chunk(ChunkCoord::new(0, 0), Priority::Normal).is_some());
        assert!(bus.request_chunk(ChunkCoord::new(1, 0), Priority::Normal).is_some());
        assert!(bus.request_chunk(ChunkCoord::new(2, 0), Priority::Urgent).is_none());
        // Shutdown still gets through.
        assert!(bus.send_shutdown());

        let stats = bus.stats();
        assert_eq!(stats.messages_dropped, 1);
        assert_eq!(stats.messages_sent, 3);
        assert_eq!(stats.to_worker_len, 3);
    }

    #[test]
    fn test_full_main_queue_drops() {
        let bus = MessageBus::new(1);
        assert!(bus.send_status(StatusUpdate::default()));
        assert!(!bus.send_status(StatusUpdate::default()));
        assert_eq!(bus.receive_from_worker(10).len(), 1);
        assert_eq!(bus.stats().messages_dropped, 1);
    }

    #[test]
    fn test_receive_from_worker_is_bounded() {
        let bus = MessageBus::new(16);
        for _ in 0..5 {
            bus.send_status(StatusUpdate::default());
        }
        assert_eq!(bus.receive_from_worker(3).len(), 3);
        assert_eq!(bus.to_main_len(), 2);
        assert_eq!(bus.receive_from_worker(10).len(), 2);
        assert!(bus.receive_from_worker(10).is_empty());
    }

    #[test]
    fn test_receive_times_out_when_empty() {
        let bus = MessageBus::new(4);
        let start = Instant::now();
        assert!(bus.receive_from_main(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_receive_wakes_on_send() {
        let bus = Arc::new(MessageBus::new(4));
        let sender = Arc::clone(&bus);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.request_chunk(ChunkCoord::new(7, 7), Priority::High)
        });
        let message = bus.receive_from_main(Duration::from_secs(5)).unwrap();
        assert_eq!(coord_of(&message), ChunkCoord::new(7, 7));
        assert!(handle.join().unwrap().is_some());
    }

    #[test]
    fn test_tickets_increase() {
        let bus = MessageBus::new(4);
        let a = bus.request_chunk(ChunkCoord::new(0, 0), Priority::Normal).unwrap();
        let b = bus.request_chunk(ChunkCoord::new(0, 0), Priority::Normal).unwrap();
        assert!(b > a);
    }
}
