//! # Bus Messages
//!
//! Everything that crosses the thread boundary. Payloads move by value;
//! finished chunks travel as `Arc<RenderChunk>` and are never mutated.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tessera_core::{ChunkCoord, Priority};
use tessera_procedural::RenderChunk;

/// Message discriminant, used for logging and ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Consumer asks for a chunk.
    ChunkRequest,
    /// Worker answers a request.
    ChunkResponse,
    /// Consumer no longer wants a request answered.
    ChunkCancel,
    /// Periodic worker report.
    StatusUpdate,
    /// Stop the worker.
    Shutdown,
}

impl MessageKind {
    /// Snake-case name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChunkRequest => "chunk_request",
            Self::ChunkResponse => "chunk_response",
            Self::ChunkCancel => "chunk_cancel",
            Self::StatusUpdate => "status_update",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable request id for a chunk coordinate.
///
/// Two requests for the same chunk share an id.
#[must_use]
pub fn request_id(coord: ChunkCoord) -> String {
    format!("chunk_{}_{}", coord.x, coord.y)
}

/// A request to generate one render chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Render chunk coordinate.
    pub coord: ChunkCoord,
    /// Scheduling tier.
    pub priority: Priority,
    /// See [`request_id`].
    pub request_id: String,
    /// Bus sequence number; distinguishes repeated requests for one chunk.
    pub ticket: u64,
}

/// Outcome of one chunk request.
#[derive(Clone, Debug)]
pub struct ChunkResponse {
    /// Render chunk coordinate.
    pub coord: ChunkCoord,
    /// Ticket of the request being answered.
    pub ticket: u64,
    /// The chunk, or the failure message.
    pub result: Result<Arc<RenderChunk>, String>,
    /// Time spent generating; zero when served from the worker cache.
    pub generation_time: Duration,
}

impl ChunkResponse {
    /// Whether generation succeeded.
    #[inline]
    #[must_use]
    pub const fn success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Worker health snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Messages waiting on the worker queue.
    pub queue_depth: usize,
    /// Chunks generated since start.
    pub chunks_generated: u64,
    /// Requests taken off the queue since start.
    pub requests_processed: u64,
    /// Entries in the worker cache.
    pub cache_size: usize,
}

/// Message body.
#[derive(Clone, Debug)]
pub enum Payload {
    /// See [`ChunkRequest`].
    ChunkRequest(ChunkRequest),
    /// See [`ChunkResponse`].
    ChunkResponse(ChunkResponse),
    /// Suppress the reply to every request for `request_id` up to `ticket`.
    ChunkCancel {
        /// Request id to cancel.
        request_id: String,
        /// Highest ticket covered by the cancel.
        ticket: u64,
    },
    /// See [`StatusUpdate`].
    StatusUpdate(StatusUpdate),
    /// Stop the worker.
    Shutdown,
}

impl Payload {
    /// Discriminant.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::ChunkRequest(_) => MessageKind::ChunkRequest,
            Self::ChunkResponse(_) => MessageKind::ChunkResponse,
            Self::ChunkCancel { .. } => MessageKind::ChunkCancel,
            Self::StatusUpdate(_) => MessageKind::StatusUpdate,
            Self::Shutdown => MessageKind::Shutdown,
        }
    }

    /// Worker queue rank. Lower is served first.
    ///
    /// Control messages outrank every request: shutdown 0, cancel 1,
    /// then requests from urgent (2) down to low (5).
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Shutdown => 0,
            Self::ChunkCancel { .. } => 1,
            Self::ChunkRequest(request) => match request.priority {
                Priority::Urgent => 2,
                Priority::High => 3,
                Priority::Normal => 4,
                Priority::Low => 5,
            },
            Self::ChunkResponse(_) | Self::StatusUpdate(_) => 6,
        }
    }

    /// Chunk coordinate carried by the payload, if any.
    #[must_use]
    pub const fn coord(&self) -> Option<ChunkCoord> {
        match self {
            Self::ChunkRequest(request) => Some(request.coord),
            Self::ChunkResponse(response) => Some(response.coord),
            _ => None,
        }
    }
}

/// A payload stamped with its send time.
#[derive(Clone, Debug)]
pub struct Message {
    /// Body.
    pub payload: Payload,
    /// When the message was sent.
    pub timestamp: Instant,
}

impl Message {
    /// Stamps `payload` with the current time.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            timestamp: Instant::now(),
        }
    }

    /// Discriminant.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Time since the message was sent.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(priority: Priority) -> Payload {
        let coord = ChunkCoord::new(1, -2);
        Payload::ChunkRequest(ChunkRequest {
            coord,
            priority,
            request_id: request_id(coord),
            ticket: 0,
        })
    }

    #[test]
    fn test_request_id_format() {
        assert_eq!(request_id(ChunkCoord::new(1, -2)), "chunk_1_-2");
        assert_eq!(request_id(ChunkCoord::new(0, 0)), request_id(ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_control_outranks_requests() {
        let shutdown = Payload::Shutdown.rank();
        let cancel = Payload::ChunkCancel {
            request_id: "chunk_0_0".into(),
            ticket: 1,
        }
        .rank();
        assert!(shutdown < cancel);
        assert!(cancel < request(Priority::Urgent).rank());
        assert!(request(Priority::Urgent).rank() < request(Priority::High).rank());
        assert!(request(Priority::High).rank() < request(Priority::Normal).rank());
        assert!(request(Priority::Normal).rank() < request(Priority::Low).rank());
    }

    #[test]
    fn test_kind_and_coord() {
        let payload = request(Priority::Normal);
        assert_eq!(payload.kind(), MessageKind::ChunkRequest);
        assert_eq!(payload.coord(), Some(ChunkCoord::new(1, -2)));
        assert_eq!(Payload::Shutdown.coord(), None);
        assert_eq!(MessageKind::ChunkCancel.to_string(), "chunk_cancel");
    }
}
