//! Chunk layer for oversized payloads.
//!
//! Every outbound wire message is serialized to a JSON string, cut into
//! pieces of at most `max_chunk_size` bytes and wrapped in a chunk envelope:
//!
//! ```text
//! { "chunkId": "...", "deviceId": "...", "index": 0, "total": 3, "data": "..." }
//! ```
//!
//! On the receiving side chunks are collected per `chunkId` until all parts
//! are present. Chunks carrying the local device id are dropped, which is how
//! a device ignores its own publications echoed back by the network.

use std::collections::HashMap;

use clip_types::{DeviceId, TransferId, WireMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Largest `data` slice per chunk, in bytes.
pub const MAX_CHUNK_SIZE: usize = 260_000;

/// Most chunks accepted for one transfer; larger `total`s are dropped.
pub const MAX_TRANSFER_CHUNKS: u32 = 1024;

/// Incomplete transfers kept before the oldest is evicted.
pub const MAX_PENDING_TRANSFERS: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chunk {
    chunk_id: String,
    device_id: DeviceId,
    index: u32,
    total: u32,
    data: String,
}

#[derive(Debug)]
struct PendingTransfer {
    parts: Vec<Option<String>>,
    received: usize,
    sequence: u64,
}

/// Result of feeding one inbound value to the [`Chunker`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// A whole message is available.
    Complete(Value),
    /// Part of a transfer arrived; `pending` parts are still missing.
    Progress {
        /// Parts still missing for this transfer.
        pending: usize,
    },
    /// Own message, duplicate or malformed chunk.
    Ignored,
}

/// Splits outbound messages and reassembles inbound ones.
#[derive(Debug)]
pub struct Chunker {
    device_id: DeviceId,
    max_chunk_size: usize,
    transfers: HashMap<String, PendingTransfer>,
    next_sequence: u64,
}

impl Chunker {
    /// Create a chunker for the local device.
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            max_chunk_size: MAX_CHUNK_SIZE,
            transfers: HashMap::new(),
            next_sequence: 0,
        }
    }

    /// Override the maximum chunk size (minimum 4 bytes, so any UTF-8 character fits).
    pub fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size.max(4);
        self
    }

    /// The local device id.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Number of incomplete inbound transfers.
    pub fn pending_transfers(&self) -> usize {
        self.transfers.len()
    }

    /// Split a wire message into chunk envelopes ready to publish.
    pub fn split(&self, message: &WireMessage) -> Result<Vec<Value>, serde_json::Error> {
        let serialized = serde_json::to_string(message)?;
        let pieces = split_at_char_boundaries(&serialized, self.max_chunk_size);
        let chunk_id = TransferId::new().to_string();
        let total = pieces.len() as u32;
        if total > MAX_TRANSFER_CHUNKS {
            warn!(total, max = MAX_TRANSFER_CHUNKS, "Outbound message exceeds the transfer limit");
        }

        debug!(
            chunk_id = %chunk_id,
            total,
            bytes = serialized.len(),
            "Split outbound message"
        );

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, data)| {
                serde_json::to_value(Chunk {
                    chunk_id: chunk_id.clone(),
                    device_id: self.device_id.clone(),
                    index: index as u32,
                    total,
                    data: data.to_string(),
                })
            })
            .collect()
    }

    /// Feed one inbound value.
    ///
    /// Values without a `chunkId` are treated as unchunked wire messages and
    /// passed through (still subject to the own-device filter).
    pub fn receive(&mut self, value: Value) -> ChunkOutcome {
        if value.get("chunkId").is_none() {
            return self.receive_unchunked(value);
        }

        let chunk: Chunk = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "Dropping malformed chunk");
                return ChunkOutcome::Ignored;
            }
        };

        if chunk.device_id == self.device_id {
            return ChunkOutcome::Ignored;
        }
        if chunk.total == 0 || chunk.index >= chunk.total {
            debug!(index = chunk.index, total = chunk.total, "Dropping out-of-range chunk");
            return ChunkOutcome::Ignored;
        }
        if chunk.total > MAX_TRANSFER_CHUNKS {
            warn!(
                chunk_id = %chunk.chunk_id,
                total = chunk.total,
                max = MAX_TRANSFER_CHUNKS,
                "Dropping chunk of oversized transfer"
            );
            return ChunkOutcome::Ignored;
        }

        if chunk.total == 1 {
            return parse_payload(&chunk.data);
        }

        if !self.transfers.contains_key(&chunk.chunk_id) {
            self.evict_if_full();
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.transfers.insert(
                chunk.chunk_id.clone(),
                PendingTransfer {
                    parts: vec![None; chunk.total as usize],
                    received: 0,
                    sequence,
                },
            );
        }

        let Some(transfer) = self.transfers.get_mut(&chunk.chunk_id) else {
            return ChunkOutcome::Ignored;
        };
        if transfer.parts.len() != chunk.total as usize {
            debug!(chunk_id = %chunk.chunk_id, "Dropping chunk with inconsistent total");
            return ChunkOutcome::Ignored;
        }

        let slot = &mut transfer.parts[chunk.index as usize];
        if slot.is_some() {
            return ChunkOutcome::Ignored;
        }
        *slot = Some(chunk.data);
        transfer.received += 1;

        let pending = transfer.parts.len() - transfer.received;
        if pending > 0 {
            return ChunkOutcome::Progress { pending };
        }

        let Some(transfer) = self.transfers.remove(&chunk.chunk_id) else {
            return ChunkOutcome::Ignored;
        };
        let payload: String = transfer.parts.into_iter().flatten().collect();
        parse_payload(&payload)
    }

    fn receive_unchunked(&self, value: Value) -> ChunkOutcome {
        let own = value
            .get("deviceId")
            .and_then(Value::as_str)
            .is_some_and(|id| id == self.device_id.as_str());
        if own {
            ChunkOutcome::Ignored
        } else {
            ChunkOutcome::Complete(value)
        }
    }

    fn evict_if_full(&mut self) {
        if self.transfers.len() < MAX_PENDING_TRANSFERS {
            return;
        }
        let oldest = self
            .transfers
            .iter()
            .min_by_key(|(_, t)| t.sequence)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            warn!(chunk_id = %id, "Evicting incomplete transfer");
            self.transfers.remove(&id);
        }
    }
}

fn parse_payload(payload: &str) -> ChunkOutcome {
    match serde_json::from_str(payload) {
        Ok(value) => ChunkOutcome::Complete(value),
        Err(e) => {
            warn!(error = %e, "Reassembled payload is not JSON");
            ChunkOutcome::Ignored
        }
    }
}

fn split_at_char_boundaries(input: &str, max: usize) -> Vec<&str> {
    if input.is_empty() {
        return vec![input];
    }
    let mut pieces = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let mut end = rest.len().min(max);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        pieces.push(head);
        rest = tail;
    }
    pieces
}
