//! ID generation utilities.
//!
//! Local rows are keyed by 64-bit snowflake IDs: 41 bits of milliseconds
//! since [`EPOCH_MS`], 10 bits of node id and a 12-bit per-millisecond
//! sequence. They sort by creation time and render as plain integers in URIs
//! such as `<base>/statuses/<id>`.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use uuid::Uuid;

/// 2024-01-01T00:00:00Z.
pub const EPOCH_MS: i64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const NODE_MASK: u16 = (1 << NODE_BITS) - 1;

/// Snowflake ID generator. Clones share state.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    node: u16,
    // (millis since epoch << SEQUENCE_BITS) | sequence of the last issued id
    last: Arc<AtomicU64>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Create a generator for node 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_node(0)
    }

    /// Create a generator for a specific node. Only the low 10 bits are used.
    #[must_use]
    pub fn with_node(node: u16) -> Self {
        Self {
            node: node & NODE_MASK,
            last: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generate a new ID, strictly greater than any previously issued by this
    /// generator or its clones.
    #[must_use]
    pub fn generate(&self) -> i64 {
        let now = u64::try_from(Utc::now().timestamp_millis() - EPOCH_MS).unwrap_or(0);
        let candidate = now << SEQUENCE_BITS;

        let mut current = self.last.load(Ordering::Relaxed);
        let next = loop {
            // Clock going backwards or sequence overflow borrows from the next ms.
            let next = candidate.max(current + 1);
            match self
                .last
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break next,
                Err(actual) => current = actual,
            }
        };

        let millis = next >> SEQUENCE_BITS;
        let sequence = next & SEQUENCE_MASK;
        let id = (millis << (NODE_BITS + SEQUENCE_BITS))
            | (u64::from(self.node) << SEQUENCE_BITS)
            | sequence;

        i64::try_from(id).unwrap_or(i64::MAX)
    }

    /// Generate a random opaque token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Millisecond timestamp an ID was generated at.
#[must_use]
pub const fn timestamp_millis(id: i64) -> i64 {
    (id >> (NODE_BITS + SEQUENCE_BITS)) + EPOCH_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_strictly_increasing() {
        let id_gen = IdGenerator::new();
        let ids: Vec<i64> = (0..10_000).map(|_| id_gen.generate()).collect();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|id| *id > 0));
    }

    #[test]
    fn test_clones_share_sequence() {
        let a = IdGenerator::with_node(3);
        let b = a.clone();
        let first = a.generate();
        let second = b.generate();
        assert!(second > first);
    }

    #[test]
    fn test_timestamp_is_recoverable() {
        let before = Utc::now().timestamp_millis();
        let id = IdGenerator::new().generate();
        assert!(timestamp_millis(id) >= before);
    }

    #[test]
    fn test_generate_token() {
        assert_eq!(IdGenerator::new().generate_token().len(), 32);
    }
}
