use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::codec::{self, HashDigest};
use super::transaction::Transaction;

/// Represents a block in the blockchain
///
/// Fields are declared in the order of the canonical encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Creation time in nanoseconds since the Unix epoch
    pub timestamp: i64,

    /// Proof of work (nonce)
    pub nonce: u64,

    /// Hash of the previous block
    #[serde(rename = "previous-hash", with = "codec::hex_digest")]
    #[schema(value_type = String, example = "000a1b...")]
    pub previous_hash: HashDigest,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block stamped with the current time
    pub fn new(nonce: u64, previous_hash: HashDigest, transactions: Vec<Transaction>) -> Self {
        Block {
            timestamp: now_nanos(),
            nonce,
            previous_hash,
            transactions,
        }
    }

    /// The all-zero block whose hash anchors the genesis block
    pub fn empty() -> Self {
        Block {
            timestamp: 0,
            nonce: 0,
            previous_hash: [0u8; 32],
            transactions: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_block(self.timestamp, self.nonce, &self.previous_hash, &self.transactions)
    }

    /// Calculates the SHA-256 hash of the block
    pub fn hash(&self) -> HashDigest {
        codec::sha256(&self.to_bytes())
    }
}

fn now_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}
