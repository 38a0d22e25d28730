use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Proof carried by the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// Sentinel `previous_hash` of the genesis block; not the hash of any block
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Position of the block in the chain, starting at 1
    pub index: u64,

    /// Seconds since the Unix epoch when the block was sealed
    pub timestamp: f64,

    /// Transactions sealed into this block
    pub transactions: Vec<Transaction>,

    /// Proof of work linking this block to its predecessor's proof
    pub proof: u64,

    /// Hash of the previous block
    pub previous_hash: String,
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The list of transactions to include in the block
    /// * `proof` - The proof of work
    /// * `previous_hash` - The hash of the previous block
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Self {
        Block {
            index,
            timestamp: now_seconds(),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Creates the genesis block
    pub fn genesis() -> Self {
        Block::new(
            1,
            Vec::new(),
            GENESIS_PROOF,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Canonical serialized form of the block.
    ///
    /// Object keys are emitted in sorted order at every depth, so the output
    /// only depends on the block's contents.
    pub fn canonical_json(&self) -> String {
        let block_data = serde_json::json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "proof": self.proof,
            "previous_hash": self.previous_hash,
        });

        canonical_json(&block_data)
    }

    /// Calculates the hash of the block
    ///
    /// # Returns
    ///
    /// The hex-encoded SHA-256 digest of the block's canonical form
    pub fn hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_json().as_bytes());
        hex::encode(digest)
    }
}

/// Serializes a JSON value with object keys sorted at every level
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars use serde_json's locale-independent formatting
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn now_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
