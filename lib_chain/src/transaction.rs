/// This file contains the definition of `Transaction`, the smallest
/// immutable value in the simulation. A transaction's id is not stored
/// explicitly; it is the sha256 fingerprint of its fields, matching the
/// `gen_hash` convention used for blocks.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Peers are opaque integer ids (`0..n-1`), not the duck-typed object
/// identities of the reference implementation.
pub type PeerId = u32;
/// A content-deterministic fingerprint, hex-encoded. Not a real
/// cryptographic commitment (no signatures are modeled in this simulation)
/// — just a stand-in unique id.
pub type TxId = String;

/// An immutable transfer of `amount` coins from `sender` to `receiver`,
/// timestamped at creation. `sender == receiver` is permitted (see
/// `lib_chain::error::ChainError` docs).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub sender: PeerId,
    pub receiver: PeerId,
    pub amount: i64,
    pub timestamp: f64,
    /// A monotonically increasing counter supplied by the creating peer so
    /// that two transactions with otherwise identical fields (same sender,
    /// receiver, amount, and simulated timestamp — possible since simulated
    /// time has no inherent sub-tick resolution) still hash to distinct ids.
    pub nonce: u64,
}

impl Transaction {
    pub fn new(
        sender: PeerId,
        receiver: PeerId,
        amount: i64,
        timestamp: f64,
        nonce: u64,
    ) -> Transaction {
        Transaction {
            sender,
            receiver,
            amount,
            timestamp,
            nonce,
        }
    }

    /// The transaction id: the sha256 hash of the serialized transaction in
    /// hex format, mirroring `Transaction::gen_hash` in the teacher crate.
    pub fn id(&self) -> TxId {
        let mut hasher = Sha256::new();
        let serialized = serde_json::to_string(self).expect("Transaction always serializes");
        hasher.update(serialized.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_and_content_sensitive() {
        let a = Transaction::new(1, 2, 10, 0.0, 0);
        let b = Transaction::new(1, 2, 10, 0.0, 0);
        let c = Transaction::new(1, 2, 11, 0.0, 0);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn self_transfer_is_constructible() {
        let tx = Transaction::new(3, 3, 5, 1.0, 0);
        assert_eq!(tx.sender, tx.receiver);
    }
}
