use crate::transaction::PeerId;

/// The error taxonomy for block and transaction validation. Every variant is
/// handled locally by its caller (drop the block, drop the transaction);
/// none of these are fatal to the simulation. Self-transfers
/// (`sender == receiver`) are deliberately not an error here — the
/// reference implementation permits them despite a commented-out check, and
/// this implementation preserves that.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("transaction has non-positive amount {amount}")]
    NonPositiveAmount { amount: i64 },

    #[error("sender {sender} has insufficient balance ({balance}) for amount {amount}")]
    InsufficientBalance {
        sender: PeerId,
        balance: i64,
        amount: i64,
    },

    #[error("block references unknown parent {0}")]
    OrphanBlock(String),
}
