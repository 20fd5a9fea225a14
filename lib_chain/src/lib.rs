// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

/// This crate contains the definitions of `Transaction`, `Block`, the
/// per-peer `BlockTree`, and the balance-bookkeeping validation rule shared
/// by every peer in the simulation. Blocks and transactions are immutable
/// once constructed; a `BlockTree` is the one mutable structure here, and it
/// is owned by exactly one peer (see `lib_peer`).
pub mod block;
pub mod error;
pub mod transaction;

/// Simulated time, in abstract time units. Never wall-clock.
pub type Time = f64;

pub use block::{Block, BlockId, BlockNode, BlockTree};
pub use error::ChainError;
pub use transaction::{PeerId, Transaction, TxId};
