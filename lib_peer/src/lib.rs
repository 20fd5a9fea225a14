// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

/// This crate implements the per-peer protocol state machine: transaction
/// generation, gossip of transactions and blocks, and the mining loop that
/// races a proof-of-work timer against the rest of the network for each new
/// tip. A `Peer` owns its mempool, routing tables, and `BlockTree`; nothing
/// here is shared mutable state except through `Rc`.
pub mod peer;

pub use lib_network::Speed;
pub use peer::{Cpu, Peer};
