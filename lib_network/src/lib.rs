// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

/// This crate models the overlay network that connects peers: the
/// connectivity graph, the per-link latency oracle, and the asynchronous
/// delivery primitives peers use to send each other transactions and
/// blocks. There is no real socket anywhere in this crate — delivery is a
/// scheduled wakeup on the shared `lib_scheduler::Scheduler`.
pub mod error;
pub mod graph;
pub mod network;

pub use error::NetworkError;
pub use network::{Network, PeerEndpoint, Speed};
