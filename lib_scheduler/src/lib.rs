// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

/// This crate implements the discrete-event scheduler that every other crate
/// in this workspace runs on top of. It is a single-threaded, cooperative
/// executor keyed by simulated time: `Scheduler::spawn` admits a process
/// (an `async` block), and `Scheduler::timeout` is the only way a process
/// suspends waiting for time to pass. `Scheduler::run_until` drives both the
/// executor and the virtual clock forward together.
pub mod scheduler;
pub mod time;

pub use scheduler::{Scheduler, Timeout};
pub use time::Time;
