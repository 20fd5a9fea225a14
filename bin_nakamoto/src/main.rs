// This file is part of the project for the module CS3235 by Prateek
// Copyright 2023 Ruishi Li, Bo Wang, and Prateek Saxena.
// Please do not distribute.

/// The simulator's command-line driver: parses `Config`, builds the
/// genesis block and every peer, wires them to a freshly generated
/// `Network`, runs the scheduler to `--time`, and writes the resulting
/// block trees and summaries to `--out-dir`. Orchestration order is
/// grounded on `examples/original_source/run.py`'s `main`.
mod artifacts;
mod config;
mod error;

use clap::Parser;
use config::Config;
use lib_chain::Block;
use lib_network::{Network, PeerEndpoint, Speed};
use lib_peer::{Cpu, Peer};
use lib_scheduler::Scheduler;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use std::collections::HashSet;
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        return ExitCode::FAILURE;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = std::fs::create_dir_all(&config.out_dir) {
        eprintln!(
            "{}",
            error::ConfigError::OutDir { path: config.out_dir.clone(), source: err }
        );
        return ExitCode::FAILURE;
    }

    run(&config);
    ExitCode::SUCCESS
}

/// Designates `num_slow` peers (by id) as `Speed::Slow` and `num_low` peers
/// as `Cpu::Low`, sampling each set independently without replacement from
/// `0..n`, the way `random.sample` draws the two sets in the reference
/// driver.
fn designate_classes(n: usize, num_slow: usize, num_low: usize, rng: &mut Pcg32) -> (HashSet<u32>, HashSet<u32>) {
    let mut ids: Vec<u32> = (0..n as u32).collect();
    ids.shuffle(rng);
    let slow: HashSet<u32> = ids[..num_slow.min(n)].iter().copied().collect();

    let mut ids: Vec<u32> = (0..n as u32).collect();
    ids.shuffle(rng);
    let low: HashSet<u32> = ids[..num_low.min(n)].iter().copied().collect();

    (slow, low)
}

fn run(config: &Config) {
    let n = config.n;
    let peer_ids: Vec<u32> = (0..n as u32).collect();

    let num_slow = config.num_slow();
    let num_low = config.num_low();
    // Mirrors the reference formula: a low-CPU peer gets hashing power
    // `1 / (10n - 9 * num_low)`, a high-CPU peer ten times that. The two
    // classes' powers sum to 1 across the whole network regardless of how
    // many peers are low-CPU.
    let low_power = 1.0 / (10.0 * n as f64 - 9.0 * num_low as f64);
    let high_power = 10.0 * low_power;

    let mut driver_rng = Pcg32::new(config.seed, 0x5b1d_ad9f_2c6e_3417);
    let (slow_ids, low_ids) = designate_classes(n, num_slow, num_low, &mut driver_rng);

    // Genesis balances are seeded for every peer id up front, so `Block`
    // never needs to be mutated after construction (see DESIGN.md).
    let genesis = Rc::new(Block::genesis(&peer_ids));
    let scheduler = Scheduler::new();

    let peers: Vec<Rc<Peer>> = peer_ids
        .iter()
        .map(|&id| {
            let speed = if slow_ids.contains(&id) { Speed::Slow } else { Speed::Fast };
            let cpu = if low_ids.contains(&id) { Cpu::Low } else { Cpu::High };
            let hashing_power = if cpu == Cpu::Low { low_power } else { high_power };
            let other_peer_ids: Vec<u32> = peer_ids.iter().copied().filter(|&other| other != id).collect();
            let peer_seed = config.seed.wrapping_add(1 + id as u64);
            Peer::new(
                id,
                speed,
                cpu,
                hashing_power,
                config.mean_block_interarrival,
                config.ttx,
                other_peer_ids,
                genesis.clone(),
                scheduler.clone(),
                peer_seed,
            )
        })
        .collect();

    let speeds: Vec<Speed> = peers.iter().map(|p| p.speed).collect();
    let endpoints: Vec<Rc<dyn PeerEndpoint>> = peers.iter().map(|p| p.clone() as Rc<dyn PeerEndpoint>).collect();
    let network = match Network::new(endpoints, &speeds, config.mean_block_interarrival, scheduler.clone(), config.seed) {
        Ok(network) => Rc::new(network),
        Err(err) => {
            eprintln!("failed to build network: {err}");
            return;
        }
    };
    for peer in &peers {
        peer.set_network(Rc::downgrade(&network));
    }

    tracing::info!(n, num_slow, num_low, time = config.time, "starting simulation");
    for peer in &peers {
        peer.start();
    }
    scheduler.run_until(config.time);
    tracing::info!(now = scheduler.now(), "simulation complete");

    if let Err(err) = artifacts::write_artifacts(&peers, &config.out_dir) {
        eprintln!("failed to write artifacts: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn designate_classes_picks_the_right_counts() {
        let mut rng = Pcg32::new(7, 1);
        let (slow, low) = designate_classes(20, 6, 4, &mut rng);
        assert_eq!(slow.len(), 6);
        assert_eq!(low.len(), 4);
    }

    #[test]
    fn zero_time_run_produces_only_genesis_blocks() {
        let config = Config {
            n: 4,
            z0: 50.0,
            z1: 50.0,
            ttx: 0.5,
            mean_block_interarrival: 0.5,
            time: 0.0,
            seed: 1,
            out_dir: std::env::temp_dir().join("bin_nakamoto_test_zero_time"),
            log_level: "error".to_string(),
        };
        run(&config);
        let summary_path = config.out_dir.join("summary.json");
        assert!(summary_path.exists());
        let _ = std::fs::remove_dir_all(&config.out_dir);
    }

    #[test]
    fn hashing_power_classes_sum_to_one() {
        let n: f64 = 10.0;
        let num_low = 4.0;
        let low_power = 1.0 / (10.0 * n - 9.0 * num_low);
        let high_power = 10.0 * low_power;
        let total = num_low * low_power + (n - num_low) * high_power;
        assert!((total - 1.0).abs() < 1e-9);
    }
}
