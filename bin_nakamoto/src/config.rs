/// Command-line surface for the simulator, grounded on `examples/
/// original_source/run.py`'s `argparse` definitions (`--n`, `--z0`, `--z1`,
/// `--Ttx`, `--time`, `--I`) plus the output-artifact and logging flags
/// SPEC_FULL.md adds on top.
use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "bin_nakamoto", about = "Discrete-event simulator for a Nakamoto-style peer-to-peer network")]
pub struct Config {
    /// Number of peers in the network.
    #[arg(long, default_value_t = 10)]
    pub n: usize,

    /// Percentage of peers assigned a slow network link, in [0, 100].
    #[arg(long, default_value_t = 50.0)]
    pub z0: f64,

    /// Percentage of peers assigned low CPU (hashing power), in [0, 100].
    #[arg(long, default_value_t = 50.0)]
    pub z1: f64,

    /// Mean transaction inter-arrival time, per peer.
    #[arg(long, default_value_t = 0.5)]
    pub ttx: f64,

    /// Mean block inter-arrival time across the whole network.
    #[arg(long = "i", default_value_t = 0.5)]
    pub mean_block_interarrival: f64,

    /// Simulated duration to run, in abstract time units.
    #[arg(long, default_value_t = 100.0)]
    pub time: f64,

    /// Master seed. Every peer's RNG and the network's RNG are derived from
    /// this one value, so a run is fully reproducible.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Directory artifacts (per-peer trees, summaries) are written into.
    #[arg(long, default_value = "./artifacts")]
    pub out_dir: PathBuf,

    /// Log verbosity: trace, debug, info, warn, or error.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::NoPeers(self.n));
        }
        if !(0.0..=100.0).contains(&self.z0) {
            return Err(ConfigError::Z0OutOfRange(self.z0));
        }
        if !(0.0..=100.0).contains(&self.z1) {
            return Err(ConfigError::Z1OutOfRange(self.z1));
        }
        if self.ttx <= 0.0 {
            return Err(ConfigError::NonPositiveTtx(self.ttx));
        }
        if self.mean_block_interarrival <= 0.0 {
            return Err(ConfigError::NonPositiveInterarrival(self.mean_block_interarrival));
        }
        if self.time < 0.0 {
            return Err(ConfigError::NegativeTime(self.time));
        }
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::BadLogLevel(other.to_string())),
        }
        Ok(())
    }

    /// Number of peers assigned a slow link: `floor(n * z0 / 100)`.
    pub fn num_slow(&self) -> usize {
        ((self.n as f64) * self.z0 / 100.0).floor() as usize
    }

    /// Number of peers assigned low CPU: `floor(n * z1 / 100)`.
    pub fn num_low(&self) -> usize {
        ((self.n as f64) * self.z1 / 100.0).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            n: 10,
            z0: 50.0,
            z1: 50.0,
            ttx: 0.5,
            mean_block_interarrival: 0.5,
            time: 100.0,
            seed: 0,
            out_dir: PathBuf::from("./artifacts"),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn zero_peers_is_rejected() {
        let mut c = base();
        c.n = 0;
        assert!(matches!(c.validate(), Err(ConfigError::NoPeers(0))));
    }

    #[test]
    fn out_of_range_percentage_is_rejected() {
        let mut c = base();
        c.z0 = 150.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut c = base();
        c.log_level = "verbose".to_string();
        assert!(matches!(c.validate(), Err(ConfigError::BadLogLevel(_))));
    }

    #[test]
    fn num_slow_and_num_low_floor_correctly() {
        let mut c = base();
        c.n = 7;
        c.z0 = 50.0;
        c.z1 = 10.0;
        assert_eq!(c.num_slow(), 3);
        assert_eq!(c.num_low(), 0);
    }
}
