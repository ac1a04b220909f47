// Configuration module for reading Solver.toml
// This module provides OOP-style configuration management for the solver service

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::MAX_CODE;
use crate::error::{Result, SolverError};
use crate::table;

/// Smallest and largest supported player counts
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 20;
// Player ids and cell values must fit the two-digit key fields
const _: () = assert!(MAX_PLAYERS <= MAX_CODE);
/// Smallest supported win length
pub const MIN_WIN_LENGTH: usize = 2;
/// Largest supported board side
pub const MAX_BOARD_SIZE: usize = 20;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub solver: SolverConfig,
    pub timing: TimingConfig,
    pub debug: DebugConfig,
}

/// How the service picks a move once every child state is valued
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Minimize the mean value of the other players
    MinimizeOpponents,
    /// Maximize the mover's own value
    MaximizeOwn,
}

/// Game and engine parameters; one value table exists per
/// (board_size, win_length, n_players)
#[derive(Debug, Deserialize, Clone)]
pub struct SolverConfig {
    pub board_size: usize,
    pub win_length: usize,
    pub n_players: usize,
    /// Directory holding one cache file per configuration
    pub cache_dir: PathBuf,
    /// Save the table after this many new entries
    pub checkpoint_interval: usize,
    /// Worker pool size; 0 sizes the pool from the available threads
    pub worker_threads: usize,
    pub threads_per_cpu: usize,
    pub selection_policy: SelectionPolicy,
}

impl SolverConfig {
    /// Rejects configurations the engine cannot handle before any search starts
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.n_players) {
            return Err(SolverError::InvalidConfig(format!(
                "needs between {} and {} players, given {}",
                MIN_PLAYERS, MAX_PLAYERS, self.n_players
            )));
        }
        if self.win_length < MIN_WIN_LENGTH {
            return Err(SolverError::InvalidConfig(format!(
                "win_length must be at least {}, given {}",
                MIN_WIN_LENGTH, self.win_length
            )));
        }
        if self.board_size < self.win_length {
            return Err(SolverError::InvalidConfig(format!(
                "board size ({}) must be at least win_length ({})",
                self.board_size, self.win_length
            )));
        }
        if self.board_size > MAX_BOARD_SIZE {
            return Err(SolverError::InvalidConfig(format!(
                "board size ({}) must be at most {}",
                self.board_size, MAX_BOARD_SIZE
            )));
        }
        if self.checkpoint_interval == 0 {
            return Err(SolverError::InvalidConfig(
                "checkpoint_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of search workers for one episode
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            (rayon::current_num_threads() * self.threads_per_cpu.max(1)).max(1)
        }
    }

    /// Cache file of this configuration
    pub fn cache_file(&self) -> PathBuf {
        table::cache_path(&self.cache_dir, self.board_size, self.win_length, self.n_players)
    }
}

/// Polling constants for callers waiting on the service
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    pub polling_interval_ms: u64,
}

/// Decision log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Solver.toml configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| SolverError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| SolverError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Loads default configuration from Solver.toml in the project root
    pub fn load_default() -> Result<Self> {
        Self::from_file("Solver.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Solver.toml
    pub fn default_hardcoded() -> Self {
        Config {
            solver: SolverConfig {
                board_size: 3,
                win_length: 3,
                n_players: 2,
                cache_dir: PathBuf::from("data"),
                checkpoint_interval: table::DEFAULT_CHECKPOINT_INTERVAL,
                worker_threads: 0,
                threads_per_cpu: 2,
                selection_policy: SelectionPolicy::MinimizeOpponents,
            },
            timing: TimingConfig {
                polling_interval_ms: 50,
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "caro_decisions.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            log::warn!("Could not load Solver.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardcoded_defaults_are_valid() {
        let config = Config::default_hardcoded();
        assert!(config.solver.validate().is_ok());
        assert_eq!(config.solver.checkpoint_interval, 1000);
        assert_eq!(config.solver.cache_file(), PathBuf::from("data/03_03_02.bin"));
    }

    #[test]
    fn test_solver_toml_can_be_parsed() {
        let result = Config::from_file("Solver.toml");
        assert!(
            result.is_ok(),
            "Failed to parse Solver.toml: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_all_config_values_match_hardcoded_defaults() {
        let file_config = Config::from_file("Solver.toml").expect("Solver.toml should be parseable");
        let hardcoded_config = Config::default_hardcoded();

        assert_eq!(file_config.solver.board_size, hardcoded_config.solver.board_size);
        assert_eq!(file_config.solver.win_length, hardcoded_config.solver.win_length);
        assert_eq!(file_config.solver.n_players, hardcoded_config.solver.n_players);
        assert_eq!(file_config.solver.cache_dir, hardcoded_config.solver.cache_dir);
        assert_eq!(
            file_config.solver.checkpoint_interval,
            hardcoded_config.solver.checkpoint_interval
        );
        assert_eq!(
            file_config.solver.worker_threads,
            hardcoded_config.solver.worker_threads
        );
        assert_eq!(
            file_config.solver.threads_per_cpu,
            hardcoded_config.solver.threads_per_cpu
        );
        assert_eq!(
            file_config.solver.selection_policy,
            hardcoded_config.solver.selection_policy
        );
        assert_eq!(
            file_config.timing.polling_interval_ms,
            hardcoded_config.timing.polling_interval_ms
        );
        assert_eq!(file_config.debug.enabled, hardcoded_config.debug.enabled);
        assert_eq!(
            file_config.debug.log_file_path,
            hardcoded_config.debug.log_file_path
        );
    }

    #[test]
    fn test_invalid_configurations_are_rejected() {
        let base = Config::default_hardcoded().solver;

        let too_few = SolverConfig { n_players: 1, ..base.clone() };
        assert!(matches!(too_few.validate(), Err(SolverError::InvalidConfig(_))));

        let too_many = SolverConfig { n_players: 21, ..base.clone() };
        assert!(too_many.validate().is_err());

        let most = SolverConfig { n_players: MAX_PLAYERS, ..base.clone() };
        assert!(most.validate().is_ok());

        let short_win = SolverConfig { win_length: 1, ..base.clone() };
        assert!(short_win.validate().is_err());

        let small_board = SolverConfig { board_size: 3, win_length: 4, ..base.clone() };
        assert!(small_board.validate().is_err());

        let no_checkpoint = SolverConfig { checkpoint_interval: 0, ..base };
        assert!(no_checkpoint.validate().is_err());
    }

    #[test]
    fn test_selection_policy_parses_snake_case() {
        let toml_src = r#"
            board_size = 4
            win_length = 3
            n_players = 3
            cache_dir = "cache"
            checkpoint_interval = 500
            worker_threads = 2
            threads_per_cpu = 1
            selection_policy = "maximize_own"
        "#;
        let solver: SolverConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(solver.selection_policy, SelectionPolicy::MaximizeOwn);
        assert_eq!(solver.effective_worker_threads(), 2);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = Config::from_file("nonexistent.toml");
        assert!(matches!(result, Err(SolverError::Config(_))));
    }
}
