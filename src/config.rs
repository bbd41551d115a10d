//! Configuration for the sampler priors and the training loop.
//!
//! Two on-disk formats are understood: TOML (any `.toml` file) and the
//! legacy flat `key:value` format used by existing experiment setups.

use crate::defaults;
use crate::error::{DpsegError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "dpseg.toml";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub prior: PriorConfig,
    pub training: TrainingConfig,
}

/// Hyperparameters of the DP-HMM model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PriorConfig {
    /// Feature vector dimension.
    pub dim: usize,
    /// Emitting states per cluster HMM.
    pub state_num: usize,
    /// Dirichlet-process concentration.
    pub dp_alpha: f64,
    pub beta_alpha: f64,
    pub beta_beta: f64,
    /// Shape of the Gamma prior on emission precisions.
    pub gamma_shape: f64,
    /// Rate of the Gamma prior on emission precisions.
    pub gamma_rate: f64,
    /// Pseudo-count of the Normal prior on emission means.
    pub norm_kappa: f64,
    /// Prior mean of the emission means.
    pub norm_mu0: f64,
    pub gamma_weight_alpha: f64,
    /// Gamma pseudo-count per reachable transition.
    pub gamma_trans_alpha: f64,
    /// Prior probability that a site is not a boundary.
    pub h0: f64,
    /// Allow state skipping; otherwise states only loop or advance by one.
    pub skip: bool,
}

/// Outer-loop settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub iterations: usize,
    /// Input files per batch group.
    pub group_size: usize,
    /// Sweeps between label and snapshot dumps.
    pub snapshot_interval: usize,
    /// Sweeps between pruning passes.
    pub prune_interval: usize,
    pub prune_min_age: u64,
    pub prune_max_members: usize,
    /// Input files between cluster refreshes while loading.
    pub load_refresh_interval: usize,
    /// Precompute per-frame emission scores over the active group.
    pub precompute: bool,
    /// RNG seed; drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            dim: defaults::DIM,
            state_num: defaults::STATE_NUM,
            dp_alpha: defaults::DP_ALPHA,
            beta_alpha: defaults::BETA_ALPHA,
            beta_beta: defaults::BETA_BETA,
            gamma_shape: defaults::GAMMA_SHAPE,
            gamma_rate: defaults::GAMMA_RATE,
            norm_kappa: defaults::NORM_KAPPA,
            norm_mu0: defaults::NORM_MU0,
            gamma_weight_alpha: defaults::GAMMA_WEIGHT_ALPHA,
            gamma_trans_alpha: defaults::GAMMA_TRANS_ALPHA,
            h0: defaults::H0,
            skip: defaults::SKIP,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: defaults::ITERATIONS,
            group_size: defaults::GROUP_SIZE,
            snapshot_interval: defaults::SNAPSHOT_INTERVAL,
            prune_interval: defaults::PRUNE_INTERVAL,
            prune_min_age: defaults::PRUNE_MIN_AGE,
            prune_max_members: defaults::PRUNE_MAX_MEMBERS,
            load_refresh_interval: defaults::LOAD_REFRESH_INTERVAL,
            precompute: true,
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// `.toml` files are parsed as TOML with missing fields defaulted; any
    /// other file is read as the legacy flat `key:value` format.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DpsegError::ConfigFileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = fs::read_to_string(path)?;
        let config = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&contents)?
        } else {
            Self::from_legacy_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if it doesn't exist.
    ///
    /// Errors other than a missing file are still returned.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(DpsegError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Parse the legacy `key:value` format.
    ///
    /// Entries are whitespace separated. Unknown keys are reported and skipped.
    pub fn from_legacy_str(contents: &str) -> Result<Self> {
        let mut config = Self::default();
        for entry in contents.split_whitespace() {
            let Some((key, value)) = entry.split_once(':') else {
                return Err(DpsegError::ConfigParse {
                    message: format!("expected key:value, got '{}'", entry),
                });
            };
            let prior = &mut config.prior;
            match key {
                "s_dim" => prior.dim = parse_value(key, value)?,
                "s_state" => prior.state_num = parse_value(key, value)?,
                "s_dp_alpha" => prior.dp_alpha = parse_value(key, value)?,
                "s_beta_alpha" => prior.beta_alpha = parse_value(key, value)?,
                "s_beta_beta" => prior.beta_beta = parse_value(key, value)?,
                "s_gamma_shape" => prior.gamma_shape = parse_value(key, value)?,
                "s_norm_kappa" => prior.norm_kappa = parse_value(key, value)?,
                "s_gamma_weight_alpha" => prior.gamma_weight_alpha = parse_value(key, value)?,
                "s_gamma_trans_alpha" => prior.gamma_trans_alpha = parse_value(key, value)?,
                "s_h0" => prior.h0 = parse_value(key, value)?,
                _ => log::warn!("Unrecognized config parameter: {}", key),
            }
        }
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DPSEG_SEED → training.seed
    /// - DPSEG_ITERATIONS → training.iterations
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(seed) = std::env::var("DPSEG_SEED")
            && !seed.is_empty()
        {
            match seed.parse() {
                Ok(seed) => self.training.seed = Some(seed),
                Err(_) => log::warn!("Ignoring DPSEG_SEED={}: not an integer", seed),
            }
        }

        if let Ok(iterations) = std::env::var("DPSEG_ITERATIONS")
            && !iterations.is_empty()
        {
            match iterations.parse() {
                Ok(n) => self.training.iterations = n,
                Err(_) => log::warn!("Ignoring DPSEG_ITERATIONS={}: not an integer", iterations),
            }
        }

        self
    }

    /// Check value ranges the sampler relies on.
    pub fn validate(&self) -> Result<()> {
        let p = &self.prior;
        let t = &self.training;
        require(p.dim > 0, "dim", "must be positive")?;
        require(p.state_num > 0, "state_num", "must be positive")?;
        require(p.dp_alpha > 0.0, "dp_alpha", "must be positive")?;
        require(p.gamma_shape > 0.0, "gamma_shape", "must be positive")?;
        require(p.gamma_rate > 0.0, "gamma_rate", "must be positive")?;
        require(p.norm_kappa > 0.0, "norm_kappa", "must be positive")?;
        require(p.gamma_trans_alpha > 0.0, "gamma_trans_alpha", "must be positive")?;
        require((0.0..=1.0).contains(&p.h0), "h0", "must lie in [0, 1]")?;
        require(t.group_size > 0, "group_size", "must be positive")?;
        require(t.snapshot_interval > 0, "snapshot_interval", "must be positive")?;
        require(t.prune_interval > 0, "prune_interval", "must be positive")?;
        require(
            t.load_refresh_interval > 0,
            "load_refresh_interval",
            "must be positive",
        )?;
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DpsegError::Other(e.to_string()))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| DpsegError::ConfigInvalidValue {
        key: key.to_string(),
        message: format!("cannot parse '{}'", value),
    })
}

fn require(condition: bool, key: &str, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(DpsegError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        })
    }
}
