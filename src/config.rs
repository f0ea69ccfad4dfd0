//! Configuration for the `simulate` command.
//!
//! Loaded from a YAML file, after which `.env` and process environment overrides apply:
//! `AGGREGATOR_LOG_LEVEL` and `AGGREGATOR_TIME_TO_EXPIRY_MS`.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};

use crate::crypto::KeyPair;
use crate::registry::TestOperator;
use crate::types::{BlockNumber, QuorumNum, Stake, TaskIndex, ThresholdPercentage, parse_u256};

pub const LOG_LEVEL_ENV: &str = "AGGREGATOR_LOG_LEVEL";
pub const TIME_TO_EXPIRY_ENV: &str = "AGGREGATOR_TIME_TO_EXPIRY_MS";

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_time_to_expiry_ms() -> u64 {
    10_000
}

const fn default_sign() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub block_number: BlockNumber,
    pub task: TaskConfig,
    pub operators: Vec<OperatorConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub task_index: TaskIndex,
    pub quorum_numbers: Vec<QuorumNum>,
    pub quorum_threshold_percentages: Vec<ThresholdPercentage>,
    #[serde(default = "default_time_to_expiry_ms")]
    pub time_to_expiry_ms: u64,
    /// Response the operators sign.
    pub response: String,
}

impl TaskConfig {
    pub const fn time_to_expiry(&self) -> Duration {
        Duration::from_millis(self.time_to_expiry_ms)
    }
}

/// Stakes may be written as plain integers or, for values beyond `u64`, as decimal or `0x` strings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StakeAmount {
    Number(u64),
    Text(String),
}

impl StakeAmount {
    pub fn to_stake(&self) -> Result<Stake> {
        match self {
            Self::Number(value) => Ok(Stake::from(*value)),
            Self::Text(text) => parse_u256(text).ok_or_else(|| anyhow!("invalid stake {text:?}")),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorConfig {
    pub bls_private_key: String,
    pub stake_per_quorum: BTreeMap<QuorumNum, StakeAmount>,
    /// Whether the operator submits a signature at all.
    #[serde(default = "default_sign")]
    pub sign: bool,
    /// Response to sign instead of the task's, to simulate disagreement.
    #[serde(default)]
    pub response: Option<String>,
}

impl Config {
    /// Reads the file at `path`, then applies `.env` and environment overrides.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, an override is malformed, or the
    /// configuration is inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenv().ok();
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::from_yaml(&raw)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses YAML without consulting the environment.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML or unknown fields.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("failed to parse config")
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Fails if the expiry override is not an integer.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
        if let Some(expiry) = lookup(TIME_TO_EXPIRY_ENV) {
            self.task.time_to_expiry_ms = expiry
                .trim()
                .parse()
                .with_context(|| format!("{TIME_TO_EXPIRY_ENV} must be milliseconds, got {expiry:?}"))?;
        }
        Ok(())
    }

    /// Checks what the engine would otherwise reject later, with config-level messages.
    ///
    /// # Errors
    ///
    /// Describes the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.operators.is_empty(), "no operators configured");
        ensure!(
            self.task.quorum_numbers.len() == self.task.quorum_threshold_percentages.len(),
            "task has {} quorum numbers but {} threshold percentages",
            self.task.quorum_numbers.len(),
            self.task.quorum_threshold_percentages.len()
        );
        for operator in &self.operators {
            for stake in operator.stake_per_quorum.values() {
                stake.to_stake()?;
            }
        }
        Ok(())
    }

    /// Operators with their keys parsed and ids derived from their G1 keys.
    ///
    /// # Errors
    ///
    /// Fails on an invalid private key or stake.
    pub fn test_operators(&self) -> Result<Vec<TestOperator>> {
        self.operators
            .iter()
            .enumerate()
            .map(|(index, operator)| -> Result<TestOperator> {
                let bls_key_pair = KeyPair::from_hex(&operator.bls_private_key)
                    .with_context(|| format!("operator {index} has an invalid key"))?;
                let stake_per_quorum = operator
                    .stake_per_quorum
                    .iter()
                    .map(|(quorum, stake)| -> Result<(QuorumNum, Stake)> {
                        Ok((*quorum, stake.to_stake()?))
                    })
                    .collect::<Result<_>>()?;
                Ok(TestOperator {
                    operator_id: bls_key_pair.operator_id(),
                    stake_per_quorum,
                    bls_key_pair,
                })
            })
            .collect()
    }
}
