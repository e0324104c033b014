//! Bundler configuration loading from environment variables.
//!
//! Numeric values fall back to defaults when missing or invalid and are
//! floored to a usable minimum. Addresses are read from the environment
//! first and from the deployment file otherwise.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `BUNDLER_RPC_URL` | `http://localhost:8545` | JSON-RPC endpoint of the node |
//! | `BUNDLER_LISTEN_ADDR` | `0.0.0.0:3000` | Ingress listen address |
//! | `BUNDLER_DEPLOY_FILE` | `deploy.json` | Deployment file (`entryPoint`, `counter`) |
//! | `BUNDLER_ENTRY_POINT` | from deploy file | EntryPoint address |
//! | `BUNDLER_TARGET` | from deploy file | Inner target named in traces (optional) |
//! | `BUNDLER_OPERATOR` | required | Account that sends batches and collects residual value |
//! | `BUNDLER_INTERVAL_MS` | 3000 | Cycle tick interval (floor 50) |
//! | `BUNDLER_GAS_LIMIT` | 3000000 | Gas ceiling per batch (floor 21000) |
//! | `BUNDLER_RECEIPT_POLL_MS` | 500 | Receipt poll interval (floor 10) |
//! | `BUNDLER_FAILURE_LOG` | `bundler-failures.log` | Append-only failure log |
//! | `BUNDLER_CORRELATION` | `by-sender` | `by-sender`, `submission-order` or `arrival-order` |
//! | `BUNDLER_LOG_LEVEL` | `info` | `EnvFilter` directive |
//! | `BUNDLER_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `BUNDLER_LOG_FILE` | unset (stderr) | Append log output to this file |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::RpcClientConfig;
use crate::outcome::CorrelationStrategy;
use crate::scheduler::{EngineConfig, DEFAULT_GAS_LIMIT};
use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DEPLOY_FILE: &str = "deploy.json";
const DEFAULT_FAILURE_LOG: &str = "bundler-failures.log";
const DEFAULT_INTERVAL_MS: u64 = 3000;
const MIN_INTERVAL_MS: u64 = 50;
const MIN_GAS_LIMIT: u64 = 21_000;
const DEFAULT_RECEIPT_POLL_MS: u64 = 500;
const MIN_RECEIPT_POLL_MS: u64 = 10;

/// Errors that prevent the bundler from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid address: {value}")]
    InvalidAddress { key: &'static str, value: String },
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("no entry point: set BUNDLER_ENTRY_POINT or `entryPoint` in {}", path.display())]
    MissingEntryPoint { path: PathBuf },
    #[error("failed to read deployment file {}: {source}", path.display())]
    DeployRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid deployment file {}: {source}", path.display())]
    DeployParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Addresses written by the contract deployment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployInfo {
    pub entry_point: Option<Address>,
    pub counter: Option<Address>,
}

impl DeployInfo {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::DeployRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::DeployParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// All bundler configuration.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub rpc_url: String,
    pub listen_addr: SocketAddr,
    pub deploy_file: PathBuf,
    pub entry_point: Address,
    pub target: Option<Address>,
    pub operator: Address,
    pub interval: Duration,
    pub gas_limit: u64,
    pub receipt_poll_interval: Duration,
    pub failure_log: PathBuf,
    pub correlation: CorrelationStrategy,
    pub log: LogConfig,
}

/// Effective configuration summary, printed by `config show`.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub rpc_url: String,
    pub listen_addr: String,
    pub deploy_file: String,
    pub entry_point: String,
    pub target: Option<String>,
    pub operator: String,
    pub interval_ms: u64,
    pub gas_limit: u64,
    pub receipt_poll_ms: u64,
    pub failure_log: String,
    pub correlation: String,
    pub log_level: String,
    pub log_format: String,
    pub log_file: Option<String>,
}

fn parse_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an optional address env var. Present but malformed is an error.
fn parse_address(key: &'static str) -> Result<Option<Address>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse::<Address>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidAddress { key, value: val }),
        _ => Ok(None),
    }
}

fn load_listen_addr() -> SocketAddr {
    let fallback = SocketAddr::from(([0, 0, 0, 0], 3000));
    parse_string("BUNDLER_LISTEN_ADDR", DEFAULT_LISTEN_ADDR)
        .parse()
        .unwrap_or(fallback)
}

fn load_log_config() -> LogConfig {
    let format = parse_string("BUNDLER_LOG_FORMAT", "json")
        .parse::<LogFormat>()
        .unwrap_or_default();
    LogConfig {
        format,
        level: parse_string("BUNDLER_LOG_LEVEL", "info"),
        output_path: std::env::var("BUNDLER_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| PathBuf::from(v.trim())),
    }
}

/// Load all configuration from environment variables.
pub fn load() -> Result<EnvConfig, ConfigError> {
    let deploy_file = PathBuf::from(parse_string("BUNDLER_DEPLOY_FILE", DEFAULT_DEPLOY_FILE));
    let entry_env = parse_address("BUNDLER_ENTRY_POINT")?;
    let target_env = parse_address("BUNDLER_TARGET")?;
    let operator = parse_address("BUNDLER_OPERATOR")?.ok_or(ConfigError::Missing("BUNDLER_OPERATOR"))?;

    // The deployment file is only mandatory when it is the entry point's source.
    let deploy = match entry_env {
        Some(_) => DeployInfo::read(&deploy_file).ok(),
        None => Some(DeployInfo::read(&deploy_file)?),
    };
    let entry_point = entry_env
        .or_else(|| deploy.as_ref().and_then(|d| d.entry_point))
        .ok_or_else(|| ConfigError::MissingEntryPoint { path: deploy_file.clone() })?;
    let target = target_env.or_else(|| deploy.as_ref().and_then(|d| d.counter));

    let interval_ms = parse_u64("BUNDLER_INTERVAL_MS", DEFAULT_INTERVAL_MS).max(MIN_INTERVAL_MS);
    let gas_limit = parse_u64("BUNDLER_GAS_LIMIT", DEFAULT_GAS_LIMIT).max(MIN_GAS_LIMIT);
    let poll_ms =
        parse_u64("BUNDLER_RECEIPT_POLL_MS", DEFAULT_RECEIPT_POLL_MS).max(MIN_RECEIPT_POLL_MS);
    let correlation = parse_string("BUNDLER_CORRELATION", "by-sender")
        .parse::<CorrelationStrategy>()
        .unwrap_or_default();

    Ok(EnvConfig {
        rpc_url: parse_string("BUNDLER_RPC_URL", DEFAULT_RPC_URL),
        listen_addr: load_listen_addr(),
        deploy_file,
        entry_point,
        target,
        operator,
        interval: Duration::from_millis(interval_ms),
        gas_limit,
        receipt_poll_interval: Duration::from_millis(poll_ms),
        failure_log: PathBuf::from(parse_string("BUNDLER_FAILURE_LOG", DEFAULT_FAILURE_LOG)),
        correlation,
        log: load_log_config(),
    })
}

impl EnvConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            entry_point: self.entry_point,
            target: self.target,
            gas_limit: self.gas_limit,
            correlation: self.correlation,
        }
    }

    pub fn rpc_config(&self) -> RpcClientConfig {
        RpcClientConfig {
            url: self.rpc_url.clone(),
            operator: self.operator,
            receipt_poll_interval: self.receipt_poll_interval,
        }
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            rpc_url: self.rpc_url.clone(),
            listen_addr: self.listen_addr.to_string(),
            deploy_file: self.deploy_file.display().to_string(),
            entry_point: self.entry_point.to_string(),
            target: self.target.map(|t| t.to_string()),
            operator: self.operator.to_string(),
            interval_ms: self.interval.as_millis() as u64,
            gas_limit: self.gas_limit,
            receipt_poll_ms: self.receipt_poll_interval.as_millis() as u64,
            failure_log: self.failure_log.display().to_string(),
            correlation: self.correlation.to_string(),
            log_level: self.log.level.clone(),
            log_format: self.log.format.to_string(),
            log_file: self.log.output_path.as_ref().map(|p| p.display().to_string()),
        }
    }
}
