//! API server configuration

use std::net::SocketAddr;

use planwise_billing::{BillingConfig, BillingError};
use planwise_shared::env_string;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub billing: BillingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env_string("PLANWISE_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PLANWISE_BIND_ADDR"))?;

        Ok(Self {
            bind_addr,
            log_format: LogFormat::from_env(),
            billing: BillingConfig::from_env()?,
        })
    }
}

impl LogFormat {
    pub fn from_env() -> Self {
        match env_string("LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}
