// ⚙️ Configuration - data path and bind address, read once at startup

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "data/housing_in_london_monthly_variables.csv";
pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";

pub const DATA_ENV: &str = "HOUSING_DATA";
pub const ADDR_ENV: &str = "HOUSING_ADDR";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Defaults, overridden by `HOUSING_DATA` / `HOUSING_ADDR` when set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_path = lookup(DATA_ENV).unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());
        let addr = lookup(ADDR_ENV).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .with_context(|| format!("Invalid {} {:?}", ADDR_ENV, addr))?;

        Ok(Config {
            data_path: PathBuf::from(data_path),
            bind_addr,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(|key| match key {
            DATA_ENV => Some("/tmp/housing.csv".to_string()),
            ADDR_ENV => Some("0.0.0.0:8080".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.data_path, PathBuf::from("/tmp/housing.csv"));
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_bad_addr() {
        let result = Config::from_lookup(|key| (key == ADDR_ENV).then(|| "nope".to_string()));
        assert!(result.is_err());
    }
}
