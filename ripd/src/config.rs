//! The router's configuration file.
//!
//! ```toml
//! update_interval_ms = 5000
//! table_capacity = 100
//!
//! [[interface]]
//! address = "10.0.0.1"
//! prefix_len = 24
//! mac = "02:00:00:00:00:01"
//! bind = "127.0.0.1:40001"
//! peer = "127.0.0.1:40002"
//!
//! [[interface.neighbor]]
//! address = "10.0.0.2"
//! mac = "02:00:00:00:00:02"
//! ```

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use anyhow::Context;
use ripd_core::{
    hal::{Interface, Mac},
    ip_table::DEFAULT_CAPACITY,
    router::DEFAULT_UPDATE_INTERVAL,
};
use serde::{Deserialize, Deserializer};
use thiserror::Error as ThisError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Milliseconds between periodic advertisements
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// The most routes the table may hold
    #[serde(default = "default_table_capacity")]
    pub table_capacity: usize,
    /// One entry per interface, in slot order
    #[serde(rename = "interface", default)]
    pub interfaces: Vec<InterfaceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceConfig {
    pub address: Ipv4Addr,
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u32,
    #[serde(deserialize_with = "deserialize_mac")]
    pub mac: Mac,
    /// The local end of the UDP socket standing in for the cable
    pub bind: SocketAddr,
    /// The far end of the cable
    pub peer: SocketAddr,
    /// Link addresses of the machines on this interface's network
    #[serde(rename = "neighbor", default)]
    pub neighbors: Vec<NeighborConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeighborConfig {
    pub address: Ipv4Addr,
    #[serde(deserialize_with = "deserialize_mac")]
    pub mac: Mac,
}

fn default_update_interval_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL.as_millis() as u64
}

fn default_table_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_prefix_len() -> u32 {
    24
}

impl Config {
    /// Reads and checks the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interfaces.is_empty() {
            Err(ConfigError::NoInterfaces)?
        }
        if self.update_interval_ms == 0 {
            Err(ConfigError::ZeroUpdateInterval)?
        }
        if self.table_capacity < self.interfaces.len() {
            Err(ConfigError::CapacityTooSmall {
                capacity: self.table_capacity,
                interfaces: self.interfaces.len(),
            })?
        }
        for (slot, interface) in self.interfaces.iter().enumerate() {
            if interface.prefix_len > 32 {
                Err(ConfigError::PrefixTooLong {
                    slot,
                    prefix_len: interface.prefix_len,
                })?
            }
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl InterfaceConfig {
    pub fn interface(&self) -> Interface {
        Interface::new(self.address.into(), self.prefix_len)
    }
}

/// Parses a link address written as six colon-separated hex octets.
pub fn parse_mac(text: &str) -> Result<Mac, ConfigError> {
    let invalid = || ConfigError::InvalidMac(text.to_string());
    let octets = text
        .split(':')
        .map(|octet| match octet.len() {
            1 | 2 => u8::from_str_radix(octet, 16).map_err(|_| invalid()),
            _ => Err(invalid()),
        })
        .collect::<Result<Vec<u8>, _>>()?;
    if octets.len() != 6 {
        Err(invalid())?
    }
    Ok(octets
        .into_iter()
        .fold(0, |mac, octet| (mac << 8) | octet as Mac))
}

fn deserialize_mac<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Mac, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_mac(&text).map_err(serde::de::Error::custom)
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one interface must be configured")]
    NoInterfaces,
    #[error("The update interval must be longer than zero")]
    ZeroUpdateInterval,
    #[error("A table of {capacity} routes cannot hold the direct routes of {interfaces} interfaces")]
    CapacityTooSmall { capacity: usize, interfaces: usize },
    #[error("Interface {slot} has a prefix length of {prefix_len}")]
    PrefixTooLong { slot: usize, prefix_len: u32 },
    #[error("'{0}' is not a link address like 02:00:00:00:00:01")]
    InvalidMac(String),
}
