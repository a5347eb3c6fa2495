//! Core types for miner supervision
//!
//! Descriptors, hardware units and the reward/pool values that feed command
//! construction. All of them are immutable once built.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identity of a miner kind, resolved before any instance exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerDescriptor {
    /// Miner name, used by the factory to pick a backend variant
    pub name: String,
    /// Path to the miner executable
    pub executable: PathBuf,
    /// Algorithm identifiers this miner accepts
    #[serde(default)]
    pub supported_algorithms: BTreeSet<String>,
}

impl MinerDescriptor {
    /// Create a new descriptor
    pub fn new<I, S>(name: impl Into<String>, executable: impl Into<PathBuf>, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            executable: executable.into(),
            supported_algorithms: algorithms.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the miner declares the algorithm
    pub fn supports(&self, algorithm: &str) -> bool {
        self.supported_algorithms.contains(algorithm)
    }
}

/// Compute API family of a hardware unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareKind {
    /// NVIDIA GPU driven through CUDA
    Cuda,
    /// GPU driven through OpenCL
    OpenCl,
    /// Anything else (CPU threads)
    Cpu,
}

impl fmt::Display for HardwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareKind::Cuda => write!(f, "cuda"),
            HardwareKind::OpenCl => write!(f, "opencl"),
            HardwareKind::Cpu => write!(f, "cpu"),
        }
    }
}

/// One compute device as reported by hardware enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareUnit {
    /// Device index within its platform
    pub index: u32,
    /// Platform index, only meaningful for OpenCL
    #[serde(default)]
    pub platform: u32,
    /// Compute API family
    pub kind: HardwareKind,
}

impl HardwareUnit {
    /// Create a new hardware unit
    pub fn new(index: u32, platform: u32, kind: HardwareKind) -> Self {
        Self {
            index,
            platform,
            kind,
        }
    }

    /// CUDA device with the given index
    pub fn cuda(index: u32) -> Self {
        Self::new(index, 0, HardwareKind::Cuda)
    }

    /// OpenCL device on the given platform
    pub fn opencl(platform: u32, index: u32) -> Self {
        Self::new(index, platform, HardwareKind::OpenCl)
    }
}

/// Where mining rewards are paid
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RewardTarget {
    /// Reward coin ticker
    pub coin: String,
    /// Payout address for the coin
    pub address: String,
}

impl RewardTarget {
    /// Create a new reward target
    pub fn new(coin: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for RewardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.coin, self.address)
    }
}

/// Pool address the miner connects to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolEndpoint {
    /// Pool host name or address
    pub host: String,
    /// Pool port
    pub port: u16,
}

impl PoolEndpoint {
    /// Create a new pool endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Stratum-over-TCP URL for this endpoint
    pub fn stratum_url(&self) -> String {
        format!("stratum+tcp://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PoolEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PoolEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::config(format!("Pool endpoint must be host:port, got {}", s)))?;
        if host.trim().is_empty() {
            return Err(Error::config("Pool endpoint host is empty"));
        }
        let port: u16 = port
            .parse()
            .map_err(|e| Error::config(format!("Invalid pool port {}: {}", port, e)))?;
        Ok(Self::new(host, port))
    }
}
