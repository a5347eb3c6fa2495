//! Backend variants for the supported miner kinds
//!
//! A backend contributes the two pieces that differ between miners: how the
//! command line is built and how raw output lines are classified. Process
//! supervision is shared and lives in `crate::instance`.

use crate::{Error, HardwareUnit, PoolEndpoint, Result, RewardTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod trex;
pub mod xmrig;

pub use trex::TRexBackend;
pub use xmrig::XmrigBackend;

/// Inputs to command construction
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Ordered hardware selection
    pub hardware: &'a [HardwareUnit],
    /// Algorithm identifier as the miner spells it
    pub algorithm: &'a str,
    /// Reward coin and address
    pub reward: &'a RewardTarget,
    /// Pool endpoint
    pub endpoint: &'a PoolEndpoint,
}

/// How a forwarded line was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Message extracted from a tagged line
    Tagged,
    /// Line forwarded as the miner printed it
    Raw,
}

/// One classified line of miner output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// How the message was obtained
    pub kind: LineKind,
    /// Text forwarded to the log sink
    pub message: String,
}

impl LogLine {
    /// Message extracted from a tagged line
    pub fn tagged(message: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Tagged,
            message: message.into(),
        }
    }

    /// Line forwarded verbatim
    pub fn raw(message: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Raw,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Per-miner command construction and output classification
///
/// Implementations must be pure: the same invocation always yields the same
/// argument string.
pub trait MinerBackend: Send + Sync {
    /// Which miner this backend drives
    fn kind(&self) -> MinerKind;

    /// Build the argument string passed to the miner executable
    fn build_invocation(&self, invocation: &Invocation<'_>) -> String;

    /// Classify one raw output line
    fn classify_line(&self, line: &str) -> LogLine {
        LogLine::raw(line)
    }
}

/// Miner kinds with a backend implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MinerKind {
    /// XMRig (CPU, CUDA and OpenCL)
    Xmrig,
    /// T-Rex (NVIDIA only)
    TRex,
}

impl MinerKind {
    /// All kinds with a backend
    pub const ALL: [MinerKind; 2] = [MinerKind::Xmrig, MinerKind::TRex];

    /// Create the backend for this kind
    pub fn backend(self) -> Arc<dyn MinerBackend> {
        match self {
            MinerKind::Xmrig => Arc::new(XmrigBackend),
            MinerKind::TRex => Arc::new(TRexBackend),
        }
    }
}

impl fmt::Display for MinerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerKind::Xmrig => write!(f, "xmrig"),
            MinerKind::TRex => write!(f, "t-rex"),
        }
    }
}

impl FromStr for MinerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xmrig" => Ok(MinerKind::Xmrig),
            "t-rex" | "trex" => Ok(MinerKind::TRex),
            _ => Err(Error::unsupported_miner(s)),
        }
    }
}

/// Pool connection and payout arguments shared by both miners
pub(crate) fn pool_args(invocation: &Invocation<'_>) -> Vec<String> {
    vec![
        "-a".to_string(),
        invocation.algorithm.to_string(),
        "-o".to_string(),
        invocation.endpoint.stratum_url(),
        "-u".to_string(),
        invocation.reward.to_string(),
        "-p".to_string(),
        "x".to_string(),
    ]
}

/// Comma separated device indices, in hardware order
pub(crate) fn device_list<'a>(units: impl IntoIterator<Item = &'a HardwareUnit>) -> String {
    units
        .into_iter()
        .map(|unit| unit.index.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
