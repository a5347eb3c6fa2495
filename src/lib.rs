//! Mining Supervisor
//!
//! Runs external miner executables and supervises them:
//! - Builds the miner command line from algorithm, reward target, pool and hardware
//! - Forwards the miner's output as classified log lines
//! - Stops the miner when the caller's token or the instance itself cancels
//! - XMRig and T-Rex backends behind one supervision lifecycle

pub mod backend;
pub mod config;
pub mod error;
pub mod factory;
pub mod instance;
pub mod logging;
pub mod process;
pub mod registry;
pub mod sink;
pub mod types;

pub use backend::{LineKind, LogLine, MinerBackend, MinerKind};
pub use config::Config;
pub use error::{Error, Result};
pub use factory::InstanceFactory;
pub use instance::{InstanceState, MiningInstance, MiningTask};
pub use registry::MinerRegistry;
pub use sink::{ChannelSink, LogSink, SinkEvent, TracingSink};
pub use types::*;

/// Application information
pub const APP_NAME: &str = "mining-supervisor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
