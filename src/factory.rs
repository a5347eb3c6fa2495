//! Instance factory
//!
//! Picks the backend variant for a miner by its declared name. Input
//! validation is left to `MiningInstance::new`.

use crate::backend::MinerKind;
use crate::instance::{MiningInstance, DEFAULT_WATCH_INTERVAL};
use crate::sink::{LogSink, TracingSink};
use crate::{HardwareUnit, MinerDescriptor, PoolEndpoint, Result};
use std::sync::Arc;
use std::time::Duration;

/// Factory for supervised miner instances
#[derive(Clone)]
pub struct InstanceFactory {
    sink: Arc<dyn LogSink>,
    watch_interval: Duration,
}

impl Default for InstanceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceFactory {
    /// Factory logging through `tracing` with the default watch interval
    pub fn new() -> Self {
        Self {
            sink: Arc::new(TracingSink),
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }

    /// Sink handed to every created instance
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Watch interval handed to every created instance
    pub fn with_watch_interval(mut self, watch_interval: Duration) -> Self {
        self.watch_interval = watch_interval;
        self
    }

    /// Create an instance for the miner named by `descriptor`
    ///
    /// Fails with `UnsupportedMiner` if no backend matches the name.
    pub fn create(
        &self,
        descriptor: Arc<MinerDescriptor>,
        hardware: Vec<HardwareUnit>,
        algorithm: &str,
        reward_coin: &str,
        reward_address: &str,
        endpoint: PoolEndpoint,
    ) -> Result<MiningInstance> {
        let kind: MinerKind = descriptor.name.parse()?;

        Ok(MiningInstance::new(
            kind.backend(),
            descriptor,
            hardware,
            algorithm,
            reward_coin,
            reward_address,
            endpoint,
        )?
        .with_sink(Arc::clone(&self.sink))
        .with_watch_interval(self.watch_interval))
    }
}
