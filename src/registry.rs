//! Descriptor registry
//!
//! Resolves a miner name to its descriptor. Names are matched
//! case-insensitively.

use crate::{Error, MinerDescriptor, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Known miners keyed by lowercase name
#[derive(Debug, Clone, Default)]
pub struct MinerRegistry {
    miners: HashMap<String, Arc<MinerDescriptor>>,
}

impl MinerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one with the same name
    pub fn register(&mut self, descriptor: MinerDescriptor) -> Option<Arc<MinerDescriptor>> {
        self.miners
            .insert(descriptor.name.to_ascii_lowercase(), Arc::new(descriptor))
    }

    /// Look up a miner by name
    pub fn get(&self, name: &str) -> Result<Arc<MinerDescriptor>> {
        self.miners
            .get(&name.trim().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::config(format!("Miner {} is not registered", name)))
    }

    /// Whether a miner with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.miners.contains_key(&name.trim().to_ascii_lowercase())
    }

    /// Number of registered miners
    pub fn len(&self) -> usize {
        self.miners.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.miners.is_empty()
    }
}

impl FromIterator<MinerDescriptor> for MinerRegistry {
    fn from_iter<I: IntoIterator<Item = MinerDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        for descriptor in iter {
            registry.register(descriptor);
        }
        registry
    }
}
