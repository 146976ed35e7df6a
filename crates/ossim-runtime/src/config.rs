//! Runtime configuration

use std::time::Duration;

use ossim_core::MemoryConfig;
use serde::{Deserialize, Serialize};

/// Default wall-clock length of one automatic tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Settings the runtime needs before the first command arrives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Wall-clock time between automatic ticks
    pub tick_interval: Duration,
    /// Entropy seed; `None` draws one at startup
    pub seed: Option<u64>,
    /// Memory manager settings
    pub memory: MemoryConfig,
    /// Memory size to initialize at startup, if any
    pub initial_memory: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            seed: None,
            memory: MemoryConfig::default(),
            initial_memory: None,
        }
    }
}

impl RuntimeConfig {
    /// The configured seed, or a fresh random one.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}
