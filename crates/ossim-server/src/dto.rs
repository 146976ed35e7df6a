//! Request and response bodies
//!
//! Algorithm names arrive as strings and are parsed here, so an unknown
//! identifier becomes a plain-text InvalidConfiguration error instead of a
//! JSON extractor rejection.

use ossim_core::{
    InterruptionKind, MemoryAlgorithm, PriorityOrder, SchedulerConfig, SchedulingAlgorithm,
    SimError, SimResult, SimulationMode,
};
use serde::{Deserialize, Serialize};

/// `POST /simulation/start` and `PUT /simulation/algorithm`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerRequest {
    pub algorithm: Option<String>,
    pub quantum: Option<u32>,
    pub preemptive: Option<bool>,
    pub priority_order: Option<PriorityOrder>,
}

impl SchedulerRequest {
    /// Build a configuration, keeping `current` for omitted optional fields.
    pub fn into_config(self, current: &SchedulerConfig) -> SimResult<SchedulerConfig> {
        let name = self
            .algorithm
            .ok_or_else(|| SimError::Validation("algorithm is required".into()))?;
        let config = SchedulerConfig {
            algorithm: SchedulingAlgorithm::parse(&name)?,
            quantum: self.quantum.unwrap_or(current.quantum),
            preemptive: self.preemptive.unwrap_or(current.preemptive),
            priority_order: self.priority_order.unwrap_or(current.priority_order),
        };
        config.validate()?;
        Ok(config)
    }
}

/// `POST /interruptions`.
#[derive(Clone, Debug, Deserialize)]
pub struct InterruptionRequest {
    pub pid: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

impl InterruptionRequest {
    /// Parsed interruption kind.
    pub fn kind(&self) -> SimResult<InterruptionKind> {
        InterruptionKind::parse(&self.kind)
    }
}

/// `POST /memory/initialize`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeMemoryRequest {
    pub total_size: u64,
}

/// `POST /memory/allocate`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateRequest {
    pub process_id: u64,
    pub size: u64,
    pub algorithm: Option<String>,
}

/// `PUT /memory/algorithm`.
#[derive(Clone, Debug, Deserialize)]
pub struct MemoryAlgorithmRequest {
    pub algorithm: String,
}

/// Parse an optional memory algorithm name.
pub fn memory_algorithm(name: Option<&str>) -> SimResult<Option<MemoryAlgorithm>> {
    name.map(MemoryAlgorithm::parse).transpose()
}

/// `POST /simulation/mode` body and `GET /simulation/mode` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModeBody {
    pub automatic: bool,
}

impl From<SimulationMode> for ModeBody {
    fn from(mode: SimulationMode) -> Self {
        Self {
            automatic: mode.is_automatic(),
        }
    }
}

/// `?since=` on the timeline.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TimelineQuery {
    pub since: Option<u64>,
}

/// `?pending=` on the memory state.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MemoryQuery {
    pub pending: Option<u64>,
}
