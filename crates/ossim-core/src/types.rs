//! Core simulation types
//!
//! Pure data shared by every component: identifiers, lifecycle states,
//! algorithm selectors and the settings structs the controller owns.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Process identifier, assigned sequentially from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u64);

impl core::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Logical simulation time.
pub type Tick = u64;

/// Process lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Created, arrival tick not yet reached
    New,
    /// Eligible for the CPU
    Ready,
    /// Holding the CPU
    Running,
    /// Blocked on an I/O burst
    Waiting,
    /// Finished or killed
    Terminated,
}

impl ProcessState {
    /// Whether the lifecycle automaton has an edge `self -> to`.
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, to),
            (New, Ready)
                | (Ready, Running)
                | (Running, Ready)
                | (Running, Waiting)
                | (Running, Terminated)
                | (Waiting, Ready)
        )
    }
}

/// Controller status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    /// No run loaded
    Idle,
    /// Ticks advance
    Running,
    /// Run loaded, ticks held
    Paused,
    /// Every process terminated; the run is over but still inspectable
    Completed,
}

/// How ticks advance while Running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationMode {
    /// The runtime ticks on a fixed interval
    #[default]
    Automatic,
    /// Ticks advance only on an explicit step
    Manual,
}

impl SimulationMode {
    /// Map the wire `{ automatic: bool }` flag.
    pub fn from_automatic(automatic: bool) -> Self {
        if automatic {
            SimulationMode::Automatic
        } else {
            SimulationMode::Manual
        }
    }

    /// True for [`SimulationMode::Automatic`].
    pub fn is_automatic(self) -> bool {
        self == SimulationMode::Automatic
    }
}

/// CPU scheduling algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingAlgorithm {
    /// First come, first served
    Fcfs,
    /// Shortest job first (shortest remaining time when preemptive)
    Sjf,
    /// Fixed-quantum rotation
    RoundRobin,
    /// Most urgent priority first
    Priority,
}

impl SchedulingAlgorithm {
    /// Parse a wire identifier. Unknown names are a configuration error.
    pub fn parse(name: &str) -> SimResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "FCFS" => Ok(Self::Fcfs),
            "SJF" => Ok(Self::Sjf),
            "ROUND_ROBIN" | "RR" => Ok(Self::RoundRobin),
            "PRIORITY" => Ok(Self::Priority),
            _ => Err(SimError::InvalidConfiguration(format!(
                "unknown scheduling algorithm '{name}'"
            ))),
        }
    }

    /// Wire identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fcfs => "FCFS",
            Self::Sjf => "SJF",
            Self::RoundRobin => "ROUND_ROBIN",
            Self::Priority => "PRIORITY",
        }
    }
}

/// Which end of the priority scale is more urgent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityOrder {
    /// 0 is the most urgent
    #[default]
    LowerFirst,
    /// Larger numbers are more urgent
    HigherFirst,
}

impl PriorityOrder {
    /// True when priority `a` is strictly more urgent than `b`.
    pub fn more_urgent(self, a: u32, b: u32) -> bool {
        match self {
            PriorityOrder::LowerFirst => a < b,
            PriorityOrder::HigherFirst => a > b,
        }
    }
}

/// Default Round Robin quantum, in ticks.
pub const DEFAULT_QUANTUM: u32 = 2;

/// CPU scheduling configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Selected algorithm
    pub algorithm: SchedulingAlgorithm,
    /// Round Robin time slice
    pub quantum: u32,
    /// SJF becomes SRT and Priority preempts on strictly more urgent arrivals
    pub preemptive: bool,
    /// Priority urgency convention
    pub priority_order: PriorityOrder,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: SchedulingAlgorithm::Fcfs,
            quantum: DEFAULT_QUANTUM,
            preemptive: false,
            priority_order: PriorityOrder::default(),
        }
    }
}

impl SchedulerConfig {
    /// Reject configurations the scheduler cannot run.
    pub fn validate(&self) -> SimResult<()> {
        if self.quantum == 0 {
            return Err(SimError::InvalidConfiguration(
                "quantum must be at least 1 tick".into(),
            ));
        }
        Ok(())
    }
}

/// Memory placement algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryAlgorithm {
    /// Lowest-offset free block that fits
    #[default]
    FirstFit,
    /// Smallest free block that fits
    BestFit,
    /// Largest free block
    WorstFit,
    /// Lowest-offset fit, recorded in the segment table
    Segmentation,
}

impl MemoryAlgorithm {
    /// Parse a wire identifier.
    pub fn parse(name: &str) -> SimResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "FIRST_FIT" => Ok(Self::FirstFit),
            "BEST_FIT" => Ok(Self::BestFit),
            "WORST_FIT" => Ok(Self::WorstFit),
            "SEGMENTATION" => Ok(Self::Segmentation),
            _ => Err(SimError::InvalidConfiguration(format!(
                "unknown memory algorithm '{name}'"
            ))),
        }
    }
}

/// Automatic I/O injection settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoSettings {
    /// Chance per executed tick that the running process starts an I/O burst
    pub io_probability: f64,
    /// Length of an I/O burst. One simulated second is one tick.
    pub io_duration_seconds: u32,
    /// Master switch for probability-driven I/O
    #[serde(rename = "autoIOEnabled")]
    pub auto_io_enabled: bool,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            io_probability: 0.0,
            io_duration_seconds: 2,
            auto_io_enabled: false,
        }
    }
}

impl IoSettings {
    /// Probability must lie in [0, 1]; duration must be at least one tick.
    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.io_probability) {
            return Err(SimError::Validation(format!(
                "ioProbability must be within [0, 1], got {}",
                self.io_probability
            )));
        }
        if self.io_duration_seconds == 0 {
            return Err(SimError::Validation(
                "ioDurationSeconds must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// I/O burst length in ticks.
    pub fn duration_ticks(&self) -> u64 {
        u64::from(self.io_duration_seconds)
    }
}

/// Kind of externally emitted interruption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptionKind {
    /// Start an I/O burst: Running -> Waiting
    Io,
    /// Forced preemption: Running -> Ready
    QuantumExpired,
    /// Kill: Running -> Terminated
    ManualStop,
    /// Park the target in Waiting for one I/O burst and pause the run
    ManualPause,
}

impl InterruptionKind {
    /// Parse a wire identifier.
    pub fn parse(name: &str) -> SimResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "IO" => Ok(Self::Io),
            "QUANTUM_EXPIRED" => Ok(Self::QuantumExpired),
            "MANUAL_STOP" => Ok(Self::ManualStop),
            "MANUAL_PAUSE" => Ok(Self::ManualPause),
            _ => Err(SimError::Validation(format!(
                "unknown interruption type '{name}'"
            ))),
        }
    }
}

/// A queued instruction to move a process out of Running.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interruption {
    /// Target process
    pub pid: ProcessId,
    /// What to do with it
    pub kind: InterruptionKind,
    /// Free-text reason, carried into the timeline
    pub reason: String,
    /// Tick at which it was submitted
    pub submitted_at: Tick,
}

/// Descriptor for a new process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSpec {
    /// Display name
    pub name: String,
    /// Tick at which the process becomes Ready
    pub arrival_time: Tick,
    /// Total CPU burst in ticks
    pub burst_time: u64,
    /// Scheduling priority
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Optional memory request satisfied at creation
    #[serde(default)]
    pub memory_size: Option<u64>,
}

/// Priority given to processes created without one.
pub const DEFAULT_PRIORITY: u32 = 1;

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl ProcessSpec {
    /// Shape checks that need no state.
    pub fn validate(&self) -> SimResult<()> {
        if self.name.trim().is_empty() {
            return Err(SimError::Validation("name must not be blank".into()));
        }
        if self.burst_time == 0 {
            return Err(SimError::Validation("burstTime must be at least 1".into()));
        }
        if self.memory_size == Some(0) {
            return Err(SimError::Validation("memorySize must be positive".into()));
        }
        Ok(())
    }
}

/// Per-process timing bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAccounting {
    /// Tick of the first dispatch
    pub first_dispatch: Option<Tick>,
    /// Tick at which the process terminated
    pub completion: Option<Tick>,
    /// Ticks spent Ready
    pub waiting_ticks: u64,
    /// Ticks spent in I/O
    pub io_ticks: u64,
    /// Ticks executed in the current quantum
    pub quantum_used: u32,
}

/// Process control block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Process ID
    pub pid: ProcessId,
    /// Display name
    pub name: String,
    /// Scheduling priority
    pub priority: u32,
    /// Arrival tick
    pub arrival_time: Tick,
    /// Total CPU burst
    pub burst_time: u64,
    /// CPU ticks still needed
    pub remaining_time: u64,
    /// Lifecycle state
    pub state: ProcessState,
    /// Offset of the owned memory block, if any
    pub memory_block: Option<u64>,
    /// Size reserved for the process; re-acquired when a new run starts
    pub memory_request: Option<u64>,
    /// Ticks of I/O left while Waiting
    pub io_remaining: Option<u64>,
    /// Timing bookkeeping
    pub accounting: ProcessAccounting,
}

impl Process {
    /// Fresh process in `New`.
    pub fn new(pid: ProcessId, spec: &ProcessSpec) -> Self {
        Self {
            pid,
            name: spec.name.clone(),
            priority: spec.priority,
            arrival_time: spec.arrival_time,
            burst_time: spec.burst_time,
            remaining_time: spec.burst_time,
            state: ProcessState::New,
            memory_block: None,
            memory_request: None,
            io_remaining: None,
            accounting: ProcessAccounting::default(),
        }
    }

    /// Move along a lifecycle edge. Illegal edges leave the process untouched.
    pub fn transition(&mut self, to: ProcessState) -> SimResult<()> {
        if !self.state.can_transition_to(to) {
            tracing::debug!(pid = %self.pid, from = ?self.state, to = ?to, "rejected transition");
            return Err(SimError::InvalidProcessTransition {
                pid: self.pid,
                from: self.state,
                to,
            });
        }
        if self.state == ProcessState::Running {
            self.accounting.quantum_used = 0;
        }
        if to != ProcessState::Waiting {
            self.io_remaining = None;
        }
        self.state = to;
        Ok(())
    }

    /// Put the process back to `New` with its full burst, for a fresh run.
    pub fn rewind(&mut self) {
        self.remaining_time = self.burst_time;
        self.state = ProcessState::New;
        self.io_remaining = None;
        self.accounting = ProcessAccounting::default();
    }

    /// completion - arrival, once terminated.
    pub fn turnaround(&self) -> Option<u64> {
        self.accounting
            .completion
            .map(|c| c.saturating_sub(self.arrival_time))
    }

    /// first dispatch - arrival, once dispatched.
    pub fn response(&self) -> Option<u64> {
        self.accounting
            .first_dispatch
            .map(|d| d.saturating_sub(self.arrival_time))
    }
}
