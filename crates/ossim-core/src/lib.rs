//! OS Simulator Core - Pure Simulation Engine
//!
//! This crate contains the **pure, I/O-free** simulation engine: process
//! lifecycle, CPU scheduling, contiguous memory allocation, I/O bursts and
//! interruptions, and the timeline that records all of it.
//!
//! # Design Principles
//!
//! 1. **No runtime dependency**: timers, locks and transport live in
//!    `ossim-runtime` and `ossim-server`
//! 2. **Deterministic**: the same state, commands and entropy rolls always
//!    produce the same timeline
//! 3. **All-or-nothing commands**: a failed command leaves no trace
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ossim-core                           │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │  Simulation   │    │    step()     │                   │
//! │   │  - processes  │───▶│  one tick of  │                   │
//! │   │  - memory     │    │  sim. time    │                   │
//! │   │  - scheduler  │    └───────────────┘                   │
//! │   │  - timeline   │                                         │
//! │   └───────────────┘    ┌───────────────┐                   │
//! │                        │  Invariants   │                   │
//! │                        └───────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              │ used by
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ossim-runtime                          │
//! │   - single lock around the Simulation                       │
//! │   - cancellable automatic ticker                            │
//! │   - seeded entropy                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `types` - identifiers, lifecycle states, algorithm selectors, settings
//! - `memory` - contiguous block allocator with first/best/worst fit
//! - `scheduler` - ready queue and FCFS/SJF/RR/Priority selection
//! - `io` - entropy source and interruption queue
//! - `timeline` - append-only event log and execution slices
//! - `state` - the `Simulation` value and its commands
//! - `step` - the tick function
//! - `invariants` - checkable invariants for tests

pub mod error;
pub mod invariants;
pub mod io;
pub mod memory;
pub mod scheduler;
pub mod state;
pub mod step;
pub mod timeline;
pub mod types;

pub use error::{SimError, SimResult};
pub use invariants::{assert_invariants, check_all_invariants, InvariantViolation};
pub use io::{Entropy, InterruptQueue, ScriptedEntropy, SeededEntropy};
pub use memory::{MemoryBlock, MemoryConfig, MemoryManager, MemorySegment, MemorySnapshot};
pub use scheduler::Scheduler;
pub use state::{Simulation, SimulationMetrics, SimulationSnapshot};
pub use step::{manual_step, step, TickReport};
pub use timeline::{
    EventKind, ExecutionSlice, InterruptionOutcome, Timeline, TimelineEvent, TransitionReason,
};
pub use types::{
    Interruption, InterruptionKind, IoSettings, MemoryAlgorithm, PriorityOrder, Process,
    ProcessAccounting, ProcessId, ProcessSpec, ProcessState, SchedulerConfig, SchedulingAlgorithm,
    SimulationMode, SimulationStatus, Tick, DEFAULT_PRIORITY, DEFAULT_QUANTUM,
};
