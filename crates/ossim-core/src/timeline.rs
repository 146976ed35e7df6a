//! Timeline recorder
//!
//! Append-only log of every state-changing event, plus the execution slices
//! (which process held the CPU over which ticks) used for Gantt charts.
//! Events carry a strictly increasing sequence number and a non-decreasing
//! tick. Nothing is rewritten; only a reset or a new run clears the log.

use serde::{Deserialize, Serialize};

use crate::memory::MemoryBlock;
use crate::types::{
    InterruptionKind, IoSettings, MemoryAlgorithm, ProcessId, ProcessState, SchedulerConfig,
    SchedulingAlgorithm, SimulationMode, SimulationStatus, Tick,
};

/// Why a process changed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionReason {
    /// Arrival tick reached
    Admitted,
    /// Picked by the scheduler
    Dispatched,
    /// Round Robin slice used up
    QuantumExpired,
    /// A more urgent or shorter process became Ready
    Preempted,
    /// External interruption
    Interrupted,
    /// Probability-driven I/O burst
    IoStarted,
    /// I/O burst elapsed
    IoCompleted,
    /// Remaining burst reached zero
    Finished,
}

/// Result of applying a queued interruption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptionOutcome {
    /// Target was Running and has been moved
    Applied,
    /// Target was not Running; nothing changed
    Ignored,
}

/// Event payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A process was registered
    #[serde(rename_all = "camelCase")]
    ProcessCreated {
        pid: ProcessId,
        name: String,
        arrival_time: Tick,
        burst_time: u64,
        priority: u32,
    },
    /// A lifecycle transition
    StateChanged {
        pid: ProcessId,
        from: ProcessState,
        to: ProcessState,
        reason: TransitionReason,
    },
    /// Memory reset to one free block
    #[serde(rename_all = "camelCase")]
    MemoryInitialized { total_size: u64 },
    /// A block was handed to a process
    MemoryAllocated {
        pid: ProcessId,
        offset: u64,
        size: u64,
        algorithm: MemoryAlgorithm,
    },
    /// A block was returned
    MemoryDeallocated { pid: ProcessId, offset: u64, size: u64 },
    /// A queued interruption was consumed
    Interruption {
        pid: ProcessId,
        interruption: InterruptionKind,
        reason: String,
        outcome: InterruptionOutcome,
    },
    /// Automatic/manual switch
    ModeChanged { mode: SimulationMode },
    /// Controller status switch
    StatusChanged {
        from: SimulationStatus,
        to: SimulationStatus,
    },
    /// CPU scheduling configuration replaced
    AlgorithmChanged { config: SchedulerConfig },
    /// Default memory algorithm replaced
    MemoryAlgorithmChanged { algorithm: MemoryAlgorithm },
    /// I/O settings replaced
    IoSettingsChanged { settings: IoSettings },
    /// All processes removed
    ProcessesCleared { count: usize },
}

impl EventKind {
    /// Allocation event for a block.
    pub fn allocated(block: &MemoryBlock, pid: ProcessId, algorithm: MemoryAlgorithm) -> Self {
        EventKind::MemoryAllocated {
            pid,
            offset: block.offset,
            size: block.size,
            algorithm,
        }
    }

    /// Deallocation event for a block.
    pub fn deallocated(block: &MemoryBlock, pid: ProcessId) -> Self {
        EventKind::MemoryDeallocated {
            pid,
            offset: block.offset,
            size: block.size,
        }
    }
}

/// An immutable timeline record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Position in the log
    pub seq: u64,
    /// Simulation tick
    pub tick: Tick,
    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Contiguous ticks a process held the CPU: `[start, end)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSlice {
    pub pid: ProcessId,
    pub name: String,
    pub start: Tick,
    pub end: Tick,
    pub algorithm: SchedulingAlgorithm,
}

/// Append-only event log.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
    slices: Vec<ExecutionSlice>,
    next_seq: u64,
}

impl Timeline {
    /// Empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. A tick earlier than the last recorded one is raised
    /// to it so the log stays ordered.
    pub fn record(&mut self, tick: Tick, kind: EventKind) -> &TimelineEvent {
        let tick = self.events.last().map_or(tick, |last| tick.max(last.tick));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(TimelineEvent { seq, tick, kind });
        &self.events[self.events.len() - 1]
    }

    /// Note that `pid` executed during `tick`, extending its slice when it
    /// also held the CPU on the previous tick.
    pub fn record_execution(
        &mut self,
        pid: ProcessId,
        name: &str,
        tick: Tick,
        algorithm: SchedulingAlgorithm,
    ) {
        if let Some(last) = self.slices.last_mut() {
            if last.pid == pid && last.end == tick && last.algorithm == algorithm {
                last.end = tick + 1;
                return;
            }
        }
        self.slices.push(ExecutionSlice {
            pid,
            name: name.to_string(),
            start: tick,
            end: tick + 1,
            algorithm,
        });
    }

    /// All events in order.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Suffix of events with `tick >= since`.
    pub fn since(&self, since: Tick) -> &[TimelineEvent] {
        let start = self.events.partition_point(|e| e.tick < since);
        &self.events[start..]
    }

    /// Execution slices in order.
    pub fn slices(&self) -> &[ExecutionSlice] {
        &self.slices
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop everything, including the sequence counter.
    pub fn clear(&mut self) {
        self.events.clear();
        self.slices.clear();
        self.next_seq = 0;
    }
}
