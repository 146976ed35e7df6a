//! Simulation state
//!
//! [`Simulation`] holds every piece of mutable simulation state: the process
//! table, memory, scheduler, pending interruptions, timeline and the
//! controller status. External commands are methods here; tick advancement
//! lives in [`crate::step`]. There are no globals: whoever owns the value
//! owns the simulation.
//!
//! Every command validates before it mutates, so an `Err` leaves the state
//! exactly as it was.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::io::InterruptQueue;
use crate::memory::{MemoryBlock, MemoryConfig, MemoryManager, MemorySnapshot};
use crate::scheduler::Scheduler;
use crate::timeline::{EventKind, Timeline, TimelineEvent, TransitionReason};
use crate::types::{
    Interruption, InterruptionKind, IoSettings, MemoryAlgorithm, Process, ProcessId, ProcessSpec,
    ProcessState, SchedulerConfig, SimulationMode, SimulationStatus, Tick,
};

/// Aggregate run metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMetrics {
    /// Mean ticks spent Ready, over terminated processes
    pub average_waiting_time: f64,
    /// Mean completion - arrival, over terminated processes
    pub average_turnaround_time: f64,
    /// Mean first dispatch - arrival, over dispatched processes
    pub average_response_time: f64,
    /// busy ticks / elapsed ticks
    pub cpu_utilization: f64,
    /// Terminated process count
    pub throughput: usize,
    /// Ticks during which some process executed
    pub busy_ticks: u64,
    /// Ticks elapsed in this run
    pub elapsed_ticks: u64,
}

/// Full observable state, grouped the way the UI shows it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    pub status: SimulationStatus,
    pub mode: SimulationMode,
    pub tick: Tick,
    pub scheduler: SchedulerConfig,
    pub memory_algorithm: MemoryAlgorithm,
    pub io_settings: IoSettings,
    pub running_process: Option<Process>,
    /// Ready processes in queue order
    pub ready_queue: Vec<Process>,
    pub waiting_queue: Vec<Process>,
    pub terminated_queue: Vec<Process>,
    /// Processes whose arrival tick has not been reached
    pub new_processes: Vec<Process>,
    pub pending_interruptions: Vec<Interruption>,
    pub metrics: SimulationMetrics,
}

/// The simulation.
#[derive(Clone, Debug)]
pub struct Simulation {
    pub(crate) processes: BTreeMap<ProcessId, Process>,
    pub(crate) next_pid: u64,
    pub(crate) memory: MemoryManager,
    pub(crate) scheduler: Scheduler,
    pub(crate) interrupts: InterruptQueue,
    pub(crate) timeline: Timeline,
    pub(crate) io: IoSettings,
    pub(crate) mode: SimulationMode,
    pub(crate) status: SimulationStatus,
    pub(crate) tick: Tick,
    pub(crate) running: Option<ProcessId>,
    pub(crate) busy_ticks: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl Simulation {
    /// Idle simulation with uninitialized memory.
    pub fn new(memory: MemoryConfig) -> Self {
        Self {
            processes: BTreeMap::new(),
            next_pid: 1,
            memory: MemoryManager::new(memory),
            scheduler: Scheduler::default(),
            interrupts: InterruptQueue::new(),
            timeline: Timeline::new(),
            io: IoSettings::default(),
            mode: SimulationMode::default(),
            status: SimulationStatus::Idle,
            tick: 0,
            running: None,
            busy_ticks: 0,
        }
    }

    // ========================================================================
    // Read-only accessors
    // ========================================================================

    /// Controller status.
    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    /// Tick mode.
    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    /// Next tick to execute.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Process holding the CPU.
    pub fn running(&self) -> Option<ProcessId> {
        self.running
    }

    /// One process.
    pub fn process(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.get(&pid)
    }

    /// All processes in pid order.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Scheduler (ready queue and configuration).
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Memory manager.
    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    /// Current I/O settings.
    pub fn io_settings(&self) -> &IoSettings {
        &self.io
    }

    /// The event log.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Events from `since` on, or all of them.
    pub fn events(&self, since: Option<Tick>) -> &[TimelineEvent] {
        match since {
            Some(t) => self.timeline.since(t),
            None => self.timeline.events(),
        }
    }

    /// Interruptions waiting for the next tick.
    pub fn pending_interruptions(&self) -> impl Iterator<Item = &Interruption> {
        self.interrupts.pending()
    }

    /// Memory snapshot; see [`MemoryManager::snapshot`].
    pub fn memory_snapshot(&self, pending: Option<u64>) -> MemorySnapshot {
        self.memory.snapshot(pending)
    }

    /// True while a run is loaded (Running or Paused).
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SimulationStatus::Running | SimulationStatus::Paused
        )
    }

    fn in_state(&self, state: ProcessState) -> Vec<Process> {
        self.processes
            .values()
            .filter(|p| p.state == state)
            .cloned()
            .collect()
    }

    /// Aggregate metrics over the current run.
    pub fn metrics(&self) -> SimulationMetrics {
        let finished: Vec<&Process> = self
            .processes
            .values()
            .filter(|p| p.state == ProcessState::Terminated)
            .collect();
        let dispatched: Vec<u64> = self.processes.values().filter_map(Process::response).collect();

        let mean = |values: &mut dyn Iterator<Item = u64>, n: usize| -> f64 {
            if n == 0 {
                0.0
            } else {
                values.sum::<u64>() as f64 / n as f64
            }
        };

        SimulationMetrics {
            average_waiting_time: mean(
                &mut finished.iter().map(|p| p.accounting.waiting_ticks),
                finished.len(),
            ),
            average_turnaround_time: mean(
                &mut finished.iter().filter_map(|p| p.turnaround()),
                finished.len(),
            ),
            average_response_time: mean(&mut dispatched.iter().copied(), dispatched.len()),
            cpu_utilization: if self.tick == 0 {
                0.0
            } else {
                self.busy_ticks as f64 / self.tick as f64
            },
            throughput: finished.len(),
            busy_ticks: self.busy_ticks,
            elapsed_ticks: self.tick,
        }
    }

    /// Everything the UI needs in one value.
    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            status: self.status,
            mode: self.mode,
            tick: self.tick,
            scheduler: *self.scheduler.config(),
            memory_algorithm: self.memory.default_algorithm(),
            io_settings: self.io,
            running_process: self.running.and_then(|pid| self.processes.get(&pid)).cloned(),
            ready_queue: self
                .scheduler
                .ready_queue()
                .filter_map(|pid| self.processes.get(&pid))
                .cloned()
                .collect(),
            waiting_queue: self.in_state(ProcessState::Waiting),
            terminated_queue: self.in_state(ProcessState::Terminated),
            new_processes: self.in_state(ProcessState::New),
            pending_interruptions: self.interrupts.pending().cloned().collect(),
            metrics: self.metrics(),
        }
    }

    // ========================================================================
    // Process registry commands
    // ========================================================================

    /// Register a process in `New`. With `memory_size` set, its block is
    /// allocated with the default memory algorithm in the same command.
    pub fn create_process(&mut self, spec: ProcessSpec) -> SimResult<Process> {
        spec.validate()?;
        let pid = ProcessId(self.next_pid);
        let mut process = Process::new(pid, &spec);

        let block = match spec.memory_size {
            Some(size) => {
                let algorithm = self.memory.default_algorithm();
                Some((self.memory.allocate(pid, size, algorithm)?, algorithm))
            }
            None => None,
        };

        self.next_pid += 1;
        self.timeline.record(
            self.tick,
            EventKind::ProcessCreated {
                pid,
                name: process.name.clone(),
                arrival_time: process.arrival_time,
                burst_time: process.burst_time,
                priority: process.priority,
            },
        );
        if let Some((block, algorithm)) = block {
            process.memory_block = Some(block.offset);
            process.memory_request = Some(block.requested);
            self.timeline
                .record(self.tick, EventKind::allocated(&block, pid, algorithm));
        }
        self.processes.insert(pid, process.clone());
        Ok(process)
    }

    /// Remove every process, releasing their memory and pending
    /// interruptions. Returns how many were removed.
    pub fn clear_processes(&mut self) -> usize {
        let count = self.processes.len();
        for block in self.owned_blocks() {
            if let Some(pid) = block.owner {
                self.timeline
                    .record(self.tick, EventKind::deallocated(&block, pid));
            }
        }
        self.memory.release_all();
        self.processes.clear();
        self.scheduler.clear();
        self.interrupts.clear();
        self.running = None;
        self.timeline
            .record(self.tick, EventKind::ProcessesCleared { count });
        count
    }

    fn owned_blocks(&self) -> Vec<MemoryBlock> {
        self.memory
            .blocks()
            .iter()
            .filter(|b| !b.is_free())
            .cloned()
            .collect()
    }

    // ========================================================================
    // Controller commands
    // ========================================================================

    fn controller_error(&self, action: &'static str) -> SimError {
        SimError::InvalidControllerTransition {
            action,
            status: self.status,
        }
    }

    pub(crate) fn set_status(&mut self, to: SimulationStatus) {
        let from = self.status;
        self.status = to;
        self.timeline
            .record(self.tick, EventKind::StatusChanged { from, to });
    }

    /// Begin a fresh run with `config`. Allowed from Idle or Completed.
    ///
    /// The clock, timeline, ready queue and pending interruptions are reset
    /// and every process is rewound to `New`. Blocks still held are kept;
    /// reservations released when a process terminated are re-acquired with
    /// the default memory algorithm, in pid order. If one no longer fits the
    /// start fails with `OutOfMemory` and nothing changes.
    pub fn start(&mut self, config: SchedulerConfig) -> SimResult<()> {
        if self.is_active() {
            return Err(self.controller_error("start"));
        }
        if !self.memory.is_initialized() {
            return Err(SimError::NotConfigured("memory must be initialized before start"));
        }
        config.validate()?;
        let (memory, restored) = self.restore_reservations()?;

        self.memory = memory;
        for (block, _) in &restored {
            if let Some(p) = block.owner.and_then(|pid| self.processes.get_mut(&pid)) {
                p.memory_block = Some(block.offset);
            }
        }
        self.tick = 0;
        self.busy_ticks = 0;
        self.running = None;
        self.timeline.clear();
        self.interrupts.clear();
        self.scheduler = Scheduler::new(config);
        for process in self.processes.values_mut() {
            process.rewind();
        }

        self.set_status(SimulationStatus::Running);
        self.timeline
            .record(self.tick, EventKind::AlgorithmChanged { config });
        for (block, algorithm) in restored {
            if let Some(pid) = block.owner {
                self.timeline
                    .record(self.tick, EventKind::allocated(&block, pid, algorithm));
            }
        }
        Ok(())
    }

    /// Memory with every released reservation allocated again, computed on a
    /// copy so a failure leaves `self` untouched.
    fn restore_reservations(
        &self,
    ) -> SimResult<(MemoryManager, Vec<(MemoryBlock, MemoryAlgorithm)>)> {
        let mut memory = self.memory.clone();
        let algorithm = memory.default_algorithm();
        let mut restored = Vec::new();
        for p in self.processes.values() {
            if let (Some(size), None) = (p.memory_request, p.memory_block) {
                restored.push((memory.allocate(p.pid, size, algorithm)?, algorithm));
            }
        }
        Ok((memory, restored))
    }

    /// Running -> Paused.
    pub fn pause(&mut self) -> SimResult<()> {
        if self.status != SimulationStatus::Running {
            return Err(self.controller_error("pause"));
        }
        self.set_status(SimulationStatus::Paused);
        Ok(())
    }

    /// Paused -> Running.
    pub fn resume(&mut self) -> SimResult<()> {
        if self.status != SimulationStatus::Paused {
            return Err(self.controller_error("resume"));
        }
        self.set_status(SimulationStatus::Running);
        Ok(())
    }

    /// Running, Paused or Completed -> Idle. The timeline stays for
    /// inspection; pending interruptions are dropped.
    pub fn stop(&mut self) -> SimResult<()> {
        if self.status == SimulationStatus::Idle {
            return Err(self.controller_error("stop"));
        }
        self.interrupts.clear();
        self.set_status(SimulationStatus::Idle);
        Ok(())
    }

    /// Back to a clean slate: Idle, no processes, memory fully free,
    /// empty timeline, tick 0. Memory size and settings are kept.
    pub fn reset(&mut self) {
        self.memory.release_all();
        self.processes.clear();
        self.next_pid = 1;
        self.scheduler.clear();
        self.interrupts.clear();
        self.running = None;
        self.busy_ticks = 0;
        self.tick = 0;
        self.status = SimulationStatus::Idle;
        self.timeline.clear();
    }

    /// Switch between automatic and manual ticking.
    pub fn set_mode(&mut self, mode: SimulationMode) {
        if self.mode != mode {
            self.mode = mode;
            self.timeline
                .record(self.tick, EventKind::ModeChanged { mode });
        }
    }

    /// Replace the CPU scheduling configuration; takes effect next tick.
    pub fn set_scheduler(&mut self, config: SchedulerConfig) -> SimResult<()> {
        self.scheduler.set_config(config)?;
        self.timeline
            .record(self.tick, EventKind::AlgorithmChanged { config });
        Ok(())
    }

    /// Replace the I/O settings.
    pub fn set_io_settings(&mut self, settings: IoSettings) -> SimResult<()> {
        settings.validate()?;
        self.io = settings;
        self.timeline
            .record(self.tick, EventKind::IoSettingsChanged { settings });
        Ok(())
    }

    // ========================================================================
    // Memory commands
    // ========================================================================

    /// Reset memory to one free block of `total_size`.
    ///
    /// Rejected while a run is loaded. Otherwise destructive: every process
    /// loses its block.
    pub fn initialize_memory(&mut self, total_size: u64) -> SimResult<u64> {
        if self.is_active() {
            return Err(SimError::AlreadyInitialized(
                "memory cannot be re-initialized while a simulation is active",
            ));
        }
        let dropped = self.owned_blocks();
        let evicted = self.memory.initialize(total_size)?;
        for pid in evicted {
            if let Some(p) = self.processes.get_mut(&pid) {
                p.memory_block = None;
                p.memory_request = None;
            }
        }
        for block in dropped {
            if let Some(pid) = block.owner {
                self.timeline
                    .record(self.tick, EventKind::deallocated(&block, pid));
            }
        }
        let total = self.memory.total_size();
        self.timeline
            .record(self.tick, EventKind::MemoryInitialized { total_size: total });
        Ok(total)
    }

    /// Give `pid` a block of `size`, using `algorithm` or the default.
    pub fn allocate_memory(
        &mut self,
        pid: ProcessId,
        size: u64,
        algorithm: Option<MemoryAlgorithm>,
    ) -> SimResult<MemoryBlock> {
        if !self.processes.contains_key(&pid) {
            return Err(SimError::NotFound(format!("process {} does not exist", pid.0)));
        }
        let algorithm = algorithm.unwrap_or_else(|| self.memory.default_algorithm());
        let block = self.memory.allocate(pid, size, algorithm)?;
        if let Some(p) = self.processes.get_mut(&pid) {
            p.memory_block = Some(block.offset);
            p.memory_request = Some(size);
        }
        self.timeline
            .record(self.tick, EventKind::allocated(&block, pid, algorithm));
        Ok(block)
    }

    /// Free the block owned by `pid` and drop its reservation.
    pub fn deallocate_memory(&mut self, pid: ProcessId) -> SimResult<MemoryBlock> {
        let block = self.release_memory(pid)?;
        if let Some(p) = self.processes.get_mut(&pid) {
            p.memory_request = None;
        }
        Ok(block)
    }

    /// Free the block owned by `pid`, keeping its reservation for the next run.
    fn release_memory(&mut self, pid: ProcessId) -> SimResult<MemoryBlock> {
        let block = self.memory.deallocate(pid)?;
        if let Some(p) = self.processes.get_mut(&pid) {
            p.memory_block = None;
        }
        self.timeline
            .record(self.tick, EventKind::deallocated(&block, pid));
        Ok(block)
    }

    /// Change the algorithm used when a request names none.
    pub fn set_memory_algorithm(&mut self, algorithm: MemoryAlgorithm) {
        self.memory.set_default_algorithm(algorithm);
        self.timeline
            .record(self.tick, EventKind::MemoryAlgorithmChanged { algorithm });
    }

    // ========================================================================
    // Interruptions
    // ========================================================================

    /// Queue an interruption for the next tick. Only the pid is checked
    /// now; whether the target is Running is decided when it is applied.
    pub fn submit_interruption(
        &mut self,
        pid: ProcessId,
        kind: InterruptionKind,
        reason: impl Into<String>,
    ) -> SimResult<()> {
        if !self.processes.contains_key(&pid) {
            return Err(SimError::NotFound(format!("process {} does not exist", pid.0)));
        }
        self.interrupts.submit(Interruption {
            pid,
            kind,
            reason: reason.into(),
            submitted_at: self.tick,
        });
        Ok(())
    }

    // ========================================================================
    // Lifecycle helpers used by the tick
    // ========================================================================

    /// Apply a lifecycle transition and keep the ready queue, running slot
    /// and timeline in step with it.
    pub(crate) fn transition(
        &mut self,
        pid: ProcessId,
        to: ProcessState,
        reason: TransitionReason,
    ) -> SimResult<()> {
        let process = self
            .processes
            .get_mut(&pid)
            .ok_or_else(|| SimError::NotFound(format!("process {} does not exist", pid.0)))?;
        let from = process.state;
        process.transition(to)?;

        match from {
            ProcessState::Ready => self.scheduler.remove(pid),
            ProcessState::Running => self.running = None,
            _ => {}
        }
        match to {
            ProcessState::Ready => self.scheduler.enqueue(pid),
            ProcessState::Running => self.running = Some(pid),
            _ => {}
        }
        self.timeline.record(
            self.tick,
            EventKind::StateChanged {
                pid,
                from,
                to,
                reason,
            },
        );
        Ok(())
    }

    /// Terminate `pid` at `completion` and return its memory. The
    /// reservation survives for the next run.
    pub(crate) fn terminate(
        &mut self,
        pid: ProcessId,
        completion: Tick,
        reason: TransitionReason,
    ) -> SimResult<()> {
        self.transition(pid, ProcessState::Terminated, reason)?;
        if let Some(p) = self.processes.get_mut(&pid) {
            p.accounting.completion = Some(completion);
        }
        if self.memory.block_of(pid).is_some() {
            self.release_memory(pid)?;
        }
        Ok(())
    }
}
