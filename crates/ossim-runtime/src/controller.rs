//! Simulation controller
//!
//! The single owner of the [`Simulation`]. All commands and ticks go through
//! one async `RwLock`: writers (commands, ticks) hold it for their whole
//! duration, so a command either fully precedes or fully follows a tick.
//! Queries take the read lock and return owned snapshots.

use std::sync::Arc;
use std::time::Duration;

use ossim_core::{
    assert_invariants, manual_step, Entropy, ExecutionSlice, InterruptionKind, IoSettings,
    MemoryAlgorithm, MemoryBlock, MemorySnapshot, Process, ProcessId, ProcessSpec,
    SchedulerConfig, SeededEntropy, SimResult, Simulation, SimulationMode, SimulationSnapshot,
    SimulationStatus, Tick, TickReport, TimelineEvent,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::ticker;

/// State behind the lock.
pub(crate) struct Inner {
    pub(crate) sim: Simulation,
    pub(crate) entropy: Box<dyn Entropy>,
    /// Bumped whenever a run starts or ends; tickers from older runs exit.
    pub(crate) epoch: u64,
    ticker: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_ticker(&mut self) {
        self.epoch += 1;
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

/// Cloneable handle to the simulation.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<RwLock<Inner>>,
    tick_interval: Duration,
}

impl Controller {
    /// Controller with a seeded entropy source.
    pub fn new(config: RuntimeConfig) -> SimResult<Self> {
        let seed = config.resolve_seed();
        info!(seed, tick_ms = config.tick_interval.as_millis() as u64, "simulation controller ready");
        Self::with_entropy(config, Box::new(SeededEntropy::new(seed)))
    }

    /// Controller with a caller-supplied entropy source.
    pub fn with_entropy(config: RuntimeConfig, entropy: Box<dyn Entropy>) -> SimResult<Self> {
        let mut sim = Simulation::new(config.memory);
        if let Some(total) = config.initial_memory {
            sim.initialize_memory(total)?;
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                sim,
                entropy,
                epoch: 0,
                ticker: None,
            })),
            tick_interval: config.tick_interval,
        })
    }

    /// Run `f` against a read-only view of the simulation.
    pub async fn read<R>(&self, f: impl FnOnce(&Simulation) -> R) -> R {
        let guard = self.inner.read().await;
        f(&guard.sim)
    }

    // ========================================================================
    // Processes
    // ========================================================================

    /// Register a process.
    pub async fn create_process(&self, spec: ProcessSpec) -> SimResult<Process> {
        let mut guard = self.inner.write().await;
        let process = guard.sim.create_process(spec)?;
        info!(pid = %process.pid, name = %process.name, "process created");
        Ok(process)
    }

    /// All processes in pid order.
    pub async fn processes(&self) -> Vec<Process> {
        self.read(|sim| sim.processes().cloned().collect()).await
    }

    /// Remove every process.
    pub async fn clear_processes(&self) -> usize {
        let mut guard = self.inner.write().await;
        let count = guard.sim.clear_processes();
        info!(count, "processes cleared");
        count
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Start a run and its automatic ticker.
    pub async fn start(&self, config: SchedulerConfig) -> SimResult<()> {
        self.start_with(|_| Ok(config)).await
    }

    /// Start a run with a configuration derived from the current one. The
    /// derivation and the start happen under the same lock.
    pub async fn start_with(
        &self,
        derive: impl FnOnce(&SchedulerConfig) -> SimResult<SchedulerConfig>,
    ) -> SimResult<()> {
        let mut guard = self.inner.write().await;
        let config = derive(guard.sim.scheduler().config())?;
        guard.sim.start(config)?;
        guard.cancel_ticker();
        let epoch = guard.epoch;
        guard.ticker = Some(ticker::spawn(self.inner.clone(), epoch, self.tick_interval));
        info!(algorithm = config.algorithm.as_str(), quantum = config.quantum, preemptive = config.preemptive, "simulation started");
        Ok(())
    }

    /// Hold ticks. A tick waiting for the lock sees Paused and skips.
    pub async fn pause(&self) -> SimResult<()> {
        self.inner.write().await.sim.pause()?;
        info!("simulation paused");
        Ok(())
    }

    /// Release held ticks.
    pub async fn resume(&self) -> SimResult<()> {
        self.inner.write().await.sim.resume()?;
        info!("simulation resumed");
        Ok(())
    }

    /// End the run and cancel the ticker under the lock.
    pub async fn stop(&self) -> SimResult<()> {
        let mut guard = self.inner.write().await;
        guard.sim.stop()?;
        guard.cancel_ticker();
        info!(tick = guard.sim.tick(), "simulation stopped");
        Ok(())
    }

    /// Stop, clear every process, free memory and empty the timeline.
    pub async fn reset(&self) {
        let mut guard = self.inner.write().await;
        guard.cancel_ticker();
        guard.sim.reset();
        info!("simulation reset");
    }

    /// Advance one tick in manual mode.
    pub async fn step(&self) -> SimResult<TickReport> {
        let mut guard = self.inner.write().await;
        let Inner { sim, entropy, .. } = &mut *guard;
        let report = manual_step(sim, entropy.as_mut())?;
        if cfg!(debug_assertions) {
            assert_invariants(sim);
        }
        debug!(tick = report.tick, ran = ?report.ran, "manual step");
        Ok(report)
    }

    /// Switch automatic/manual.
    pub async fn set_mode(&self, mode: SimulationMode) {
        self.inner.write().await.sim.set_mode(mode);
        info!(?mode, "mode changed");
    }

    /// Current mode.
    pub async fn mode(&self) -> SimulationMode {
        self.read(Simulation::mode).await
    }

    /// Current status.
    pub async fn status(&self) -> SimulationStatus {
        self.read(Simulation::status).await
    }

    /// Replace the scheduling configuration mid-run.
    pub async fn set_scheduler(&self, config: SchedulerConfig) -> SimResult<()> {
        self.set_scheduler_with(|_| Ok(config)).await
    }

    /// Replace the scheduling configuration with one derived from the
    /// current one, under a single lock.
    pub async fn set_scheduler_with(
        &self,
        derive: impl FnOnce(&SchedulerConfig) -> SimResult<SchedulerConfig>,
    ) -> SimResult<()> {
        let mut guard = self.inner.write().await;
        let config = derive(guard.sim.scheduler().config())?;
        guard.sim.set_scheduler(config)?;
        info!(algorithm = config.algorithm.as_str(), "scheduling algorithm changed");
        Ok(())
    }

    /// Replace the I/O settings.
    pub async fn set_io_settings(&self, settings: IoSettings) -> SimResult<()> {
        self.inner.write().await.sim.set_io_settings(settings)?;
        info!(
            probability = settings.io_probability,
            duration = settings.io_duration_seconds,
            enabled = settings.auto_io_enabled,
            "I/O settings changed"
        );
        Ok(())
    }

    /// Queue an interruption for the next tick.
    pub async fn interrupt(
        &self,
        pid: ProcessId,
        kind: InterruptionKind,
        reason: String,
    ) -> SimResult<()> {
        self.inner
            .write()
            .await
            .sim
            .submit_interruption(pid, kind, reason)?;
        info!(%pid, ?kind, "interruption queued");
        Ok(())
    }

    // ========================================================================
    // Memory
    // ========================================================================

    /// Reset memory to one free block.
    pub async fn initialize_memory(&self, total_size: u64) -> SimResult<u64> {
        let total = self.inner.write().await.sim.initialize_memory(total_size)?;
        info!(total, "memory initialized");
        Ok(total)
    }

    /// Give a process a block.
    pub async fn allocate(
        &self,
        pid: ProcessId,
        size: u64,
        algorithm: Option<MemoryAlgorithm>,
    ) -> SimResult<MemoryBlock> {
        let block = self
            .inner
            .write()
            .await
            .sim
            .allocate_memory(pid, size, algorithm)?;
        debug!(%pid, offset = block.offset, size = block.size, "memory allocated");
        Ok(block)
    }

    /// Free a process's block.
    pub async fn deallocate(&self, pid: ProcessId) -> SimResult<MemoryBlock> {
        let block = self.inner.write().await.sim.deallocate_memory(pid)?;
        debug!(%pid, offset = block.offset, "memory freed");
        Ok(block)
    }

    /// Change the default memory algorithm.
    pub async fn set_memory_algorithm(&self, algorithm: MemoryAlgorithm) {
        self.inner
            .write()
            .await
            .sim
            .set_memory_algorithm(algorithm);
        info!(?algorithm, "memory algorithm changed");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Full state snapshot.
    pub async fn snapshot(&self) -> SimulationSnapshot {
        self.read(Simulation::snapshot).await
    }

    /// Timeline, optionally from a tick on.
    pub async fn timeline(&self, since: Option<Tick>) -> Vec<TimelineEvent> {
        self.read(|sim| sim.events(since).to_vec()).await
    }

    /// Execution slices.
    pub async fn gantt(&self) -> Vec<ExecutionSlice> {
        self.read(|sim| sim.timeline().slices().to_vec()).await
    }

    /// Memory snapshot.
    pub async fn memory(&self, pending: Option<u64>) -> MemorySnapshot {
        self.read(|sim| sim.memory_snapshot(pending)).await
    }
}
