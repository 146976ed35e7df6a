//! Tick function
//!
//! [`step`] advances a Running simulation by exactly one tick. It is the only
//! place simulated time moves. Given the same state and the same entropy
//! rolls it always produces the same result, which is what makes a run
//! replayable.
//!
//! # Phases of tick `t`
//!
//! 1. Queued interruptions, in submission order
//! 2. Finished I/O bursts return to Ready
//! 3. Arrivals (`arrival_time <= t`) are admitted, by arrival then pid
//! 4. Preemption of the running process (quantum, SRT, priority)
//! 5. Dispatch when the CPU is free
//! 6. Execution: the running process burns one unit, Ready processes
//!    accrue waiting time, Waiting processes count down their I/O
//! 7. Termination or a probability-driven I/O burst
//!
//! Every state change lands in the timeline at tick `t`. A manual-pause
//! interruption pauses the run from phase 1, but the tick it arrived in
//! still completes.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::io::{roll_for_io, Entropy};
use crate::state::Simulation;
use crate::timeline::{EventKind, InterruptionOutcome, TransitionReason};
use crate::types::{InterruptionKind, ProcessId, ProcessState, SimulationStatus, Tick};

/// What a tick did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// The tick that was executed
    pub tick: Tick,
    /// Process that held the CPU during it
    pub ran: Option<ProcessId>,
    /// Timeline events the tick appended
    pub events: usize,
    /// True when this tick terminated the last live process
    pub completed: bool,
}

/// Advance a Running simulation by one tick.
pub fn step(sim: &mut Simulation, entropy: &mut dyn Entropy) -> SimResult<TickReport> {
    if sim.status != SimulationStatus::Running {
        return Err(SimError::InvalidControllerTransition {
            action: "step",
            status: sim.status,
        });
    }

    let t = sim.tick;
    let events_before = sim.timeline.len();

    apply_interruptions(sim, t)?;
    complete_io(sim)?;
    admit_arrivals(sim, t)?;
    preempt(sim)?;
    dispatch(sim, t)?;
    let ran = execute(sim, t, entropy)?;

    sim.tick += 1;

    let completed = !sim.processes.is_empty()
        && sim
            .processes
            .values()
            .all(|p| p.state == ProcessState::Terminated);
    if completed {
        let from = sim.status;
        sim.status = SimulationStatus::Completed;
        sim.timeline.record(
            t,
            EventKind::StatusChanged {
                from,
                to: SimulationStatus::Completed,
            },
        );
    }

    Ok(TickReport {
        tick: t,
        ran,
        events: sim.timeline.len() - events_before,
        completed,
    })
}

/// Advance one tick on request. Only valid in manual mode.
pub fn manual_step(sim: &mut Simulation, entropy: &mut dyn Entropy) -> SimResult<TickReport> {
    if sim.mode.is_automatic() {
        return Err(SimError::InvalidControllerTransition {
            action: "step in automatic mode",
            status: sim.status,
        });
    }
    step(sim, entropy)
}

fn apply_interruptions(sim: &mut Simulation, t: Tick) -> SimResult<()> {
    for interruption in sim.interrupts.drain() {
        let pid = interruption.pid;
        let running = sim
            .processes
            .get(&pid)
            .is_some_and(|p| p.state == ProcessState::Running);

        sim.timeline.record(
            t,
            EventKind::Interruption {
                pid,
                interruption: interruption.kind,
                reason: interruption.reason,
                outcome: if running {
                    InterruptionOutcome::Applied
                } else {
                    InterruptionOutcome::Ignored
                },
            },
        );
        if !running {
            continue;
        }

        match interruption.kind {
            InterruptionKind::Io => start_io(sim, pid, TransitionReason::Interrupted)?,
            InterruptionKind::QuantumExpired => {
                sim.transition(pid, ProcessState::Ready, TransitionReason::Interrupted)?
            }
            InterruptionKind::ManualStop => {
                sim.terminate(pid, t, TransitionReason::Interrupted)?
            }
            InterruptionKind::ManualPause => {
                start_io(sim, pid, TransitionReason::Interrupted)?;
                if sim.status == SimulationStatus::Running {
                    sim.set_status(SimulationStatus::Paused);
                }
            }
        }
    }
    Ok(())
}

fn start_io(sim: &mut Simulation, pid: ProcessId, reason: TransitionReason) -> SimResult<()> {
    sim.transition(pid, ProcessState::Waiting, reason)?;
    let duration = sim.io.duration_ticks();
    if let Some(p) = sim.processes.get_mut(&pid) {
        p.io_remaining = Some(duration);
    }
    Ok(())
}

fn complete_io(sim: &mut Simulation) -> SimResult<()> {
    let done: Vec<ProcessId> = sim
        .processes
        .values()
        .filter(|p| p.state == ProcessState::Waiting && p.io_remaining == Some(0))
        .map(|p| p.pid)
        .collect();
    for pid in done {
        sim.transition(pid, ProcessState::Ready, TransitionReason::IoCompleted)?;
    }
    Ok(())
}

fn admit_arrivals(sim: &mut Simulation, t: Tick) -> SimResult<()> {
    let mut arrived: Vec<(Tick, ProcessId)> = sim
        .processes
        .values()
        .filter(|p| p.state == ProcessState::New && p.arrival_time <= t)
        .map(|p| (p.arrival_time, p.pid))
        .collect();
    arrived.sort_unstable();
    for (_, pid) in arrived {
        sim.transition(pid, ProcessState::Ready, TransitionReason::Admitted)?;
    }
    Ok(())
}

fn preempt(sim: &mut Simulation) -> SimResult<()> {
    let Some(pid) = sim.running else {
        return Ok(());
    };
    let Some(running) = sim.processes.get(&pid) else {
        return Ok(());
    };

    if let Some(reason) = sim.scheduler.preemption(running, &sim.processes) {
        return sim.transition(pid, ProcessState::Ready, reason);
    }

    // Quantum used up with nobody waiting: keep the CPU on a fresh slice.
    let quantum = sim.scheduler.config().quantum;
    if let Some(p) = sim.processes.get_mut(&pid) {
        if p.accounting.quantum_used >= quantum {
            p.accounting.quantum_used = 0;
        }
    }
    Ok(())
}

fn dispatch(sim: &mut Simulation, t: Tick) -> SimResult<()> {
    if sim.running.is_some() {
        return Ok(());
    }
    if let Some(pid) = sim.scheduler.select(&sim.processes) {
        sim.transition(pid, ProcessState::Running, TransitionReason::Dispatched)?;
        if let Some(p) = sim.processes.get_mut(&pid) {
            p.accounting.first_dispatch.get_or_insert(t);
        }
    }
    Ok(())
}

fn execute(sim: &mut Simulation, t: Tick, entropy: &mut dyn Entropy) -> SimResult<Option<ProcessId>> {
    for p in sim.processes.values_mut() {
        match p.state {
            ProcessState::Ready => p.accounting.waiting_ticks += 1,
            ProcessState::Waiting => {
                p.accounting.io_ticks += 1;
                p.io_remaining = p.io_remaining.map(|r| r.saturating_sub(1));
            }
            _ => {}
        }
    }

    let Some(pid) = sim.running else {
        return Ok(None);
    };
    let algorithm = sim.scheduler.config().algorithm;
    let Some(p) = sim.processes.get_mut(&pid) else {
        return Ok(None);
    };
    p.remaining_time = p.remaining_time.saturating_sub(1);
    p.accounting.quantum_used += 1;
    let finished = p.remaining_time == 0;
    let name = p.name.clone();

    sim.busy_ticks += 1;
    sim.timeline.record_execution(pid, &name, t, algorithm);

    if finished {
        sim.terminate(pid, t + 1, TransitionReason::Finished)?;
    } else if roll_for_io(&sim.io, entropy) {
        start_io(sim, pid, TransitionReason::IoStarted)?;
    }
    Ok(Some(pid))
}
