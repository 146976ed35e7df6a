//! End-to-end engine scenarios
//!
//! Drives a `Simulation` through the public API only, the way the runtime
//! does, and checks the scheduling and memory guarantees over whole runs.

use std::collections::BTreeMap;

use ossim_core::{
    check_all_invariants, step, EventKind, IoSettings, MemoryAlgorithm, ProcessId, ProcessSpec,
    ProcessState, SchedulerConfig, SchedulingAlgorithm, ScriptedEntropy, SimError, Simulation,
    SimulationStatus,
};
use proptest::prelude::*;

fn spec(name: &str, arrival: u64, burst: u64, priority: u32) -> ProcessSpec {
    ProcessSpec {
        name: name.into(),
        arrival_time: arrival,
        burst_time: burst,
        priority,
        memory_size: None,
    }
}

fn sim_with_memory(total: u64) -> Simulation {
    let mut sim = Simulation::default();
    sim.initialize_memory(total).unwrap();
    sim
}

// ============================================================================
// Memory
// ============================================================================

#[test]
fn test_memory_first_fit_scenario() {
    let mut sim = sim_with_memory(1000);
    let p1 = sim.create_process(spec("P1", 0, 5, 0)).unwrap().pid;
    let p2 = sim.create_process(spec("P2", 0, 5, 0)).unwrap().pid;

    sim.allocate_memory(p1, 400, Some(MemoryAlgorithm::FirstFit))
        .unwrap();
    let snap = sim.memory_snapshot(None);
    let free: Vec<_> = snap.blocks.iter().filter(|b| b.is_free()).collect();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].size, 600);

    let err = sim
        .allocate_memory(p2, 700, Some(MemoryAlgorithm::FirstFit))
        .unwrap_err();
    assert!(matches!(err, SimError::OutOfMemory { .. }));

    sim.deallocate_memory(p1).unwrap();
    let block = sim
        .allocate_memory(p2, 700, Some(MemoryAlgorithm::FirstFit))
        .unwrap();
    assert_eq!(block.size, 700);
    assert_eq!(sim.process(p2).unwrap().memory_block, Some(0));
    assert!(check_all_invariants(&sim).is_empty());
}

#[test]
fn test_deallocate_without_allocation_leaves_memory_untouched() {
    let mut sim = sim_with_memory(1000);
    let p = sim.create_process(spec("P1", 0, 5, 0)).unwrap().pid;
    let before = sim.memory_snapshot(None);
    let events = sim.timeline().len();

    assert!(matches!(
        sim.deallocate_memory(p),
        Err(SimError::NotFound(_))
    ));
    assert_eq!(sim.memory_snapshot(None), before);
    assert_eq!(sim.timeline().len(), events);
}

#[test]
fn test_default_memory_algorithm_applies_when_unspecified() {
    let mut sim = sim_with_memory(300);
    let ids: Vec<_> = (0..4)
        .map(|i| sim.create_process(spec(&format!("p{i}"), 0, 1, 0)).unwrap().pid)
        .collect();
    // [p0 100][free 50][p2 100][free 50]
    sim.allocate_memory(ids[0], 100, None).unwrap();
    sim.allocate_memory(ids[1], 50, None).unwrap();
    sim.allocate_memory(ids[2], 100, None).unwrap();
    sim.deallocate_memory(ids[1]).unwrap();

    sim.set_memory_algorithm(MemoryAlgorithm::WorstFit);
    let block = sim.allocate_memory(ids[3], 10, None).unwrap();
    assert_eq!(block.offset, 100);
    assert_eq!(
        sim.memory_snapshot(None).current_algorithm,
        MemoryAlgorithm::WorstFit
    );
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_preemptive_sjf_scenario() {
    let mut sim = sim_with_memory(64);
    let a = sim.create_process(spec("A", 0, 5, 0)).unwrap().pid;
    let b = sim.create_process(spec("B", 1, 3, 0)).unwrap().pid;
    sim.start(SchedulerConfig {
        algorithm: SchedulingAlgorithm::Sjf,
        preemptive: true,
        ..SchedulerConfig::default()
    })
    .unwrap();

    let mut e = ScriptedEntropy::default();
    step(&mut sim, &mut e).unwrap();
    assert_eq!(sim.running(), Some(a));
    assert_eq!(sim.process(b).unwrap().state, ProcessState::New);

    step(&mut sim, &mut e).unwrap();
    assert_eq!(sim.running(), Some(b));
    assert_eq!(sim.process(a).unwrap().state, ProcessState::Ready);
    assert_eq!(sim.process(a).unwrap().remaining_time, 4);
}

#[test]
fn test_run_metrics() {
    let mut sim = sim_with_memory(64);
    sim.create_process(spec("a", 0, 3, 0)).unwrap();
    sim.create_process(spec("b", 0, 2, 0)).unwrap();
    sim.start(SchedulerConfig::default()).unwrap();
    let mut e = ScriptedEntropy::default();
    while sim.status() == SimulationStatus::Running {
        step(&mut sim, &mut e).unwrap();
    }
    let m = sim.metrics();
    assert_eq!(m.throughput, 2);
    // a: wait 0, turnaround 3; b: wait 3, turnaround 5
    assert!((m.average_waiting_time - 1.5).abs() < 1e-9);
    assert!((m.average_turnaround_time - 4.0).abs() < 1e-9);
    assert!((m.cpu_utilization - 1.0).abs() < 1e-9);

    let gantt = sim.timeline().slices();
    assert_eq!(gantt.len(), 2);
    assert_eq!((gantt[1].start, gantt[1].end), (3, 5));
}

// ============================================================================
// Controller and timeline
// ============================================================================

#[test]
fn test_controller_cycle_keeps_only_run_events() {
    let mut sim = sim_with_memory(64);
    sim.create_process(spec("a", 0, 10, 0)).unwrap();
    let mut e = ScriptedEntropy::default();

    sim.start(SchedulerConfig::default()).unwrap();
    step(&mut sim, &mut e).unwrap();
    sim.pause().unwrap();
    sim.resume().unwrap();
    step(&mut sim, &mut e).unwrap();
    sim.stop().unwrap();

    assert_eq!(sim.status(), SimulationStatus::Idle);
    let events = sim.timeline().events();
    assert!(matches!(
        events[0].kind,
        EventKind::StatusChanged {
            from: SimulationStatus::Idle,
            to: SimulationStatus::Running
        }
    ));
    assert!(matches!(
        events.last().unwrap().kind,
        EventKind::StatusChanged {
            to: SimulationStatus::Idle,
            ..
        }
    ));
    assert!(!events
        .iter()
        .any(|ev| matches!(ev.kind, EventKind::ProcessCreated { .. } | EventKind::MemoryInitialized { .. })));
}

#[test]
fn test_reset_clears_timeline_and_tick() {
    let mut sim = sim_with_memory(64);
    sim.create_process(spec("a", 0, 10, 0)).unwrap();
    sim.start(SchedulerConfig::default()).unwrap();
    let mut e = ScriptedEntropy::default();
    for _ in 0..3 {
        step(&mut sim, &mut e).unwrap();
    }
    assert_eq!(sim.tick(), 3);

    sim.reset();
    assert_eq!(sim.tick(), 0);
    assert!(sim.timeline().is_empty());
    assert_eq!(sim.processes().count(), 0);
    assert!(sim.memory().is_initialized());
}

// ============================================================================
// Properties
// ============================================================================

fn run_tracking<F>(sim: &mut Simulation, rolls: Vec<f64>, mut check: F)
where
    F: FnMut(&Simulation),
{
    let mut e = ScriptedEntropy::new(rolls);
    let mut ticks = 0;
    while sim.status() == SimulationStatus::Running && ticks < 500 {
        step(sim, &mut e).unwrap();
        ticks += 1;
        check(sim);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_robin_skips_no_one_beyond_n_minus_one_quanta(
        quantum in 1u32..4,
        bursts in proptest::collection::vec(1u64..15, 1..6),
    ) {
        let mut sim = sim_with_memory(64);
        for (i, &burst) in bursts.iter().enumerate() {
            sim.create_process(spec(&format!("p{i}"), 0, burst, 0)).unwrap();
        }
        sim.start(SchedulerConfig {
            algorithm: SchedulingAlgorithm::RoundRobin,
            quantum,
            ..SchedulerConfig::default()
        }).unwrap();

        let n = bursts.len() as u64;
        let bound = (n - 1) * u64::from(quantum);
        let mut since_ran: BTreeMap<ProcessId, u64> = BTreeMap::new();
        let mut worst = 0;
        run_tracking(&mut sim, Vec::new(), |sim| {
            for p in sim.processes() {
                match p.state {
                    ProcessState::Running => { since_ran.insert(p.pid, 0); }
                    ProcessState::Ready => {
                        let gap = since_ran.entry(p.pid).or_insert(0);
                        *gap += 1;
                        worst = worst.max(*gap);
                    }
                    _ => {}
                }
            }
        });
        prop_assert!(worst <= bound, "waited {} ticks, bound {}", worst, bound);
        prop_assert_eq!(sim.status(), SimulationStatus::Completed);
    }

    #[test]
    fn preemptive_priority_never_runs_less_urgent(
        procs in proptest::collection::vec((0u64..8, 1u64..6, 0u32..6), 1..7),
        rolls in proptest::collection::vec(0.0f64..1.0, 0..40),
    ) {
        let mut sim = sim_with_memory(64);
        for (i, &(arrival, burst, priority)) in procs.iter().enumerate() {
            sim.create_process(spec(&format!("p{i}"), arrival, burst, priority)).unwrap();
        }
        sim.set_io_settings(IoSettings {
            io_probability: 0.25,
            io_duration_seconds: 1,
            auto_io_enabled: true,
        }).unwrap();
        sim.start(SchedulerConfig {
            algorithm: SchedulingAlgorithm::Priority,
            preemptive: true,
            ..SchedulerConfig::default()
        }).unwrap();

        let mut ok = true;
        run_tracking(&mut sim, rolls, |sim| {
            let Some(running) = sim.running().and_then(|pid| sim.process(pid)) else {
                return;
            };
            if sim.processes().any(|p| p.state == ProcessState::Ready && p.priority < running.priority) {
                ok = false;
            }
        });
        prop_assert!(ok);
    }

    #[test]
    fn timeline_ticks_never_decrease(
        algorithm in prop_oneof![
            Just(SchedulingAlgorithm::Fcfs),
            Just(SchedulingAlgorithm::Sjf),
            Just(SchedulingAlgorithm::RoundRobin),
            Just(SchedulingAlgorithm::Priority),
        ],
        procs in proptest::collection::vec((0u64..5, 1u64..5), 1..5),
    ) {
        let mut sim = sim_with_memory(64);
        for (i, &(arrival, burst)) in procs.iter().enumerate() {
            sim.create_process(spec(&format!("p{i}"), arrival, burst, 0)).unwrap();
        }
        sim.start(SchedulerConfig { algorithm, ..SchedulerConfig::default() }).unwrap();
        run_tracking(&mut sim, Vec::new(), |_| {});

        let events = sim.timeline().events();
        for pair in events.windows(2) {
            prop_assert!(pair[0].tick <= pair[1].tick);
            prop_assert!(pair[0].seq < pair[1].seq);
        }
    }
}
