//! Simulation invariants
//!
//! Runtime-checkable properties that must hold between commands and ticks.
//! Used by the property tests, and asserted by the runtime after every tick
//! in debug builds.
//!
//! # Invariants
//!
//! 1. **Memory partition**: blocks tile `[0, total)` with no gap or overlap,
//!    and no two neighbours are both free
//! 2. **Memory ownership**: every owned block belongs to a known process whose
//!    `memory_block` points at it, and vice versa; every segment matches the
//!    block of its process
//! 3. **Single CPU**: at most one process is Running and it is the one the
//!    controller tracks
//! 4. **Ready queue consistency**: the ready queue holds exactly the Ready
//!    processes, once each
//! 5. **Burst bounds**: remaining burst never exceeds the total burst
//! 6. **Timeline order**: sequence numbers strictly increase, ticks never
//!    decrease, and no event is stamped after the current tick

use std::collections::BTreeSet;

use crate::state::Simulation;
use crate::types::ProcessState;

/// An invariant violation with details.
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// What went wrong
    pub description: String,
}

fn violation(invariant: &'static str, description: String) -> InvariantViolation {
    InvariantViolation {
        invariant,
        description,
    }
}

/// Check all simulation invariants. Empty when everything holds.
pub fn check_all_invariants(sim: &Simulation) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_memory_partition(sim));
    violations.extend(check_memory_ownership(sim));
    violations.extend(check_single_cpu(sim));
    violations.extend(check_ready_queue(sim));
    violations.extend(check_burst_bounds(sim));
    violations.extend(check_timeline_order(sim));

    violations
}

/// Panic listing every violation if any invariant fails.
pub fn assert_invariants(sim: &Simulation) {
    let violations = check_all_invariants(sim);
    assert!(
        violations.is_empty(),
        "invariants violated at tick {}: {:?}",
        sim.tick(),
        violations
    );
}

fn check_memory_partition(sim: &Simulation) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let memory = sim.memory();
    if !memory.is_initialized() {
        return violations;
    }

    let mut cursor = 0;
    for block in memory.blocks() {
        if block.offset != cursor {
            violations.push(violation(
                "memory_partition",
                format!("block at {} should start at {}", block.offset, cursor),
            ));
        }
        if block.size == 0 {
            violations.push(violation(
                "memory_partition",
                format!("empty block at {}", block.offset),
            ));
        }
        cursor = block.end();
    }
    if cursor != memory.total_size() {
        violations.push(violation(
            "memory_partition",
            format!("blocks cover {} of {}", cursor, memory.total_size()),
        ));
    }
    for pair in memory.blocks().windows(2) {
        if pair[0].is_free() && pair[1].is_free() {
            violations.push(violation(
                "memory_partition",
                format!("uncoalesced free blocks at {} and {}", pair[0].offset, pair[1].offset),
            ));
        }
    }
    violations
}

fn check_memory_ownership(sim: &Simulation) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut owners = BTreeSet::new();

    for block in sim.memory().blocks() {
        let Some(pid) = block.owner else { continue };
        if !owners.insert(pid) {
            violations.push(violation(
                "memory_ownership",
                format!("process {} owns more than one block", pid.0),
            ));
        }
        match sim.process(pid) {
            None => violations.push(violation(
                "memory_ownership",
                format!("block at {} owned by unknown process {}", block.offset, pid.0),
            )),
            Some(p) if p.memory_block != Some(block.offset) => violations.push(violation(
                "memory_ownership",
                format!(
                    "process {} records block {:?}, owns {}",
                    pid.0, p.memory_block, block.offset
                ),
            )),
            Some(_) => {}
        }
    }

    for segment in sim.memory().segments() {
        let matches = sim.memory().block_of(segment.process_id).is_some_and(|b| {
            b.offset == segment.base_address && b.size == segment.limit
        });
        if !matches {
            violations.push(violation(
                "memory_ownership",
                format!(
                    "segment {} does not match a block of process {}",
                    segment.segment_id, segment.process_id.0
                ),
            ));
        }
    }

    for p in sim.processes() {
        if p.memory_block.is_some() && !owners.contains(&p.pid) {
            violations.push(violation(
                "memory_ownership",
                format!("process {} points at a block it does not own", p.pid.0),
            ));
        }
    }
    violations
}

fn check_single_cpu(sim: &Simulation) -> Vec<InvariantViolation> {
    let running: Vec<_> = sim
        .processes()
        .filter(|p| p.state == ProcessState::Running)
        .map(|p| p.pid)
        .collect();

    let consistent = match (running.as_slice(), sim.running()) {
        ([], None) => true,
        ([pid], Some(tracked)) => *pid == tracked,
        _ => false,
    };
    if consistent {
        Vec::new()
    } else {
        vec![violation(
            "single_cpu",
            format!("running processes {:?}, tracked {:?}", running, sim.running()),
        )]
    }
}

fn check_ready_queue(sim: &Simulation) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let queue: Vec<_> = sim.scheduler().ready_queue().collect();
    let unique: BTreeSet<_> = queue.iter().copied().collect();
    if unique.len() != queue.len() {
        violations.push(violation(
            "ready_queue",
            format!("duplicate entries in {:?}", queue),
        ));
    }

    let ready: BTreeSet<_> = sim
        .processes()
        .filter(|p| p.state == ProcessState::Ready)
        .map(|p| p.pid)
        .collect();
    if ready != unique {
        violations.push(violation(
            "ready_queue",
            format!("queue {:?} but Ready set {:?}", queue, ready),
        ));
    }
    violations
}

fn check_burst_bounds(sim: &Simulation) -> Vec<InvariantViolation> {
    sim.processes()
        .filter(|p| p.remaining_time > p.burst_time)
        .map(|p| {
            violation(
                "burst_bounds",
                format!(
                    "process {} has {} remaining of {}",
                    p.pid.0, p.remaining_time, p.burst_time
                ),
            )
        })
        .collect()
}

fn check_timeline_order(sim: &Simulation) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let events = sim.timeline().events();
    for pair in events.windows(2) {
        if pair[1].seq <= pair[0].seq || pair[1].tick < pair[0].tick {
            violations.push(violation(
                "timeline_order",
                format!("event {} out of order after {}", pair[1].seq, pair[0].seq),
            ));
        }
    }
    if let Some(last) = events.last() {
        if last.tick > sim.tick() {
            violations.push(violation(
                "timeline_order",
                format!("event stamped {} ahead of tick {}", last.tick, sim.tick()),
            ));
        }
    }
    violations
}
