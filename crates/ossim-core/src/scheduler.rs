//! CPU scheduler
//!
//! Keeps the ready queue in the order processes became Ready and picks the
//! next process to run according to the configured [`SchedulingAlgorithm`].
//! The algorithms are a closed set, so selection is a `match` rather than a
//! trait object per policy.
//!
//! | Algorithm | Key (smallest wins) | Preempts |
//! |-----------|---------------------|----------|
//! | FCFS | arrival, pid | never |
//! | SJF | remaining, arrival, pid | when `preemptive` and a Ready job is strictly shorter |
//! | Round Robin | queue position | when the quantum is used up and someone else is Ready |
//! | Priority | urgency, arrival, pid | when `preemptive` and a Ready job is strictly more urgent |

use std::collections::{BTreeMap, VecDeque};

use crate::error::SimResult;
use crate::timeline::TransitionReason;
use crate::types::{PriorityOrder, Process, ProcessId, SchedulerConfig, SchedulingAlgorithm};

/// Ready queue plus selection policy.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    ready: VecDeque<ProcessId>,
}

impl Scheduler {
    /// Scheduler with an empty ready queue.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ready: VecDeque::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Replace the configuration. Invalid configurations are rejected here,
    /// so selection never sees one.
    pub fn set_config(&mut self, config: SchedulerConfig) -> SimResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Append to the back of the ready queue.
    pub fn enqueue(&mut self, pid: ProcessId) {
        if !self.ready.contains(&pid) {
            self.ready.push_back(pid);
        }
    }

    /// Remove from the ready queue.
    pub fn remove(&mut self, pid: ProcessId) {
        self.ready.retain(|&p| p != pid);
    }

    /// Empty the ready queue.
    pub fn clear(&mut self) {
        self.ready.clear();
    }

    /// Ready processes, in queue order.
    pub fn ready_queue(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.ready.iter().copied()
    }

    /// Pick the next process to run, without changing any state.
    pub fn select(&self, processes: &BTreeMap<ProcessId, Process>) -> Option<ProcessId> {
        let mut ready = self.ready.iter().filter_map(|pid| processes.get(pid));

        let chosen = match self.config.algorithm {
            SchedulingAlgorithm::RoundRobin => ready.next(),
            SchedulingAlgorithm::Fcfs => ready.min_by_key(|p| (p.arrival_time, p.pid)),
            SchedulingAlgorithm::Sjf => {
                ready.min_by_key(|p| (p.remaining_time, p.arrival_time, p.pid))
            }
            SchedulingAlgorithm::Priority => {
                ready.min_by_key(|p| (self.urgency_key(p), p.arrival_time, p.pid))
            }
        };
        chosen.map(|p| p.pid)
    }

    /// Whether `running` must give up the CPU before this tick's selection.
    pub fn preemption(
        &self,
        running: &Process,
        processes: &BTreeMap<ProcessId, Process>,
    ) -> Option<TransitionReason> {
        let mut ready = self.ready.iter().filter_map(|pid| processes.get(pid));

        match self.config.algorithm {
            SchedulingAlgorithm::Fcfs => None,
            SchedulingAlgorithm::RoundRobin => (running.accounting.quantum_used
                >= self.config.quantum
                && !self.ready.is_empty())
            .then_some(TransitionReason::QuantumExpired),
            SchedulingAlgorithm::Sjf if self.config.preemptive => ready
                .any(|p| p.remaining_time < running.remaining_time)
                .then_some(TransitionReason::Preempted),
            SchedulingAlgorithm::Priority if self.config.preemptive => ready
                .any(|p| {
                    self.config
                        .priority_order
                        .more_urgent(p.priority, running.priority)
                })
                .then_some(TransitionReason::Preempted),
            SchedulingAlgorithm::Sjf | SchedulingAlgorithm::Priority => None,
        }
    }

    /// Sort key where smaller means more urgent, whatever the convention.
    fn urgency_key(&self, p: &Process) -> i64 {
        match self.config.priority_order {
            PriorityOrder::LowerFirst => i64::from(p.priority),
            PriorityOrder::HigherFirst => -i64::from(p.priority),
        }
    }
}
