//! Automatic-mode ticker
//!
//! One tokio task per run. Each interval it takes the state lock and ticks
//! only if its run is still the current one, the simulation is Running and
//! the mode is automatic. `stop` bumps the epoch under the same lock, so a
//! tick that was waiting for the lock sees the new epoch and exits without
//! touching the state. Debug builds assert the engine invariants after
//! every tick.

use std::sync::Arc;
use std::time::Duration;

use ossim_core::{assert_invariants, step, SimulationStatus};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::controller::Inner;

/// Spawn the ticker for run `epoch`.
pub(crate) fn spawn(inner: Arc<RwLock<Inner>>, epoch: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let mut guard = inner.write().await;
            if guard.epoch != epoch {
                tracing::debug!(epoch, "ticker superseded");
                break;
            }
            match guard.sim.status() {
                SimulationStatus::Running if guard.sim.mode().is_automatic() => {}
                SimulationStatus::Running | SimulationStatus::Paused => continue,
                SimulationStatus::Idle | SimulationStatus::Completed => break,
            }

            let Inner { sim, entropy, .. } = &mut *guard;
            match step(sim, entropy.as_mut()) {
                Ok(report) => {
                    if cfg!(debug_assertions) {
                        assert_invariants(sim);
                    }
                    tracing::debug!(tick = report.tick, ran = ?report.ran, events = report.events, "tick");
                    if report.completed {
                        tracing::info!(tick = report.tick, "all processes terminated");
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "automatic tick failed");
                    break;
                }
            }
        }
    })
}
