//! I/O and interruption subsystem
//!
//! Two ways a process leaves Running besides finishing or being preempted:
//! a probability roll after each executed tick, and interruptions submitted
//! from outside. Rolls come from an [`Entropy`] source so tests can script
//! them; interruptions wait in an [`InterruptQueue`] until the next tick.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Interruption, IoSettings};

/// Source of uniform rolls in `[0, 1)`.
pub trait Entropy: Send + Sync {
    /// Next roll.
    fn roll(&mut self) -> f64;
}

/// Seeded PRNG; the same seed replays the same I/O pattern.
pub struct SeededEntropy {
    rng: StdRng,
}

impl SeededEntropy {
    /// Generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Entropy for SeededEntropy {
    fn roll(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Replays a fixed sequence of rolls, then repeats the last one
/// (or 1.0, which never triggers I/O, when empty).
#[derive(Clone, Debug, Default)]
pub struct ScriptedEntropy {
    rolls: VecDeque<f64>,
    last: Option<f64>,
}

impl ScriptedEntropy {
    /// Script the given rolls.
    pub fn new(rolls: impl IntoIterator<Item = f64>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            last: None,
        }
    }
}

impl Entropy for ScriptedEntropy {
    fn roll(&mut self) -> f64 {
        match self.rolls.pop_front() {
            Some(r) => {
                self.last = Some(r);
                r
            }
            None => self.last.unwrap_or(1.0),
        }
    }
}

/// Decide whether the process that just executed starts an I/O burst.
/// No roll is drawn when auto-I/O is off.
pub fn roll_for_io(settings: &IoSettings, entropy: &mut dyn Entropy) -> bool {
    if !settings.auto_io_enabled || settings.io_probability <= 0.0 {
        return false;
    }
    entropy.roll() < settings.io_probability
}

/// FIFO of interruptions awaiting the next tick.
#[derive(Clone, Debug, Default)]
pub struct InterruptQueue {
    pending: VecDeque<Interruption>,
}

impl InterruptQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue behind earlier submissions.
    pub fn submit(&mut self, interruption: Interruption) {
        self.pending.push_back(interruption);
    }

    /// Take everything in submission order.
    pub fn drain(&mut self) -> Vec<Interruption> {
        self.pending.drain(..).collect()
    }

    /// Pending interruptions, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Interruption> {
        self.pending.iter()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
