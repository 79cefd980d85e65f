//! Randomized "organic" timing around units of work.
//!
//! A [`Scheduler`] owns the random source and the sleeping strategy, so every
//! skip decision, delay and coin flip of a run can be reproduced from a seed
//! and observed without actually blocking.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Longest pause [`Scheduler::pause_between`] will sleep, one day.
pub const MAX_PAUSE_SECS: f64 = 86_400.0;

/// Blocking strategy for scheduler delays.
pub trait Sleep {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays instead of blocking (tests, dry runs).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedSleep {
    pub delays: Vec<Duration>,
}

impl RecordedSleep {
    pub fn total(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Sleep for RecordedSleep {
    fn sleep(&mut self, duration: Duration) {
        self.delays.push(duration);
    }
}

/// Skip probability and delay bound for one gated operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunPolicy {
    /// Chance in `[0, 1]` that the operation is skipped entirely.
    pub do_nothing_probability: f64,
    /// Exclusive upper bound of the whole-second delay before running.
    pub max_delay_secs: u64,
}

impl RunPolicy {
    /// Never skip, never wait.
    pub const ALWAYS: RunPolicy = RunPolicy::new(0.0, 0);

    pub const fn new(do_nothing_probability: f64, max_delay_secs: u64) -> Self {
        Self {
            do_nothing_probability,
            max_delay_secs,
        }
    }
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self::new(0.5, 60)
    }
}

/// Outcome of the skip draw for one invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Skip { draw: f64 },
    Run { draw: f64, delay: Duration },
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::Skip { .. } => None,
            Self::Run { delay, .. } => Some(*delay),
        }
    }
}

pub struct Scheduler<R = StdRng, S = ThreadSleep> {
    rng: R,
    sleeper: S,
}

impl Scheduler<StdRng, ThreadSleep> {
    /// Entropy-seeded scheduler that really sleeps.
    pub fn new() -> Self {
        Self::from_parts(StdRng::from_entropy(), ThreadSleep)
    }

    /// Deterministic scheduler for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::from_parts(StdRng::seed_from_u64(seed), ThreadSleep)
    }
}

impl Default for Scheduler<StdRng, ThreadSleep> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng, S: Sleep> Scheduler<R, S> {
    pub fn from_parts(rng: R, sleeper: S) -> Self {
        Self { rng, sleeper }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Draw the skip decision and, when running, the delay.
    pub fn decide(&mut self, policy: &RunPolicy) -> Decision {
        let draw: f64 = self.rng.gen();
        if draw < policy.do_nothing_probability {
            return Decision::Skip { draw };
        }
        let secs = if policy.max_delay_secs == 0 {
            0
        } else {
            self.rng.gen_range(0..policy.max_delay_secs)
        };
        Decision::Run {
            draw,
            delay: Duration::from_secs(secs),
        }
    }

    /// Decide, log and sleep through the delay. Returns whether the caller
    /// should go ahead.
    pub fn gate(&mut self, policy: &RunPolicy) -> bool {
        match self.decide(policy) {
            Decision::Skip { .. } => {
                info!("Doing nothing this time");
                false
            }
            Decision::Run { delay, .. } => {
                info!("Waiting {} seconds", delay.as_secs());
                self.sleeper.sleep(delay);
                true
            }
        }
    }

    /// Skip `op` with the policy's probability; otherwise wait a random delay
    /// and run it. Returns `None` when skipped.
    pub fn maybe_run<T, F>(&mut self, policy: &RunPolicy, op: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        if self.gate(policy) {
            Some(op())
        } else {
            None
        }
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }

    /// Uniform integer in `lo..=hi`; `lo` when the range is empty.
    pub fn count_between(&mut self, lo: usize, hi: usize) -> usize {
        if hi <= lo {
            lo
        } else {
            self.rng.gen_range(lo..=hi)
        }
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Sleep a uniform real number of seconds in `lo..hi` and return it.
    /// Bounds are clamped into `0..=MAX_PAUSE_SECS`.
    pub fn pause_between(&mut self, lo_secs: f64, hi_secs: f64) -> Duration {
        let lo = lo_secs.clamp(0.0, MAX_PAUSE_SECS);
        let hi = hi_secs.clamp(0.0, MAX_PAUSE_SECS);
        let secs = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO);
        self.sleeper.sleep(delay);
        delay
    }
}
