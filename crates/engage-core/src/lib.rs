//! Ranking and timing primitives for engagebot.
//!
//! - [`scoring`]: logistic curves that turn raw post and account signals into
//!   bounded, comparable scores.
//! - [`scheduler`]: seeded random gating and delays so automated actions do
//!   not fire on a fixed cadence.

pub mod scheduler;
pub mod scoring;

pub use scheduler::{
    Decision, RecordedSleep, RunPolicy, Scheduler, Sleep, ThreadSleep, MAX_PAUSE_SECS,
};
pub use scoring::{
    age_in_days, created_at_score, followed_to_following_ratio, rank_by, round2, scaled_sigmoid,
    sigmoid, PostSignals, ScoringProfile, SigmoidCurve, UserSignals,
};
