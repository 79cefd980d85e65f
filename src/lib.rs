//! engagebot: social engagement automation around a crash-safe follow
//! history.
//!
//! The follow history and its storage live in `follow-ledger`, scoring and
//! randomized timing in `engage-core`. This crate wires them to a
//! [`bot::SocialApi`] implementation, loads configuration and provides the
//! admin CLI.

pub mod bot;
pub mod config;
pub mod ledger_cli;
pub mod logging;

pub use bot::{Bot, BotConfig, SocialApi};
pub use config::Config;
