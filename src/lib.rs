//! ctxmon: context usage gauge for coding-assistant status lines
//!
//! `ctxmon status` is run on every status render and prints a one-line
//! gauge; `ctxmon daemon` runs in the background and keeps topic
//! segments up to date.

pub mod config;
pub mod daemon;
pub mod reporter;
