//! # session
//!
//! Command-line front end for `session-core`.
//!
//! Exposed as a library so the command functions and config loading can be
//! driven from integration tests without spawning the binary.

pub mod cli;
pub mod config;
