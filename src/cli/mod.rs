//! Command line interface module
//!
//! This module provides the entry point for parsing command-line arguments and running a sync.
//! It includes argument parsing, validation, and the runner that drives one run end to end.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::{RunOutcome, Runner, SyncPlan};
