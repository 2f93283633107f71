//! Subcommands.

pub mod batch;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod process;
