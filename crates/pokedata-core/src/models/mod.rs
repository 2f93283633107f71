//! Data models and configuration.

pub mod card;
pub mod config;
