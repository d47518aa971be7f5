//! # replyscope common library
//!
//! Shared code for the replyscope pipeline:
//! - Error type and `Result` alias
//! - Configuration loading (TOML bootstrap + resolution order)
//! - Pipeline events and the observer surface used for status reporting

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
