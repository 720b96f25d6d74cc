//! Core types for gifplug
//!
//! This crate provides the foundational types shared by the decode engine,
//! the decode context and the plugin boundary: the unified status codes,
//! error handling, configuration and logging infrastructure.

pub mod config;
pub mod error;
pub mod logging;
pub mod status;

pub use config::Config;
pub use error::{GifError, Result};
pub use status::Status;
