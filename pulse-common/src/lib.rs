//! # Pulse Common Library
//!
//! Shared code for Pulse streaming services including:
//! - Server-Sent Events envelope and wire encoder
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod sse;

pub use config::{LoadedConfig, ServiceConfig};
pub use error::{Error, Result};
pub use sse::SseEvent;
