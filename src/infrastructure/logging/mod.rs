//! Structured logging on top of `tracing`: JSON or pretty output to stdout.
//!
//! The teacher's file-rotation, secret-scrubbing, and audit-trail layers
//! are not carried forward — see DESIGN.md for why.

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat};
pub use logger::LoggerImpl;
