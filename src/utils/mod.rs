//! # Utilities Module
//!
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `telemetry`: Atomic progress counters and the heartbeat thread
//! - `threading`: Rayon thread pool configuration

pub mod telemetry;
pub mod threading;
