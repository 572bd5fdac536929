//! # Pipeline Module
//!
//! High-level orchestration of the three subcommands.
//! Coordinates I/O, dealiasing and the consensus resolver.

pub mod designations;
pub mod reconcile;
pub mod subsample;

pub use designations::DesignationsPipeline;
pub use reconcile::{reconcile_tree, NodeFailure, NodeOutcome, ReconcilePipeline, ReconcileReport};
pub use subsample::{SampleParams, SubsamplePipeline};
