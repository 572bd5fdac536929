//! # Pango Nodes Library
//!
//! Reconcile PANGO lineage designations with the internal nodes of a
//! phylogeny.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: In-memory alias table, tree and designations
//! - `error`: Error types and result aliases
//! - `io`: File reading/writing (Newick, CSV/TSV, alias JSON, node JSON)
//! - `model`: Dealias/realias and consensus resolution
//! - `pipelines`: High-level workflow orchestration
//! - `utils`: Telemetry and thread pools

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use data::{AliasTable, Designations, NodeIdx, Tree};
pub use error::{PangoError, Result};
pub use model::{Aliasor, CandidateCounts, LineageCounts, NodeLineage};

pub use pipelines::{DesignationsPipeline, ReconcilePipeline, SubsamplePipeline};
