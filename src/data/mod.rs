//! # Data Module
//!
//! In-memory representations consumed by the resolver. This is the core
//! "Model" layer: everything here is loaded once and read-only afterwards.
//!
//! - `alias`: alias token -> expanded lineage table with a precomputed inverse
//! - `lineage`: zero-allocation helpers over dotted lineage names
//! - `tree`: arena-allocated phylogeny with `NodeIdx` newtype indices
//! - `designations`: leaf name -> lineage mapping

pub mod alias;
pub mod designations;
pub mod lineage;
pub mod tree;

// Re-export commonly used types
pub use alias::{AliasEntry, AliasTable};
pub use designations::Designations;
pub use tree::{Node, NodeIdx, Tree};
