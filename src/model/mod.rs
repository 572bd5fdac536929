//! # Model Module
//!
//! The lineage algorithms.
//!
//! - `aliasor`: dealias/realias between compressed and expanded lineage names
//! - `consensus`: per-node lineage counts, prefix candidate counts and the
//!   deepest-common-prefix consensus
//!
//! Both are pure functions over read-only inputs (`AliasTable`,
//! `Designations`, `Tree`), so callers may run them from any number of rayon
//! workers without synchronization.

pub mod aliasor;
pub mod consensus;

pub use aliasor::{Aliasor, ALIAS_DEPTH, ROOT_SPLIT_LABEL};
pub use consensus::{
    candidate_lineage_counts, consensus_lineage, lineage_counts, resolve_counts, resolve_node,
    CandidateCounts, LineageCounts, NodeLineage,
};
