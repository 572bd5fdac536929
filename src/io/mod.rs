//! # I/O Module
//!
//! File reading/writing boundaries. Converts between disk formats (Newick,
//! CSV/TSV designations, alias JSON, node JSON) and the in-memory types in
//! `data`.

pub mod aliases;
pub mod designations;
pub mod newick;
pub mod output;

pub use aliases::read_alias_table;
pub use designations::{read_designations, DesignationColumns};
pub use newick::{parse_newick, read_newick};
pub use output::{NodeData, OutputFormat};
