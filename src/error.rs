//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pango-nodes operations
#[derive(Error, Debug)]
pub enum PangoError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Alias table or node JSON (de)serialization failures
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Designations table parsing failures
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Leading alias token of a lineage is not in the alias table
    #[error("Unknown lineage prefix '{prefix}' in lineage '{lineage}'")]
    UnknownLineagePrefix { lineage: String, prefix: String },

    /// No alias expands to the first four segments of a dealiased lineage
    #[error("No alias found for '{prefix}' (while compressing '{lineage}')")]
    AliasNotFound { lineage: String, prefix: String },

    /// No prefix covers every designated leaf below a node
    #[error("No consensus lineage for node '{node}' (candidates: {candidates})")]
    NoConsensusFound { node: String, candidates: String },

    /// Malformed Newick text
    #[error("Newick error at byte {offset}: {message}")]
    Newick { offset: usize, message: String },

    /// Two clades in the tree carry the same label
    #[error("Duplicate node name: {name}")]
    DuplicateNodeName { name: String },

    /// Designations table lacks a required column
    #[error("Column '{column}' not found in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// Invalid data errors (bad alias entries, empty lineage names)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },
}

/// Type alias for Results using PangoError
pub type Result<T> = std::result::Result<T, PangoError>;

impl PangoError {
    /// Create an unknown-prefix error
    pub fn unknown_prefix(lineage: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::UnknownLineagePrefix {
            lineage: lineage.into(),
            prefix: prefix.into(),
        }
    }

    /// Create an alias-not-found error
    pub fn alias_not_found(lineage: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::AliasNotFound {
            lineage: lineage.into(),
            prefix: prefix.into(),
        }
    }

    /// Create a Newick parse error
    pub fn newick(offset: usize, message: impl Into<String>) -> Self {
        Self::Newick {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short machine-friendly tag, used in the failures report
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "Io",
            Self::Json(_) => "Json",
            Self::Csv(_) => "Csv",
            Self::UnknownLineagePrefix { .. } => "UnknownLineagePrefix",
            Self::AliasNotFound { .. } => "AliasNotFound",
            Self::NoConsensusFound { .. } => "NoConsensusFound",
            Self::Newick { .. } => "Newick",
            Self::DuplicateNodeName { .. } => "DuplicateNodeName",
            Self::MissingColumn { .. } => "MissingColumn",
            Self::InvalidData { .. } => "InvalidData",
            Self::Config { .. } => "Config",
            Self::FileNotFound { .. } => "FileNotFound",
        }
    }
}
