//! # Aliasor
//!
//! Bidirectional translation between compressed lineage names (`BA.5.1`) and
//! fully expanded dotted names (`B.1.1.529.5.1`).
//!
//! ## Dealias
//! Replace the alias token with its expansion and keep every later segment.
//! Recombinant tokens (list-valued in the table) are left untouched.
//!
//! ## Realias
//! Names of at most [`ALIAS_DEPTH`] segments are already compressed. Longer
//! names have their first [`ALIAS_DEPTH`] segments swapped for the token
//! that expands to exactly that string. The empty name is the root split and
//! compresses to [`ROOT_SPLIT_LABEL`].

use crate::data::alias::{AliasEntry, AliasTable};
use crate::data::lineage;
use crate::error::{PangoError, Result};

/// Number of leading segments an alias token replaces when compressing
pub const ALIAS_DEPTH: usize = 4;

/// Compressed label for "no consensus below the A/B root split"
pub const ROOT_SPLIT_LABEL: &str = "A/B";

/// Alias table wrapper implementing dealias/realias
#[derive(Clone, Debug, Default)]
pub struct Aliasor {
    table: AliasTable,
}

impl Aliasor {
    pub fn new(table: AliasTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AliasTable {
        &self.table
    }

    /// Expand a compressed lineage name.
    ///
    /// Fails with `UnknownLineagePrefix` when the token is not in the table.
    pub fn dealias(&self, name: &str) -> Result<String> {
        let token = lineage::alias_token(name);
        let entry = self
            .table
            .get(token)
            .ok_or_else(|| PangoError::unknown_prefix(name, token))?;

        match entry {
            AliasEntry::Recombinant(_) => Ok(name.to_string()),
            AliasEntry::Expanded(expanded) => Ok(match lineage::suffix(name) {
                Some(rest) => format!("{}.{}", expanded, rest),
                None => expanded.clone(),
            }),
        }
    }

    /// Compress a dealiased lineage name.
    ///
    /// Fails with `AliasNotFound` when no token expands to the first
    /// [`ALIAS_DEPTH`] segments.
    pub fn realias(&self, dealiased: &str) -> Result<String> {
        if dealiased.is_empty() {
            return Ok(ROOT_SPLIT_LABEL.to_string());
        }

        let Some((head, tail)) = lineage::split_after(dealiased, ALIAS_DEPTH) else {
            return Ok(dealiased.to_string());
        };

        let alias = self
            .table
            .alias_for(head)
            .ok_or_else(|| PangoError::alias_not_found(dealiased, head))?;

        Ok(format!("{}.{}", alias, tail))
    }
}
