//! # Alias Table
//!
//! Mapping from alias tokens (`BA`, `Q`, `XBB`) to the dotted lineage each one
//! stands for. Loaded once at startup and read-only afterwards.
//!
//! The on-disk format is the pango-designation `alias_key.json`: a JSON object
//! whose values are either a string (the expansion) or a list of parent
//! lineages (a recombinant, which is never expanded).

use std::collections::HashMap;
use std::io::Read;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{PangoError, Result};

/// Root tokens that always map to themselves
pub const ROOT_TOKENS: [&str; 2] = ["A", "B"];

/// A single alias table value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasEntry {
    /// Token stands for this fully expanded lineage
    Expanded(String),
    /// Recombinant token with several parents; never dealiased
    Recombinant(Vec<String>),
}

impl AliasEntry {
    /// Expansion string, or `None` for recombinants
    pub fn expansion(&self) -> Option<&str> {
        match self {
            AliasEntry::Expanded(s) => Some(s),
            AliasEntry::Recombinant(_) => None,
        }
    }

    pub fn is_recombinant(&self) -> bool {
        matches!(self, AliasEntry::Recombinant(_))
    }
}

/// Immutable alias table with a precomputed inverse
#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    /// Token -> entry, in file order
    entries: IndexMap<String, AliasEntry>,
    /// Expansion -> token (first token in file order wins)
    inverse: HashMap<String, String>,
}

impl AliasTable {
    /// Build a table from raw entries, pinning `A` and `B` to themselves
    pub fn new(mut entries: IndexMap<String, AliasEntry>) -> Self {
        for token in ROOT_TOKENS {
            entries.insert(token.to_string(), AliasEntry::Expanded(token.to_string()));
        }

        let mut inverse: HashMap<String, String> = HashMap::with_capacity(entries.len());
        for (token, entry) in &entries {
            let Some(expanded) = entry.expansion() else {
                continue;
            };
            if expanded.is_empty() {
                continue;
            }
            match inverse.get(expanded) {
                Some(existing) => {
                    tracing::warn!(
                        expansion = %expanded,
                        kept = %existing,
                        ignored = %token,
                        "alias table is not injective; keeping first token"
                    );
                }
                None => {
                    inverse.insert(expanded.to_string(), token.clone());
                }
            }
        }

        Self { entries, inverse }
    }

    /// Parse an `alias_key.json` document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: IndexMap<String, AliasEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    /// Parse an `alias_key.json` document from a reader
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let entries: IndexMap<String, AliasEntry> = serde_json::from_reader(reader)?;
        Ok(Self::new(entries))
    }

    /// Build from `(token, expansion)` string pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), AliasEntry::Expanded(v.to_string())))
            .collect();
        Self::new(entries)
    }

    /// Add a recombinant token. Recombinants never enter the inverse map.
    pub fn with_recombinant(mut self, token: &str, parents: &[&str]) -> Self {
        self.entries.insert(
            token.to_string(),
            AliasEntry::Recombinant(parents.iter().map(|p| p.to_string()).collect()),
        );
        self
    }

    /// Look up an alias token
    #[inline]
    pub fn get(&self, token: &str) -> Option<&AliasEntry> {
        self.entries.get(token)
    }

    /// Reverse lookup: the token whose expansion is exactly `expanded`
    #[inline]
    pub fn alias_for(&self, expanded: &str) -> Option<&str> {
        self.inverse.get(expanded).map(String::as_str)
    }

    /// Number of tokens (including the pinned roots)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AliasEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check that every expansion starts with a root or recombinant token.
    ///
    /// One lookup level must be enough to dealias any name. Recombinant
    /// tokens (`XBB`) qualify because dealias passes them through as-is.
    pub fn validate(&self) -> Result<()> {
        for (token, entry) in self.iter() {
            let Some(expanded) = entry.expansion() else {
                continue;
            };
            if ROOT_TOKENS.contains(&token) {
                continue;
            }
            let head = crate::data::lineage::alias_token(expanded);
            if ROOT_TOKENS.contains(&head) {
                continue;
            }
            match self.get(head) {
                Some(AliasEntry::Recombinant(_)) => {}
                Some(AliasEntry::Expanded(_)) => {
                    return Err(PangoError::invalid_data(format!(
                        "alias '{}' expands to '{}', which is itself aliased",
                        token, expanded
                    )));
                }
                None => {
                    return Err(PangoError::invalid_data(format!(
                        "alias '{}' expands to '{}', whose prefix '{}' is not in the table",
                        token, expanded, head
                    )));
                }
            }
        }
        Ok(())
    }
}
