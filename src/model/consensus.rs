//! # Consensus Lineage Resolution
//!
//! For one internal node, find the most specific dealiased lineage that every
//! designated leaf below it descends from.
//!
//! ## Algorithm
//! 1. **Lineage counts:** tally the (dealiased) lineage of each descendant leaf.
//! 2. **Candidate counts:** add each lineage's count to every one of its dotted
//!    prefixes, the empty prefix included. `candidates[""]` is then the number
//!    of designated leaves.
//! 3. **Consensus:** among prefixes whose count equals that total, take the
//!    last one in insertion order. Prefixes are inserted shortest-first, and
//!    every qualifying prefix is a prefix of the first lineage seen, so the
//!    last qualifying entry is the deepest common ancestor.
//! 4. **Realias** the winner back to compressed form.
//!
//! Counts are insertion-ordered (`IndexMap`) so step 3 is deterministic.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::data::designations::Designations;
use crate::data::lineage;
use crate::data::tree::{NodeIdx, Tree};
use crate::error::{PangoError, Result};
use crate::model::aliasor::Aliasor;

/// Dealiased lineage -> number of leaves designated exactly that lineage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineageCounts {
    counts: IndexMap<String, usize>,
}

impl LineageCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` leaves of `lineage`
    #[inline]
    pub fn add(&mut self, lineage: &str, n: usize) {
        match self.counts.get_mut(lineage) {
            Some(c) => *c += n,
            None => {
                self.counts.insert(lineage.to_string(), n);
            }
        }
    }

    /// Fold another node's counts into this one, preserving first-seen order
    pub fn merge(&mut self, other: &LineageCounts) {
        for (lineage, &n) in &other.counts {
            self.add(lineage, n);
        }
    }

    /// Fold another node's counts in by value, preserving first-seen order
    pub fn absorb(&mut self, other: LineageCounts) {
        if self.counts.is_empty() {
            self.counts = other.counts;
            return;
        }
        for (lineage, n) in other.counts {
            *self.counts.entry(lineage).or_insert(0) += n;
        }
    }

    pub fn get(&self, lineage: &str) -> Option<usize> {
        self.counts.get(lineage).copied()
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Number of distinct lineages
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(l, &n)| (l.as_str(), n))
    }
}

/// Dotted prefix -> number of leaves whose lineage starts with it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateCounts {
    counts: IndexMap<String, usize>,
}

impl CandidateCounts {
    pub fn get(&self, prefix: &str) -> Option<usize> {
        self.counts.get(prefix).copied()
    }

    /// Count under the empty prefix: every designated leaf
    pub fn total(&self) -> Option<usize> {
        self.get("")
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate `(prefix, count)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(p, &n)| (p.as_str(), n))
    }

    /// `prefix=count` pairs joined by `, `, for diagnostics
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, (prefix, n)) in self.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "'{}'={}", prefix, n);
        }
        if out.is_empty() {
            out.push_str("<empty>");
        }
        out
    }
}

/// Tally the lineages of `leaves`.
///
/// Leaves without a designation are skipped and returned separately so the
/// caller can report them.
pub fn lineage_counts<'a, I>(leaves: I, designations: &Designations) -> (LineageCounts, Vec<&'a str>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = LineageCounts::new();
    let mut missing = Vec::new();
    for leaf in leaves {
        match designations.get(leaf) {
            Some(lineage) => counts.add(lineage, 1),
            None => missing.push(leaf),
        }
    }
    (counts, missing)
}

/// Spread every lineage count over all of its dotted prefixes
pub fn candidate_lineage_counts(lineages: &LineageCounts) -> CandidateCounts {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for (name, n) in lineages.iter() {
        for prefix in lineage::prefixes(name) {
            match counts.get_mut(prefix) {
                Some(c) => *c += n,
                None => {
                    counts.insert(prefix.to_string(), n);
                }
            }
        }
    }
    CandidateCounts { counts }
}

/// Deepest prefix shared by every counted leaf (dealiased form).
///
/// `node` is only used to label the `NoConsensusFound` error.
pub fn consensus_lineage(node: &str, candidates: &CandidateCounts) -> Result<String> {
    let no_consensus = || PangoError::NoConsensusFound {
        node: node.to_string(),
        candidates: candidates.render(),
    };

    let total = candidates.total().ok_or_else(no_consensus)?;
    candidates
        .iter()
        .filter(|&(_, n)| n == total)
        .last()
        .map(|(prefix, _)| prefix.to_string())
        .ok_or_else(no_consensus)
}

/// Compressed consensus lineage for a node whose counts are already known
pub fn resolve_counts(node: &str, counts: &LineageCounts, aliasor: &Aliasor) -> Result<String> {
    let candidates = candidate_lineage_counts(counts);
    let consensus = consensus_lineage(node, &candidates)?;
    aliasor.realias(&consensus)
}

/// Consensus assignment for one internal node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLineage {
    pub node: String,
    pub lineage: String,
}

/// Resolve a single node by walking its subtree.
///
/// `designations` must already be dealiased. For whole trees prefer
/// `pipelines::reconcile::reconcile_tree`, which shares one post-order pass
/// across all nodes.
pub fn resolve_node(
    tree: &Tree,
    node: NodeIdx,
    designations: &Designations,
    aliasor: &Aliasor,
) -> Result<NodeLineage> {
    let name = tree
        .name(node)
        .ok_or_else(|| PangoError::invalid_data(format!("node {} has no name", node.0)))?;

    let (counts, missing) = lineage_counts(tree.descendant_leaf_names(node), designations);
    if !missing.is_empty() {
        tracing::debug!(node = name, n_missing = missing.len(), "leaves without designation");
    }

    let lineage = resolve_counts(name, &counts, aliasor)?;
    Ok(NodeLineage {
        node: name.to_string(),
        lineage,
    })
}
