//! # Reconcile Pipeline
//!
//! Assign a consensus lineage to every internal node of a tree.
//!
//! ## Algorithm Overview
//! 1. **Load** the alias table, tree and designations.
//! 2. **Dealias** every designation once.
//! 3. **Count** lineages per subtree in a single post-order pass: each internal
//!    node absorbs its children's tables (moved, not copied), takes its
//!    candidate counts and consensus, then hands its table up to its parent.
//! 4. **Realias** every consensus in parallel (rayon). Each node yields its
//!    own [`NodeOutcome`]; one failing node never stops the others.
//! 5. **Report** resolved nodes, failed nodes and leaves missing from the
//!    designations, then write the output.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info_span, instrument};

use crate::config::ReconcileArgs;
use crate::data::designations::Designations;
use crate::data::tree::{NodeIdx, Tree};
use crate::error::{PangoError, Result};
use crate::io::aliases::read_alias_table;
use crate::io::designations::read_designations;
use crate::io::newick::read_newick;
use crate::io::output::{write_assignments, write_failures_csv};
use crate::model::aliasor::Aliasor;
use crate::model::consensus::{candidate_lineage_counts, consensus_lineage, LineageCounts, NodeLineage};
use crate::utils::telemetry::{Stage, TelemetryBlackboard};

/// A node that could not be resolved
#[derive(Debug)]
pub struct NodeFailure {
    pub node: String,
    pub error: PangoError,
}

/// Result of resolving one internal node
#[derive(Debug)]
pub enum NodeOutcome {
    Resolved(NodeLineage),
    Failed(NodeFailure),
}

/// Aggregate result of a whole-tree run
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Tips with their designated (compressed) lineage, in tree order
    pub tips: Vec<NodeLineage>,
    /// Internal nodes with a consensus lineage, in pre-order
    pub resolved: Vec<NodeLineage>,
    /// Internal nodes that failed, in pre-order
    pub failures: Vec<NodeFailure>,
    /// Named leaves without a designation
    pub missing_leaves: Vec<String>,
}

impl ReconcileReport {
    /// True when every internal node resolved
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Tips (if present) followed by resolved internal nodes
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tips
            .iter()
            .chain(self.resolved.iter())
            .map(|n| (n.node.as_str(), n.lineage.as_str()))
    }

    /// Lineage assigned to a node, if any
    pub fn lineage_of(&self, node: &str) -> Option<&str> {
        self.assignments()
            .find(|&(name, _)| name == node)
            .map(|(_, lineage)| lineage)
    }

    /// Failure recorded for a node, if any
    pub fn failure_of(&self, node: &str) -> Option<&PangoError> {
        self.failures
            .iter()
            .find(|f| f.node == node)
            .map(|f| &f.error)
    }
}

/// Dealiased consensus for every internal node, from one post-order pass.
///
/// A node's counts are built by moving its children's tables into it, so only
/// the tables of subtrees whose parent is still pending are alive at once.
#[derive(Debug, Default)]
pub struct SubtreeConsensus {
    per_node: Vec<Option<Result<String>>>,
    /// Named leaves without a designation, left to right
    pub missing_leaves: Vec<String>,
    peak_live_entries: usize,
}

impl SubtreeConsensus {
    /// Count and resolve bottom-up.
    ///
    /// `designations` must already be dealiased.
    pub fn build(tree: &Tree, designations: &Designations) -> Self {
        let mut per_node: Vec<Option<Result<String>>> = Vec::new();
        per_node.resize_with(tree.len(), || None);
        let mut open: Vec<Option<LineageCounts>> = Vec::new();
        open.resize_with(tree.len(), || None);

        let mut missing_leaves = Vec::new();
        let mut n_unnamed = 0usize;
        let mut live_entries = 0usize;
        let mut peak_live_entries = 0usize;

        for idx in tree.post_order() {
            if tree.is_leaf(idx) {
                match tree.name(idx) {
                    Some(name) if !designations.contains(name) => {
                        missing_leaves.push(name.to_string())
                    }
                    Some(_) => {}
                    None => n_unnamed += 1,
                }
                continue;
            }

            let mut acc = LineageCounts::new();
            for &child in tree.children(idx) {
                if tree.is_leaf(child) {
                    if let Some(lineage) = tree.name(child).and_then(|n| designations.get(n)) {
                        acc.add(lineage, 1);
                    }
                } else if let Some(counts) = open[child.as_usize()].take() {
                    live_entries -= counts.len();
                    acc.absorb(counts);
                }
            }

            let node = node_label(tree, idx);
            let candidates = candidate_lineage_counts(&acc);
            per_node[idx.as_usize()] = Some(consensus_lineage(&node, &candidates));

            live_entries += acc.len();
            peak_live_entries = peak_live_entries.max(live_entries);
            open[idx.as_usize()] = Some(acc);
        }

        if n_unnamed > 0 {
            tracing::debug!(n_unnamed, "unnamed leaves excluded from counts");
        }
        tracing::debug!(peak_live_entries, "lineage tables held during count pass");

        Self {
            per_node,
            missing_leaves,
            peak_live_entries,
        }
    }

    /// Dealiased consensus of an internal node
    pub fn get(&self, idx: NodeIdx) -> Option<&Result<String>> {
        self.per_node.get(idx.as_usize()).and_then(Option::as_ref)
    }

    /// Most `(lineage, count)` entries alive at once during [`build`](Self::build)
    pub fn peak_live_entries(&self) -> usize {
        self.peak_live_entries
    }

    fn take(&mut self, idx: NodeIdx) -> Option<Result<String>> {
        self.per_node.get_mut(idx.as_usize()).and_then(Option::take)
    }
}

fn node_label(tree: &Tree, idx: NodeIdx) -> String {
    tree.name(idx)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", idx.0))
}

/// Dealias every designation, failing on the first unknown prefix
pub fn dealias_designations(designations: &Designations, aliasor: &Aliasor) -> Result<Designations> {
    designations.try_map_lineages(|strain, lineage| {
        aliasor.dealias(lineage).inspect_err(|e| {
            tracing::error!(strain, lineage, "cannot dealias designation: {}", e);
        })
    })
}

/// Tips with their designated lineage, in tree order
pub fn tip_lineages(tree: &Tree, designations: &Designations) -> Vec<NodeLineage> {
    tree.leaves()
        .into_iter()
        .filter_map(|idx| {
            let name = tree.name(idx)?;
            let lineage = designations.get(name)?;
            Some(NodeLineage {
                node: name.to_string(),
                lineage: lineage.to_string(),
            })
        })
        .collect()
}

/// Resolve every internal node of `tree`.
///
/// `designations` must already be dealiased. The returned report has no tips;
/// see [`tip_lineages`].
pub fn reconcile_tree(
    tree: &Tree,
    designations: &Designations,
    aliasor: &Aliasor,
    telemetry: Option<&TelemetryBlackboard>,
) -> ReconcileReport {
    let _span = info_span!("reconcile_tree", n_nodes = tree.len()).entered();

    if let Some(bb) = telemetry {
        bb.set_stage(Stage::CountingLineages);
    }
    let mut consensus =
        info_span!("subtree_consensus").in_scope(|| SubtreeConsensus::build(tree, designations));
    for leaf in &consensus.missing_leaves {
        tracing::warn!(leaf = %leaf, "not found in designations; excluded from counts");
    }

    let internal = tree.internal_nodes();
    if let Some(bb) = telemetry {
        bb.set_total_nodes(internal.len() as u64);
        bb.set_stage(Stage::Resolving);
    }

    let pending: Vec<(String, Result<String>)> = internal
        .iter()
        .map(|&idx| {
            let node = node_label(tree, idx);
            let dealiased = consensus.take(idx).unwrap_or_else(|| {
                Err(PangoError::NoConsensusFound {
                    node: node.clone(),
                    candidates: "<empty>".to_string(),
                })
            });
            (node, dealiased)
        })
        .collect();

    let outcomes: Vec<NodeOutcome> = info_span!("resolve_nodes", n_internal = internal.len())
        .in_scope(|| {
            pending
                .into_par_iter()
                .map(|(node, dealiased)| {
                    let outcome = match dealiased.and_then(|c| aliasor.realias(&c)) {
                        Ok(lineage) => NodeOutcome::Resolved(NodeLineage { node, lineage }),
                        Err(error) => NodeOutcome::Failed(NodeFailure { node, error }),
                    };
                    if let Some(bb) = telemetry {
                        bb.node_done(matches!(outcome, NodeOutcome::Failed(_)));
                    }
                    outcome
                })
                .collect()
        });

    let mut report = ReconcileReport {
        missing_leaves: consensus.missing_leaves,
        ..ReconcileReport::default()
    };
    for outcome in outcomes {
        match outcome {
            NodeOutcome::Resolved(lineage) => report.resolved.push(lineage),
            NodeOutcome::Failed(failure) => {
                tracing::error!(node = %failure.node, "{}", failure.error);
                report.failures.push(failure);
            }
        }
    }
    report
}

/// Whole-tree reconciliation driven by [`ReconcileArgs`]
pub struct ReconcilePipeline {
    args: ReconcileArgs,
    telemetry: Option<Arc<TelemetryBlackboard>>,
}

impl ReconcilePipeline {
    pub fn new(args: ReconcileArgs, telemetry: Option<Arc<TelemetryBlackboard>>) -> Self {
        Self { args, telemetry }
    }

    /// Run the pipeline and write outputs
    #[instrument(name = "reconcile", skip(self))]
    pub fn run(&mut self) -> Result<ReconcileReport> {
        let telemetry = self.telemetry.as_deref();
        let set_stage = |stage: Stage| {
            if let Some(bb) = telemetry {
                bb.set_stage(stage);
            }
        };

        set_stage(Stage::LoadingData);
        let aliasor = Aliasor::new(read_alias_table(&self.args.aliases)?);
        let tree = read_newick(&self.args.tree)?;
        let designations = read_designations(&self.args.designations, &self.args.columns())?;

        set_stage(Stage::Dealiasing);
        let dealiased = info_span!("dealias_designations")
            .in_scope(|| dealias_designations(&designations, &aliasor))?;

        let mut report = reconcile_tree(&tree, &dealiased, &aliasor, telemetry);
        if self.args.include_tips() {
            report.tips = tip_lineages(&tree, &designations);
        }

        set_stage(Stage::WritingOutput);
        info_span!("write_output", path = ?self.args.out).in_scope(|| {
            write_assignments(&self.args.out, self.args.output_format(), report.assignments())
        })?;
        if let Some(path) = &self.args.failures {
            write_failures_csv(
                path,
                report.failures.iter().map(|f| (f.node.as_str(), &f.error)),
            )?;
        }

        tracing::info!(
            resolved = report.resolved.len(),
            failed = report.failures.len(),
            tips = report.tips.len(),
            missing_leaves = report.missing_leaves.len(),
            "reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::alias::AliasTable;
    use crate::io::newick::parse_newick;
    use crate::model::consensus::resolve_node;

    fn aliasor() -> Aliasor {
        Aliasor::new(
            AliasTable::from_pairs([("Q", "B.1.1.7"), ("BA", "B.1.1.529"), ("BE", "B.1.1.529.5.3.1")])
                .with_recombinant("XBB", &["BJ.1", "BM.1.1.1"]),
        )
    }

    fn designations(pairs: &[(&str, &str)]) -> Designations {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_subtree_consensus_matches_direct_walk() {
        let tree = parse_newick("(((s1,s2)n2,(s3,ghost)n3)n1,(s4,s5)n4,(x1,x2)n5)root;").unwrap();
        let d = designations(&[
            ("s1", "B.1.1.7"),
            ("s2", "B.1.1.7.1"),
            ("s3", "B.1.1.318"),
            ("s4", "A.1"),
            ("s5", "A"),
        ]);
        let consensus = SubtreeConsensus::build(&tree, &d);
        assert_eq!(consensus.missing_leaves, vec!["ghost", "x1", "x2"]);

        for idx in tree.internal_nodes() {
            let name = tree.name(idx).unwrap();
            let (direct, _) =
                crate::model::consensus::lineage_counts(tree.descendant_leaf_names(idx), &d);
            let want = consensus_lineage(name, &candidate_lineage_counts(&direct));
            match (consensus.get(idx).unwrap(), want) {
                (Ok(got), Ok(want)) => assert_eq!(got, &want, "node {}", name),
                (Err(got), Err(want)) => assert_eq!(got.to_string(), want.to_string()),
                (got, want) => panic!("node {}: {:?} vs {:?}", name, got, want),
            }
        }
        assert_eq!(consensus.get(tree.root()).unwrap().as_deref().ok(), Some(""));
    }

    #[test]
    fn test_deep_ladder_keeps_one_table_alive() {
        // ((((t0,t1),t2),t3),...) with a distinct lineage on every tip
        let n_tips = 2_000;
        let mut newick = "(".repeat(n_tips - 1);
        newick.push_str("t0");
        for i in 1..n_tips {
            newick.push_str(&format!(",t{i})"));
        }
        newick.push(';');
        let tree = parse_newick(&newick).unwrap();

        let a = aliasor();
        let d: Designations = (0..n_tips)
            .map(|i| (format!("t{i}"), format!("B.1.{i}")))
            .collect();

        let consensus = SubtreeConsensus::build(&tree, &d);
        assert!(consensus.missing_leaves.is_empty());
        assert!(
            consensus.peak_live_entries() <= n_tips,
            "peak {} entries for {} tips",
            consensus.peak_live_entries(),
            n_tips
        );

        let report = reconcile_tree(&tree, &d, &a, None);
        assert!(report.is_complete());
        assert_eq!(report.resolved.len(), n_tips - 1);
        assert!(report.resolved.iter().all(|n| n.lineage == "B.1"));
    }

    #[test]
    fn test_reconcile_matches_single_node_resolution() {
        let tree = parse_newick("(((s1,s2)n2,(s3,s4)n3)n1,((s5,s6)n5,s7)n4)root;").unwrap();
        let a = aliasor();
        let d = dealias_designations(
            &designations(&[
                ("s1", "BA.5.1"),
                ("s2", "BA.5.1"),
                ("s3", "BA.5.2"),
                ("s4", "BA.5.2.1"),
                ("s5", "Q.1"),
                ("s6", "Q.2"),
                ("s7", "A.1"),
            ]),
            &a,
        )
        .unwrap();

        let report = reconcile_tree(&tree, &d, &a, None);
        assert!(report.is_complete());
        assert_eq!(report.resolved.len(), tree.internal_nodes().len());
        for idx in tree.internal_nodes() {
            let single = resolve_node(&tree, idx, &d, &a).unwrap();
            assert_eq!(report.lineage_of(&single.node), Some(single.lineage.as_str()));
        }

        assert_eq!(report.lineage_of("n2"), Some("BA.5.1"));
        assert_eq!(report.lineage_of("n3"), Some("BA.5.2"));
        assert_eq!(report.lineage_of("n1"), Some("BA.5"));
        assert_eq!(report.lineage_of("n5"), Some("B.1.1.7"));
        assert_eq!(report.lineage_of("root"), Some("A/B"));
    }

    #[test]
    fn test_failures_are_isolated() {
        // n2 has no designated leaves; n3 and n1 compress through a missing alias
        let tree = parse_newick("(((x1,x2)n2,(s1,s2)n3)n1,(s3,s4)n4)root;").unwrap();
        let a = aliasor();
        let d = designations(&[
            ("s1", "B.1.617.2.4"),
            ("s2", "B.1.617.2.4"),
            ("s3", "B.1.1.7"),
            ("s4", "B.1.1.7"),
        ]);

        let report = reconcile_tree(&tree, &d, &a, None);
        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 3);
        assert_eq!(report.failure_of("n2").map(PangoError::kind), Some("NoConsensusFound"));
        assert_eq!(report.failure_of("n3").map(PangoError::kind), Some("AliasNotFound"));
        assert_eq!(report.failure_of("n1").map(PangoError::kind), Some("AliasNotFound"));
        assert_eq!(report.lineage_of("n4"), Some("B.1.1.7"));
        assert_eq!(report.lineage_of("root"), Some("B.1"));
        assert_eq!(report.missing_leaves, vec!["x1", "x2"]);

        let failed: Vec<&str> = report.failures.iter().map(|f| f.node.as_str()).collect();
        assert_eq!(failed, vec!["n1", "n2", "n3"]);
    }

    #[test]
    fn test_recombinant_leaves_pass_through() {
        let tree = parse_newick("((s1,s2)n1,(s3,s4)n2)root;").unwrap();
        let a = aliasor();
        let d = dealias_designations(
            &designations(&[("s1", "XBB.1.5"), ("s2", "XBB.1.9"), ("s3", "BE.1"), ("s4", "BE.1")]),
            &a,
        )
        .unwrap();
        assert_eq!(d.get("s1"), Some("XBB.1.5"));

        let report = reconcile_tree(&tree, &d, &a, None);
        assert_eq!(report.lineage_of("n1"), Some("XBB.1"));
        assert_eq!(report.lineage_of("n2"), Some("BA.5.3.1.1"));
        assert_eq!(report.lineage_of("root"), Some("A/B"));
    }

    #[test]
    fn test_unknown_prefix_aborts_dealiasing() {
        let d = designations(&[("s1", "BA.1"), ("s2", "ZZ.9")]);
        let err = dealias_designations(&d, &aliasor()).unwrap_err();
        assert!(matches!(err, PangoError::UnknownLineagePrefix { ref prefix, .. } if prefix == "ZZ"));
    }

    #[test]
    fn test_tip_lineages_keep_compressed_names() {
        let tree = parse_newick("((s1,s2)n1,ghost)root;").unwrap();
        let d = designations(&[("s1", "BA.1"), ("s2", "Q.1")]);
        let tips = tip_lineages(&tree, &d);
        assert_eq!(
            tips,
            vec![
                NodeLineage { node: "s1".to_string(), lineage: "BA.1".to_string() },
                NodeLineage { node: "s2".to_string(), lineage: "Q.1".to_string() },
            ]
        );
    }

    #[test]
    fn test_telemetry_counts_nodes() {
        let tree = parse_newick("((s1,s2)n1,(x,y)n2)root;").unwrap();
        let d = designations(&[("s1", "B.1"), ("s2", "B.1")]);
        let bb = TelemetryBlackboard::new();
        let report = reconcile_tree(&tree, &d, &aliasor(), Some(bb.as_ref()));
        assert_eq!(bb.nodes_processed(), 3);
        assert_eq!(bb.nodes_failed(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(bb.stage(), Stage::Resolving);
    }
}
