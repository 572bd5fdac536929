//! # Lineage Subsampling
//!
//! Pick a small, lineage-balanced set of designated genomes for building a
//! reference tree.
//!
//! Each lineage gets `per_lineage` genomes plus `per_child` more for every
//! designated child lineage, capped by what is available. Lineages are drawn
//! in sorted order, each from its own RNG seeded with the same seed, so adding
//! genomes to one lineage never changes the draw for another. Reference
//! strains matching a fixed pattern are always included.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info_span, instrument};

use crate::config::SubsampleArgs;
use crate::data::designations::Designations;
use crate::data::lineage;
use crate::error::Result;
use crate::io::aliases::read_alias_table;
use crate::io::designations::read_designations;
use crate::io::output::write_strains_tsv;
use crate::model::aliasor::Aliasor;
use crate::utils::telemetry::{Stage, TelemetryBlackboard};

/// Sampling parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleParams {
    pub per_lineage: usize,
    pub per_child: usize,
    pub seed: u64,
    pub reference_pattern: String,
}

impl From<&SubsampleArgs> for SampleParams {
    fn from(args: &SubsampleArgs) -> Self {
        Self {
            per_lineage: args.per_lineage,
            per_child: args.per_child,
            seed: args.seed,
            reference_pattern: args.reference_pattern.clone(),
        }
    }
}

/// Number of designated children per (compressed) parent lineage.
///
/// A parent that cannot be realiased is keyed by its dealiased name, which
/// then matches no designated lineage and contributes nothing.
pub fn count_children<'a>(
    lineages: impl IntoIterator<Item = &'a str>,
    aliasor: &Aliasor,
) -> Result<IndexMap<String, usize>> {
    let mut seen = HashSet::new();
    let mut children: IndexMap<String, usize> = IndexMap::new();
    for name in lineages {
        if !seen.insert(name) {
            continue;
        }
        let dealiased = aliasor.dealias(name)?;
        if let Some(parent) = lineage::parent(&dealiased) {
            *children.entry(parent.to_string()).or_insert(0) += 1;
        }
    }

    let mut compressed: IndexMap<String, usize> = IndexMap::with_capacity(children.len());
    for (parent, n) in children {
        let key = match aliasor.realias(&parent) {
            Ok(alias) => alias,
            Err(e) => {
                tracing::debug!(parent = %parent, "keeping dealiased parent: {}", e);
                parent
            }
        };
        *compressed.entry(key).or_insert(0) += n;
    }
    Ok(compressed)
}

/// Genomes to draw per lineage, in sorted lineage order
pub fn sample_targets(
    groups: &IndexMap<&str, Vec<&str>>,
    children: &IndexMap<String, usize>,
    params: &SampleParams,
) -> IndexMap<String, usize> {
    let mut lineages: Vec<&str> = groups.keys().copied().collect();
    lineages.sort_unstable();

    lineages
        .into_iter()
        .map(|name| {
            let n_children = children.get(name).copied().unwrap_or(0);
            let wanted = params.per_lineage + params.per_child * n_children;
            let available = groups.get(name).map_or(0, Vec::len);
            (name.to_string(), wanted.min(available))
        })
        .collect()
}

/// Draw `targets[lineage]` strains from each lineage group
pub fn draw_samples(
    groups: &IndexMap<&str, Vec<&str>>,
    targets: &IndexMap<String, usize>,
    seed: u64,
) -> Vec<String> {
    let mut out = Vec::with_capacity(targets.values().sum());
    for (name, &n) in targets {
        let Some(group) = groups.get(name.as_str()) else {
            continue;
        };
        let mut rng = StdRng::seed_from_u64(seed);
        out.extend(group.choose_multiple(&mut rng, n).map(|s| s.to_string()));
    }
    out
}

/// Strains whose name contains `pattern`, in table order
pub fn reference_strains<'a>(designations: &'a Designations, pattern: &str) -> Vec<&'a str> {
    if pattern.is_empty() {
        return Vec::new();
    }
    designations
        .iter()
        .map(|(strain, _)| strain)
        .filter(|strain| strain.contains(pattern))
        .collect()
}

/// Reference strains followed by the per-lineage draw, without duplicates
pub fn subsample(designations: &Designations, aliasor: &Aliasor, params: &SampleParams) -> Result<Vec<String>> {
    let groups = designations.group_by_lineage();
    let children = count_children(groups.keys().copied(), aliasor)?;
    let targets = sample_targets(&groups, &children, params);
    tracing::debug!(
        n_lineages = targets.len(),
        n_target = targets.values().sum::<usize>(),
        "sample targets"
    );

    let references = reference_strains(designations, &params.reference_pattern);
    let drawn = draw_samples(&groups, &targets, params.seed);

    let mut seen = HashSet::new();
    let selected = references
        .into_iter()
        .map(str::to_string)
        .chain(drawn)
        .filter(|strain| seen.insert(strain.clone()))
        .collect();
    Ok(selected)
}

/// Subsampling driven by [`SubsampleArgs`]
pub struct SubsamplePipeline {
    args: SubsampleArgs,
    telemetry: Option<Arc<TelemetryBlackboard>>,
}

impl SubsamplePipeline {
    pub fn new(args: SubsampleArgs, telemetry: Option<Arc<TelemetryBlackboard>>) -> Self {
        Self { args, telemetry }
    }

    #[instrument(name = "subsample", skip(self))]
    pub fn run(&mut self) -> Result<Vec<String>> {
        let telemetry = self.telemetry.as_deref();

        if let Some(bb) = telemetry {
            bb.set_stage(Stage::LoadingData);
        }
        let aliasor = Aliasor::new(read_alias_table(&self.args.aliases)?);
        let designations = read_designations(&self.args.metadata, &self.args.columns())?;

        if let Some(bb) = telemetry {
            bb.set_stage(Stage::Sampling);
        }
        let params = SampleParams::from(&self.args);
        let selected = info_span!("draw", seed = params.seed)
            .in_scope(|| subsample(&designations, &aliasor, &params))?;

        if let Some(bb) = telemetry {
            bb.set_stage(Stage::WritingOutput);
        }
        write_strains_tsv(&self.args.out, selected.iter().map(String::as_str))?;
        tracing::info!(
            n_selected = selected.len(),
            n_available = designations.len(),
            "wrote subsample"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::alias::AliasTable;

    fn aliasor() -> Aliasor {
        Aliasor::new(
            AliasTable::from_pairs([("BA", "B.1.1.529"), ("Q", "B.1.1.7")])
                .with_recombinant("XBB", &["BJ.1", "BM.1.1.1"]),
        )
    }

    fn params() -> SampleParams {
        SampleParams {
            per_lineage: 3,
            per_child: 2,
            seed: 0,
            reference_pattern: "Wuhan/Hu-1/2019".to_string(),
        }
    }

    fn metadata() -> Designations {
        let mut d = Designations::new();
        d.insert("Wuhan/Hu-1/2019", "B");
        for i in 0..20 {
            d.insert(format!("ba1_{i}"), "BA.1");
        }
        for i in 0..4 {
            d.insert(format!("ba11_{i}"), "BA.1.1");
            d.insert(format!("ba12_{i}"), "BA.1.2");
        }
        for i in 0..10 {
            d.insert(format!("b11529_{i}"), "B.1.1.529");
        }
        d.insert("q1_0", "Q.1");
        d
    }

    #[test]
    fn test_count_children_compresses_parents() {
        let lineages = ["BA.1", "BA.1.1", "BA.1.2", "BA.1.1", "B.1.1.529", "Q.1", "XBB.1"];
        let children = count_children(lineages, &aliasor()).unwrap();
        assert_eq!(children.get("BA.1"), Some(&2));
        // BA.1 -> B.1.1.529.1, whose parent has four segments
        assert_eq!(children.get("B.1.1.529"), Some(&1));
        assert_eq!(children.get("B.1.1.7"), Some(&1));
        assert_eq!(children.get("B.1.1"), Some(&1));
        assert_eq!(children.get("XBB"), Some(&1));
    }

    #[test]
    fn test_count_children_unknown_prefix() {
        assert!(count_children(["ZZ.1"], &aliasor()).is_err());
    }

    #[test]
    fn test_targets_are_capped() {
        let d = metadata();
        let groups = d.group_by_lineage();
        let children = count_children(groups.keys().copied(), &aliasor()).unwrap();
        let targets = sample_targets(&groups, &children, &params());

        let order: Vec<&str> = targets.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["B", "B.1.1.529", "BA.1", "BA.1.1", "BA.1.2", "Q.1"]);
        assert_eq!(targets["B"], 1);
        assert_eq!(targets["BA.1"], 3 + 2 * 2);
        assert_eq!(targets["B.1.1.529"], 3 + 2);
        assert_eq!(targets["BA.1.1"], 3);
        assert_eq!(targets["Q.1"], 1);
    }

    #[test]
    fn test_draw_is_reproducible() {
        let d = metadata();
        let a = subsample(&d, &aliasor(), &params()).unwrap();
        let b = subsample(&d, &aliasor(), &params()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], "Wuhan/Hu-1/2019");
        assert_eq!(a.len(), 1 + 5 + 7 + 3 + 3 + 1);

        let unique: HashSet<&String> = a.iter().collect();
        assert_eq!(unique.len(), a.len());
        assert_eq!(a.iter().filter(|s| s.starts_with("ba1_")).count(), 7);
    }

    #[test]
    fn test_draw_per_lineage_is_independent() {
        let d = metadata();
        let mut bigger = d.clone();
        for i in 0..50 {
            bigger.insert(format!("extra_{i}"), "Q.1");
        }
        let picks = |d: &Designations| -> Vec<String> {
            subsample(d, &aliasor(), &params())
                .unwrap()
                .into_iter()
                .filter(|s| s.starts_with("ba1_"))
                .collect()
        };
        assert_eq!(picks(&d), picks(&bigger));
    }

    #[test]
    fn test_reference_strains() {
        let d = metadata();
        assert_eq!(reference_strains(&d, "Wuhan/Hu-1/2019"), vec!["Wuhan/Hu-1/2019"]);
        assert!(reference_strains(&d, "").is_empty());
    }
}
