//! # Result Writers
//!
//! Serialize node -> lineage assignments.
//!
//! - Node JSON: `{"nodes": {name: {"clade_membership": lineage}}}`, the
//!   node-data format Nextstrain/Nextclade tooling reads, 4-space indented.
//! - CSV: `node,lineage` rows.
//! - Failures CSV: `node,kind,error` rows for nodes that could not be resolved.
//! - Strain list TSV: a single `strain` column, used by the subsampler.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{PangoError, Result};

/// Output format for node assignments
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    /// Guess from a path extension, falling back to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => OutputFormat::Csv,
            _ => OutputFormat::Json,
        }
    }
}

/// Per-node payload of the node JSON
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CladeMembership {
    pub clade_membership: String,
}

/// Top-level node JSON document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub nodes: IndexMap<String, CladeMembership>,
}

impl NodeData {
    /// Collect `(node, lineage)` pairs; later duplicates overwrite earlier ones
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let nodes = pairs
            .into_iter()
            .map(|(node, lineage)| {
                (
                    node.to_string(),
                    CladeMembership {
                        clade_membership: lineage.to_string(),
                    },
                )
            })
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(PangoError::FileNotFound {
                path: parent.to_path_buf(),
            });
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write node JSON to any writer
pub fn write_node_json_to<W: Write>(writer: W, data: &NodeData) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    data.serialize(&mut ser)?;
    let mut writer = ser.into_inner();
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write node JSON to a file
pub fn write_node_json(path: &Path, data: &NodeData) -> Result<()> {
    write_node_json_to(create(path)?, data)
}

/// Write `node,lineage` CSV to any writer
pub fn write_node_csv_to<'a, W: Write>(
    writer: W,
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["node", "lineage"])?;
    for (node, lineage) in pairs {
        wtr.write_record([node, lineage])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write node assignments in the requested format
pub fn write_assignments<'a>(
    path: &Path,
    format: OutputFormat,
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_node_json(path, &NodeData::from_pairs(pairs)),
        OutputFormat::Csv => write_node_csv_to(create(path)?, pairs),
    }
}

/// Write `node,kind,error` rows
pub fn write_failures_csv<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = (&'a str, &'a PangoError)>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(create(path)?);
    wtr.write_record(["node", "kind", "error"])?;
    for (node, err) in rows {
        wtr.write_record([node, err.kind(), err.to_string().as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a one-column `strain` TSV
pub fn write_strains_tsv<'a>(path: &Path, strains: impl IntoIterator<Item = &'a str>) -> Result<()> {
    write_strains_tsv_to(create(path)?, strains)
}

/// Write a one-column `strain` TSV to any writer
pub fn write_strains_tsv_to<'a, W: Write>(
    writer: W,
    strains: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);
    wtr.write_record(["strain"])?;
    for strain in strains {
        wtr.write_record([strain])?;
    }
    wtr.flush()?;
    Ok(())
}
