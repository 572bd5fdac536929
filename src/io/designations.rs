//! # Designations Table Reading
//!
//! Load a strain -> lineage mapping from a CSV or TSV file with a header row.
//! Uses the `csv` crate; the delimiter is picked from the file extension.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info_span;

use crate::data::designations::Designations;
use crate::error::{PangoError, Result};

/// Strain column names tried, in order, when none is configured
pub const STRAIN_COLUMN_CANDIDATES: [&str; 2] = ["strain", "taxon"];

/// Default lineage column
pub const DEFAULT_LINEAGE_COLUMN: &str = "lineage";

/// Which columns hold the strain and lineage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesignationColumns {
    /// Explicit strain column; `None` auto-detects from [`STRAIN_COLUMN_CANDIDATES`]
    pub strain: Option<String>,
    pub lineage: String,
}

impl Default for DesignationColumns {
    fn default() -> Self {
        Self {
            strain: None,
            lineage: DEFAULT_LINEAGE_COLUMN.to_string(),
        }
    }
}

impl DesignationColumns {
    pub fn new(strain: Option<String>, lineage: impl Into<String>) -> Self {
        Self {
            strain,
            lineage: lineage.into(),
        }
    }
}

/// Field delimiter for a table path: tab for `.tsv`/`.tab`, comma otherwise
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => b'\t',
        _ => b',',
    }
}

/// Read designations from a CSV/TSV file
pub fn read_designations(path: &Path, columns: &DesignationColumns) -> Result<Designations> {
    info_span!("designations_read", path = ?path).in_scope(|| {
        if !path.exists() {
            return Err(PangoError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let designations = read_designations_from(file, delimiter_for(path), columns, path)?;
        tracing::info!(n_designations = designations.len(), "loaded designations");
        Ok(designations)
    })
}

/// Read designations from any reader. `source` only labels errors.
pub fn read_designations_from<R: Read>(
    reader: R,
    delimiter: u8,
    columns: &DesignationColumns,
    source: &Path,
) -> Result<Designations> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);

    let strain_idx = match &columns.strain {
        Some(name) => find(name.as_str()).ok_or_else(|| PangoError::MissingColumn {
            path: source.to_path_buf(),
            column: name.clone(),
        })?,
        None => STRAIN_COLUMN_CANDIDATES
            .iter()
            .find_map(|&name| find(name))
            .ok_or_else(|| PangoError::MissingColumn {
                path: source.to_path_buf(),
                column: STRAIN_COLUMN_CANDIDATES.join("|"),
            })?,
    };
    let lineage_idx = find(columns.lineage.as_str()).ok_or_else(|| PangoError::MissingColumn {
        path: source.to_path_buf(),
        column: columns.lineage.clone(),
    })?;

    let mut designations = Designations::new();
    let mut n_blank = 0usize;
    for record in rdr.records() {
        let record = record?;
        let strain = record.get(strain_idx).map(str::trim).unwrap_or("");
        let lineage = record.get(lineage_idx).map(str::trim).unwrap_or("");
        if strain.is_empty() || lineage.is_empty() {
            n_blank += 1;
            continue;
        }
        if let Some(previous) = designations.insert(strain, lineage) {
            tracing::debug!(strain, previous = %previous, lineage, "duplicate strain; keeping last row");
        }
    }
    if n_blank > 0 {
        tracing::debug!(n_blank, "skipped rows with empty strain or lineage");
    }

    Ok(designations)
}
