//! # Alias Table Reading
//!
//! Load `alias_key.json` from disk.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info_span;

use crate::data::alias::AliasTable;
use crate::error::{PangoError, Result};

/// Read and validate an alias table
pub fn read_alias_table(path: &Path) -> Result<AliasTable> {
    info_span!("alias_read", path = ?path).in_scope(|| {
        if !path.exists() {
            return Err(PangoError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let table = AliasTable::from_json_reader(BufReader::new(file))?;
        table.validate()?;
        tracing::info!(n_aliases = table.len(), "loaded alias table");
        Ok(table)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_alias_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"A": "", "B": "", "BA": "B.1.1.529", "XBB": ["BJ.1", "BA.2.75.3"]}}"#).unwrap();
        let table = read_alias_table(file.path()).unwrap();
        assert_eq!(table.alias_for("B.1.1.529"), Some("BA"));
        assert!(table.get("XBB").unwrap().is_recombinant());
    }

    #[test]
    fn test_read_alias_table_with_recombinant_rooted_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"A": "", "B": "", "BA": "B.1.1.529", "XBB": ["BJ.1", "BM.1.1.1"], "EG": "XBB.1.9.2"}}"#
        )
        .unwrap();
        let table = read_alias_table(file.path()).unwrap();
        assert_eq!(table.alias_for("XBB.1.9.2"), Some("EG"));

        let aliasor = crate::model::aliasor::Aliasor::new(table);
        assert_eq!(aliasor.dealias("EG.5.1").unwrap(), "XBB.1.9.2.5.1");
        assert_eq!(aliasor.realias("XBB.1.9.2.5.1").unwrap(), "EG.5.1");
    }

    #[test]
    fn test_missing_file() {
        let err = read_alias_table(Path::new("/nonexistent/alias_key.json")).unwrap_err();
        assert!(matches!(err, PangoError::FileNotFound { .. }));
    }
}
