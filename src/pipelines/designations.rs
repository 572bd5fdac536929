//! # Designations To Node JSON
//!
//! Convert a taxon/lineage table into the node JSON format so designated tips
//! can be coloured alongside reconstructed internal nodes.

use tracing::instrument;

use crate::config::DesignationsArgs;
use crate::error::Result;
use crate::io::designations::read_designations;
use crate::io::output::{write_node_json, NodeData};

pub struct DesignationsPipeline {
    args: DesignationsArgs,
}

impl DesignationsPipeline {
    pub fn new(args: DesignationsArgs) -> Self {
        Self { args }
    }

    #[instrument(name = "designations_to_json", skip(self))]
    pub fn run(&mut self) -> Result<NodeData> {
        let designations = read_designations(&self.args.input, &self.args.columns())?;
        let data = NodeData::from_pairs(designations.iter());
        write_node_json(&self.args.output, &data)?;
        tracing::info!(n_nodes = data.len(), output = ?self.args.output, "wrote node JSON");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Command, Config};
    use clap::Parser;
    use std::ffi::OsStr;

    #[test]
    fn test_table_to_node_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("lineages.csv");
        let output = dir.path().join("nodes.json");
        std::fs::write(&input, "taxon,lineage\ns2,BA.2\ns1,B.1.1.7\n").unwrap();

        let config = Config::parse_from([
            OsStr::new("pango-nodes"),
            OsStr::new("designations-to-json"),
            input.as_os_str(),
            output.as_os_str(),
        ]);
        let Command::DesignationsToJson(args) = config.command else {
            panic!("expected designations-to-json");
        };

        let data = DesignationsPipeline::new(args).run().unwrap();
        assert_eq!(data.len(), 2);

        let parsed: NodeData =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let keys: Vec<&str> = parsed.nodes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["s2", "s1"]);
        assert_eq!(parsed.nodes["s1"].clade_membership, "B.1.1.7");
    }
}
