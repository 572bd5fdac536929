//! # Configuration Logic
//!
//! CLI argument parsing and validation.
//!
//! ## Example CLI
//! ```bash
//! pango-nodes reconcile --tree tree.nwk --designations lineages.csv \
//!     --aliases alias_key.json --out pango_reconstructed.json
//! pango-nodes designations-to-json lineages.csv nodes.json
//! pango-nodes subsample --metadata open_pango_metadata.tsv \
//!     --aliases alias_key.json --out pango_subsample.tsv
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::error::{PangoError, Result};
use crate::io::designations::{DesignationColumns, DEFAULT_LINEAGE_COLUMN};
use crate::io::output::OutputFormat;

/// Reconcile PANGO lineage designations with phylogeny internal nodes
#[derive(Parser, Debug, Clone)]
#[command(name = "pango-nodes", version, about)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Worker threads (default: all cores)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log span timings to stderr
    #[arg(long, global = true)]
    pub profile: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Assign a consensus lineage to every internal node of a tree
    Reconcile(ReconcileArgs),
    /// Convert a taxon/lineage table into node JSON
    DesignationsToJson(DesignationsArgs),
    /// Pick a per-lineage subsample of designated genomes
    Subsample(SubsampleArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    /// Newick tree
    #[arg(short, long)]
    pub tree: PathBuf,

    /// Strain/lineage designations (CSV, or TSV by extension)
    #[arg(short, long)]
    pub designations: PathBuf,

    /// Alias key JSON
    #[arg(short, long)]
    pub aliases: PathBuf,

    /// Output path
    #[arg(short, long)]
    pub out: PathBuf,

    /// Output format (default: from the output extension, else JSON)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Strain column (default: `strain`, then `taxon`)
    #[arg(long)]
    pub strain_column: Option<String>,

    /// Lineage column
    #[arg(long, default_value = DEFAULT_LINEAGE_COLUMN)]
    pub lineage_column: String,

    /// Leave tips out of the output
    #[arg(long)]
    pub no_tips: bool,

    /// Write unresolved nodes to this CSV
    #[arg(long)]
    pub failures: Option<PathBuf>,

    /// Exit non-zero if any node fails to resolve
    #[arg(long)]
    pub strict: bool,
}

impl ReconcileArgs {
    pub fn columns(&self) -> DesignationColumns {
        DesignationColumns::new(self.strain_column.clone(), self.lineage_column.clone())
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format.unwrap_or_else(|| OutputFormat::from_path(&self.out))
    }

    pub fn include_tips(&self) -> bool {
        !self.no_tips
    }
}

#[derive(Args, Debug, Clone)]
pub struct DesignationsArgs {
    /// Taxon/lineage table
    pub input: PathBuf,

    /// Node JSON output
    pub output: PathBuf,

    /// Strain column (default: `strain`, then `taxon`)
    #[arg(long)]
    pub strain_column: Option<String>,

    /// Lineage column
    #[arg(long, default_value = DEFAULT_LINEAGE_COLUMN)]
    pub lineage_column: String,
}

impl DesignationsArgs {
    pub fn columns(&self) -> DesignationColumns {
        DesignationColumns::new(self.strain_column.clone(), self.lineage_column.clone())
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubsampleArgs {
    /// Genome metadata (TSV or CSV)
    #[arg(short, long)]
    pub metadata: PathBuf,

    /// Alias key JSON
    #[arg(short, long)]
    pub aliases: PathBuf,

    /// Output strain list (TSV)
    #[arg(short, long)]
    pub out: PathBuf,

    /// Strain column
    #[arg(long, default_value = "strain")]
    pub strain_column: String,

    /// Designated lineage column
    #[arg(long, default_value = "pango_designated")]
    pub lineage_column: String,

    /// Genomes drawn per lineage
    #[arg(long, default_value_t = 3)]
    pub per_lineage: usize,

    /// Extra genomes per designated child lineage
    #[arg(long, default_value_t = 2)]
    pub per_child: usize,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Strains containing this text are always kept
    #[arg(long, default_value = "Wuhan/Hu-1/2019")]
    pub reference_pattern: String,
}

impl SubsampleArgs {
    pub fn columns(&self) -> DesignationColumns {
        DesignationColumns::new(Some(self.strain_column.clone()), self.lineage_column.clone())
    }
}

impl Config {
    /// Parse CLI arguments and validate them
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(PangoError::config("--threads must be positive"));
        }

        match &self.command {
            Command::Reconcile(args) => {
                require_file(&args.tree)?;
                require_file(&args.designations)?;
                require_file(&args.aliases)?;
            }
            Command::DesignationsToJson(args) => {
                require_file(&args.input)?;
            }
            Command::Subsample(args) => {
                require_file(&args.metadata)?;
                require_file(&args.aliases)?;
                if args.per_lineage == 0 {
                    return Err(PangoError::config("--per-lineage must be positive"));
                }
            }
        }
        Ok(())
    }

    /// Number of threads to use
    pub fn nthreads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PangoError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}
