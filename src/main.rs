//! # Pango Nodes: Lineage Consensus for Phylogeny Nodes
//!
//! Assign PANGO lineages to the internal nodes of a tree from tip designations.
//!
//! ## Usage
//! ```bash
//! # Reconcile a tree with designations
//! pango-nodes reconcile -t tree.nwk -d lineages.csv -a alias_key.json -o nodes.json
//!
//! # Tip designations as node JSON
//! pango-nodes designations-to-json lineages.csv tips.json
//!
//! # Lineage-balanced subsample
//! pango-nodes subsample -m open_pango_metadata.tsv -a alias_key.json -o pango_subsample.tsv
//!
//! # With profiling output
//! pango-nodes --profile reconcile -t tree.nwk -d lineages.csv -a alias_key.json -o nodes.json
//! ```

use std::time::Instant;

use pango_nodes::config::{Command, Config};
use pango_nodes::pipelines::{DesignationsPipeline, ReconcilePipeline, SubsamplePipeline};
use pango_nodes::utils::telemetry::{HeartbeatConfig, HeartbeatHandle, Stage, TelemetryBlackboard};
use pango_nodes::utils::threading::configure_global_pool;
use pango_nodes::Result;

/// Exit code when `--strict` is set and some nodes failed to resolve
const EXIT_UNRESOLVED: i32 = 2;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_UNRESOLVED),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins over `-v`. With `profile`, span close events carry timings.
fn init_logging(verbose: u8, profile: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = match (verbose, profile) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    if profile {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                layer
                    .with_span_events(FmtSpan::CLOSE)
                    .with_timer(fmt::time::uptime()),
            )
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

/// Returns `Ok(false)` when a strict run left nodes unresolved
fn run() -> Result<bool> {
    let start = Instant::now();

    let config = Config::parse_and_validate()?;

    init_logging(config.verbose, config.profile);
    if config.profile {
        eprintln!("=== Profiling enabled ===\n");
    }

    let n_threads = config.nthreads();
    configure_global_pool(n_threads);

    eprintln!("pango-nodes v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Threads: {}", n_threads);

    let telemetry = TelemetryBlackboard::new();
    let heartbeat = match HeartbeatHandle::spawn(telemetry.clone(), HeartbeatConfig::default()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("heartbeat disabled: {}", e);
            None
        }
    };

    let mut ok = true;
    match config.command {
        Command::Reconcile(args) => {
            eprintln!("Mode: Reconcile");
            eprintln!("Tree: {:?}", args.tree);
            eprintln!("Designations: {:?}", args.designations);

            let strict = args.strict;
            let mut pipeline = ReconcilePipeline::new(args, Some(telemetry.clone()));
            let report = pipeline.run()?;

            eprintln!(
                "Resolved {} internal nodes ({} failed, {} leaves without designation)",
                report.resolved.len(),
                report.failures.len(),
                report.missing_leaves.len()
            );
            if strict && !report.is_complete() {
                eprintln!("Strict mode: {} nodes unresolved", report.failures.len());
                ok = false;
            }
        }
        Command::DesignationsToJson(args) => {
            eprintln!("Mode: Designations to JSON");
            eprintln!("Input: {:?}", args.input);

            let mut pipeline = DesignationsPipeline::new(args);
            let data = pipeline.run()?;
            eprintln!("Wrote {} nodes", data.len());
        }
        Command::Subsample(args) => {
            eprintln!("Mode: Subsample");
            eprintln!("Metadata: {:?}", args.metadata);

            let mut pipeline = SubsamplePipeline::new(args, Some(telemetry.clone()));
            let selected = pipeline.run()?;
            eprintln!("Selected {} strains", selected.len());
        }
    }

    telemetry.set_stage(Stage::Complete);
    if let Some(heartbeat) = heartbeat {
        heartbeat.shutdown();
    }

    let elapsed = start.elapsed();
    eprintln!("\nCompleted in {:.2}s", elapsed.as_secs_f64());

    Ok(ok)
}
