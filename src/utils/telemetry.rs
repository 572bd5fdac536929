//! # Telemetry Blackboard
//!
//! Thread-safe progress tracking for the pipelines. Uses atomic counters that
//! can be cheaply updated from rayon parallel iterators.
//!
//! Worker threads bump counters; a background heartbeat thread periodically
//! reads them and reports progress on stderr.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Processing stage for high-level progress tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Initializing = 0,
    LoadingData = 1,
    Dealiasing = 2,
    CountingLineages = 3,
    Resolving = 4,
    Sampling = 5,
    WritingOutput = 6,
    Complete = 7,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::LoadingData => "Loading Data",
            Stage::Dealiasing => "Dealiasing",
            Stage::CountingLineages => "Counting Lineages",
            Stage::Resolving => "Resolving Nodes",
            Stage::Sampling => "Sampling",
            Stage::WritingOutput => "Writing Output",
            Stage::Complete => "Complete",
        }
    }

    fn from_u64(val: u64) -> Self {
        match val {
            0 => Stage::Initializing,
            1 => Stage::LoadingData,
            2 => Stage::Dealiasing,
            3 => Stage::CountingLineages,
            4 => Stage::Resolving,
            5 => Stage::Sampling,
            6 => Stage::WritingOutput,
            _ => Stage::Complete,
        }
    }
}

/// Shared progress state, designed for cheap atomic updates from hot loops.
///
/// Counters use relaxed ordering; the heartbeat only needs approximate values.
pub struct TelemetryBlackboard {
    stage: AtomicU64,

    nodes_processed: AtomicU64,
    total_nodes: AtomicU64,
    nodes_failed: AtomicU64,

    start_time: Instant,
    last_progress_nanos: AtomicU64,

    shutdown: AtomicBool,
}

impl TelemetryBlackboard {
    /// Create a new telemetry blackboard
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline]
    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u64, Ordering::Relaxed);
        self.touch_progress();
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        Stage::from_u64(self.stage.load(Ordering::Relaxed))
    }

    /// Reset node counters for a new batch of `total` nodes
    pub fn set_total_nodes(&self, total: u64) {
        self.total_nodes.store(total, Ordering::Relaxed);
        self.nodes_processed.store(0, Ordering::Relaxed);
        self.nodes_failed.store(0, Ordering::Relaxed);
        self.touch_progress();
    }

    /// Record one finished node
    #[inline]
    pub fn node_done(&self, failed: bool) {
        self.nodes_processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.nodes_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.touch_progress();
    }

    pub fn nodes_processed(&self) -> u64 {
        self.nodes_processed.load(Ordering::Relaxed)
    }

    pub fn nodes_failed(&self) -> u64 {
        self.nodes_failed.load(Ordering::Relaxed)
    }

    #[inline]
    fn touch_progress(&self) {
        let elapsed = self.start_time.elapsed().as_nanos() as u64;
        self.last_progress_nanos.store(elapsed, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            stage: self.stage(),
            nodes_processed: self.nodes_processed.load(Ordering::Relaxed),
            total_nodes: self.total_nodes.load(Ordering::Relaxed),
            nodes_failed: self.nodes_failed.load(Ordering::Relaxed),
            elapsed_secs: self.elapsed_secs(),
            last_progress_nanos: self.last_progress_nanos.load(Ordering::Relaxed),
            current_nanos: self.start_time.elapsed().as_nanos() as u64,
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Default for TelemetryBlackboard {
    fn default() -> Self {
        Self {
            stage: AtomicU64::new(Stage::Initializing as u64),
            nodes_processed: AtomicU64::new(0),
            total_nodes: AtomicU64::new(0),
            nodes_failed: AtomicU64::new(0),
            start_time: Instant::now(),
            last_progress_nanos: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }
}

/// Snapshot of telemetry state at a point in time
struct TelemetrySnapshot {
    stage: Stage,
    nodes_processed: u64,
    total_nodes: u64,
    nodes_failed: u64,
    elapsed_secs: f64,
    last_progress_nanos: u64,
    current_nanos: u64,
}

/// Heartbeat output configuration
pub struct HeartbeatConfig {
    /// Interval between heartbeats
    pub interval: Duration,
    /// Stall warning threshold (no progress for this long)
    pub stall_threshold: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            stall_threshold: Duration::from_secs(300),
        }
    }
}

/// Handle to the heartbeat thread
pub struct HeartbeatHandle {
    handle: Option<JoinHandle<()>>,
    blackboard: Arc<TelemetryBlackboard>,
}

impl HeartbeatHandle {
    /// Spawn the heartbeat thread
    pub fn spawn(blackboard: Arc<TelemetryBlackboard>, config: HeartbeatConfig) -> io::Result<Self> {
        let bb = blackboard.clone();
        let is_tty = io::stderr().is_terminal();

        let handle = thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || heartbeat_loop(bb, config, is_tty))?;

        Ok(Self {
            handle: Some(handle),
            blackboard,
        })
    }

    /// Signal shutdown and wait for thread to finish
    pub fn shutdown(mut self) {
        self.blackboard.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        // Don't block in drop - just signal shutdown
        self.blackboard.signal_shutdown();
    }
}

/// Format duration in human-readable form
fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{:.0}m{:.0}s", mins, remaining_secs)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

fn heartbeat_loop(bb: Arc<TelemetryBlackboard>, config: HeartbeatConfig, is_tty: bool) {
    let mut last_nodes = 0u64;
    let mut last_time = Instant::now();

    loop {
        // Parked so shutdown() can wake us early
        thread::park_timeout(config.interval);

        if bb.is_shutdown() {
            break;
        }

        let snap = bb.snapshot();

        let now = Instant::now();
        let dt = now.duration_since(last_time).as_secs_f64();
        let velocity = if dt > 0.1 {
            snap.nodes_processed.saturating_sub(last_nodes) as f64 / dt
        } else {
            0.0
        };
        last_nodes = snap.nodes_processed;
        last_time = now;

        let eta = if velocity > 0.0 && snap.total_nodes > snap.nodes_processed {
            format_duration((snap.total_nodes - snap.nodes_processed) as f64 / velocity)
        } else {
            "unknown".to_string()
        };

        let stall = Duration::from_nanos(snap.current_nanos.saturating_sub(snap.last_progress_nanos));
        let is_stalled = stall > config.stall_threshold;

        if is_tty {
            print_tty_progress(&snap, &eta, velocity, is_stalled);
        } else {
            print_log_progress(&snap, &eta, velocity, is_stalled);
        }
    }

    if is_tty {
        eprint!("\r\x1b[K");
        let _ = io::stderr().flush();
    }
}

/// Print progress for TTY (rewriting single line)
fn print_tty_progress(snap: &TelemetrySnapshot, eta: &str, velocity: f64, is_stalled: bool) {
    let progress_pct = if snap.total_nodes > 0 {
        (snap.nodes_processed as f64 / snap.total_nodes as f64 * 100.0).min(100.0)
    } else {
        0.0
    };

    let bar_width = 20;
    let filled = ((progress_pct / 100.0) * bar_width as f64) as usize;
    let bar: String =
        "=".repeat(filled.min(bar_width)) + &" ".repeat(bar_width.saturating_sub(filled));

    let failed_str = if snap.nodes_failed > 0 {
        format!(" ({} failed)", snap.nodes_failed)
    } else {
        String::new()
    };
    let stall_str = if is_stalled { " [STALLED]" } else { "" };

    eprint!(
        "\r[{}] {:>5.1}% | {} N{}/{}{} | {:.0} nodes/s | {} | ETA: {}{}    \x1b[K",
        bar,
        progress_pct,
        snap.stage.as_str(),
        snap.nodes_processed,
        snap.total_nodes,
        failed_str,
        velocity,
        format_duration(snap.elapsed_secs),
        eta,
        stall_str
    );
    let _ = io::stderr().flush();
}

/// Print progress for non-TTY (structured log line)
fn print_log_progress(snap: &TelemetrySnapshot, eta: &str, velocity: f64, is_stalled: bool) {
    eprintln!(
        "[HEARTBEAT] stage=\"{}\" nodes={}/{} failed={} velocity={:.0}/s elapsed={:.0}s eta={} stalled={}",
        snap.stage.as_str(),
        snap.nodes_processed,
        snap.total_nodes,
        snap.nodes_failed,
        velocity,
        snap.elapsed_secs,
        eta,
        is_stalled
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_roundtrip() {
        for stage in [
            Stage::Initializing,
            Stage::LoadingData,
            Stage::Dealiasing,
            Stage::CountingLineages,
            Stage::Resolving,
            Stage::Sampling,
            Stage::WritingOutput,
            Stage::Complete,
        ] {
            assert_eq!(Stage::from_u64(stage as u64), stage);
        }
    }

    #[test]
    fn test_blackboard_updates() {
        let bb = TelemetryBlackboard::new();

        bb.set_stage(Stage::Resolving);
        assert_eq!(bb.stage(), Stage::Resolving);

        bb.set_total_nodes(3);
        bb.node_done(false);
        bb.node_done(true);
        assert_eq!(bb.nodes_processed(), 2);
        assert_eq!(bb.nodes_failed(), 1);
    }

    #[test]
    fn test_heartbeat_shutdown_is_prompt() {
        let bb = TelemetryBlackboard::new();
        let handle = HeartbeatHandle::spawn(
            bb.clone(),
            HeartbeatConfig {
                interval: Duration::from_secs(3600),
                stall_threshold: Duration::from_secs(3600),
            },
        )
        .unwrap();
        let start = Instant::now();
        handle.shutdown();
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m30s");
        assert_eq!(format_duration(3661.0), "1.0h");
    }
}
