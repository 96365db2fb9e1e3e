// Build run metrics
//
// Lightweight counters for one build run, logged when the run ends

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for a single build run.
///
/// Uses atomics so a shared reference is enough to record into it.
#[derive(Debug)]
pub struct BuildMetrics {
    /// Mods installed (including those finishing with warnings)
    pub mods_installed: AtomicUsize,

    /// Mods that finished with installer warnings
    pub mods_with_warnings: AtomicUsize,

    /// Mods skipped (already installed, or skipped at the manual gate)
    pub mods_skipped: AtomicUsize,

    /// Mods whose installation failed
    pub mods_failed: AtomicUsize,

    /// Mods uninstalled before reinstalling
    pub mods_uninstalled: AtomicUsize,

    /// Fix hooks applied
    pub fixes_applied: AtomicUsize,

    /// Checkpoint writes
    pub checkpoints_written: AtomicU64,

    /// Time spent inside the installer, in milliseconds
    pub total_install_time_ms: AtomicU64,

    start_time: Instant,
}

impl BuildMetrics {
    pub fn new() -> Self {
        Self {
            mods_installed: AtomicUsize::new(0),
            mods_with_warnings: AtomicUsize::new(0),
            mods_skipped: AtomicUsize::new(0),
            mods_failed: AtomicUsize::new(0),
            mods_uninstalled: AtomicUsize::new(0),
            fixes_applied: AtomicUsize::new(0),
            checkpoints_written: AtomicU64::new(0),
            total_install_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_installed(&self) {
        self.mods_installed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warnings(&self) {
        self.mods_with_warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.mods_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.mods_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_uninstalled(&self) {
        self.mods_uninstalled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fix_applied(&self) {
        self.fixes_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkpoint(&self) {
        self.checkpoints_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent in one installer run
    pub fn record_install_time(&self, duration: Duration) {
        self.total_install_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn installed(&self) -> usize {
        self.mods_installed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.mods_skipped.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average installer time per installed mod in milliseconds
    pub fn avg_install_time_ms(&self) -> f64 {
        let total = self.total_install_time_ms.load(Ordering::Relaxed);
        let count = self.installed();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Build Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Mods: {} installed ({} with warnings), {} skipped, {} failed, {} uninstalled",
            self.installed(),
            self.mods_with_warnings.load(Ordering::Relaxed),
            self.skipped(),
            self.mods_failed.load(Ordering::Relaxed),
            self.mods_uninstalled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Installer time: {:.2}s (avg: {:.2}ms per mod)",
            self.total_install_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_install_time_ms()
        );
        tracing::info!(
            "Fixes applied: {}, checkpoints written: {}",
            self.fixes_applied.load(Ordering::Relaxed),
            self.checkpoints_written.load(Ordering::Relaxed)
        );
    }
}

impl Default for BuildMetrics {
    fn default() -> Self {
        Self::new()
    }
}
