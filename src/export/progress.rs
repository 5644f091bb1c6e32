//! Progress tracking for export runs
//!
//! Shows how many rows of the run are durably uploaded, including rows that
//! earlier attempts of the same run already wrote.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for export runs
pub struct ProgressTracker {
    /// Rows covered by uploaded chunks so far
    exported: AtomicU64,
    /// Rows already covered when this attempt started
    resumed_from: AtomicU64,
    /// Start time of the attempt
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Total rows of the run
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total: u64, enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} rows {msg}")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });

        Self {
            exported: AtomicU64::new(0),
            resumed_from: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Record rows that a previous attempt already uploaded
    pub fn resume_at(&self, rows: u64) {
        self.resumed_from.store(rows, Ordering::Relaxed);
        self.exported.store(rows, Ordering::Relaxed);
        if let Some(ref bar) = self.bar {
            bar.set_position(rows);
        }
    }

    /// Update progress with the highest row index uploaded so far
    pub fn update(&self, exported: u64) {
        self.exported.store(exported, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(exported);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            let fresh = exported.saturating_sub(self.resumed_from.load(Ordering::Relaxed));
            if elapsed > 0.0 {
                bar.set_message(format!("({:.0} rows/sec)", fresh as f64 / elapsed));
            }
        }
    }

    /// Rows uploaded by this attempt
    pub fn uploaded_this_attempt(&self) -> u64 {
        self.exported
            .load(Ordering::Relaxed)
            .saturating_sub(self.resumed_from.load(Ordering::Relaxed))
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
