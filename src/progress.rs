//! Progress reporting for hashing stages.
//!
//! Every stage publishes one or more [`ProgressCounter`]s as `(advanced,
//! total)` pairs. The full-hash stage, for example, publishes a file counter
//! and an independent byte counter, since enumeration cost follows file count
//! while hashing cost follows bytes. Counters only ever grow; consumers read
//! them through [`ProgressCounter::snapshot`] and never mutate them.
//!
//! Consumers subscribe by implementing [`ProgressCallback`]. [`Progress`] is
//! the terminal implementation built on indicatif.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// What a counter measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUnit {
    /// Number of files.
    Files,
    /// Number of bytes.
    Bytes,
}

/// A monotonically increasing `(advanced, total)` pair.
#[derive(Debug)]
pub struct ProgressCounter {
    label: String,
    unit: CounterUnit,
    total: u64,
    advanced: AtomicU64,
}

impl ProgressCounter {
    fn new(label: impl Into<String>, unit: CounterUnit, total: u64) -> Self {
        Self {
            label: label.into(),
            unit,
            total,
            advanced: AtomicU64::new(0),
        }
    }

    /// Counter label, e.g. `"files"` or `"bytes (other)"`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Unit of the counter.
    #[must_use]
    pub fn unit(&self) -> CounterUnit {
        self.unit
    }

    /// Current `(advanced, total)`.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64) {
        (self.advanced.load(Ordering::SeqCst), self.total)
    }

    fn advance(&self, delta: u64) {
        self.advanced.fetch_add(delta, Ordering::SeqCst);
    }
}

/// Progress callback for the duplicate detection stages.
///
/// Implementations must be thread-safe: hashing runs on a worker pool and
/// reports from whichever thread finished the file.
pub trait ProgressCallback: Send + Sync {
    /// Called when a stage starts, with every counter it will advance.
    fn on_stage_start(&self, stage: &str, counters: &[Arc<ProgressCounter>]);

    /// Called after `counter` advanced because `path` was processed.
    fn on_progress(&self, _counter: &ProgressCounter, _path: &Path) {}

    /// Called when a stage completes (also after cancellation).
    fn on_stage_end(&self, stage: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Counters of one running stage plus the optional subscriber.
pub(crate) struct StageTracker<'a> {
    stage: &'static str,
    counters: Vec<Arc<ProgressCounter>>,
    callback: Option<&'a Arc<dyn ProgressCallback>>,
}

impl<'a> StageTracker<'a> {
    /// Create the stage counters and notify the subscriber.
    pub(crate) fn start(
        stage: &'static str,
        callback: Option<&'a Arc<dyn ProgressCallback>>,
        counters: &[(&str, CounterUnit, u64)],
    ) -> Self {
        let counters: Vec<Arc<ProgressCounter>> = counters
            .iter()
            .map(|(label, unit, total)| Arc::new(ProgressCounter::new(*label, *unit, *total)))
            .collect();

        if let Some(cb) = callback {
            cb.on_stage_start(stage, &counters);
        }

        Self {
            stage,
            counters,
            callback,
        }
    }

    /// Advance counter `idx` by `delta`.
    pub(crate) fn advance(&self, idx: usize, delta: u64, path: &Path) {
        if let Some(counter) = self.counters.get(idx) {
            counter.advance(delta);
            if let Some(cb) = self.callback {
                cb.on_progress(counter, path);
            }
        }
    }
}

impl Drop for StageTracker<'_> {
    fn drop(&mut self) {
        if let Some(cb) = self.callback {
            cb.on_stage_end(self.stage);
        }
    }
}

/// Progress reporter using indicatif.
///
/// One bar per counter of the running stage.
pub struct Progress {
    multi: MultiProgress,
    bars: Mutex<Vec<(String, ProgressBar)>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupfind::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(Vec::new()),
            quiet,
        }
    }

    fn files_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn bytes_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.green/blue}] {bytes}/{total_bytes} {prefix} {bytes_per_sec} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_stage_start(&self, stage: &str, counters: &[Arc<ProgressCounter>]) {
        if self.quiet {
            return;
        }

        let mut bars = self.bars.lock().unwrap();
        for counter in counters {
            let (_, total) = counter.snapshot();
            let pb = self.multi.add(ProgressBar::new(total));
            match counter.unit() {
                CounterUnit::Files => pb.set_style(Self::files_style()),
                CounterUnit::Bytes => pb.set_style(Self::bytes_style()),
            }
            pb.set_prefix(format!("{} {}", stage, counter.label()));
            bars.push((counter.label().to_string(), pb));
        }
    }

    fn on_progress(&self, counter: &ProgressCounter, path: &Path) {
        if self.quiet {
            return;
        }

        let bars = self.bars.lock().unwrap();
        if let Some((_, pb)) = bars.iter().find(|(label, _)| label == counter.label()) {
            pb.set_position(counter.snapshot().0);
            if counter.unit() == CounterUnit::Files {
                pb.set_message(truncate_path(&path.to_string_lossy(), 30));
            }
        }
    }

    fn on_stage_end(&self, _stage: &str) {
        if self.quiet {
            return;
        }

        for (_, pb) in self.bars.lock().unwrap().drain(..) {
            pb.finish_and_clear();
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.multi.println(message);
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.len() >= max_len {
        let tail: String = file_name
            .chars()
            .rev()
            .take(max_len - 3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
