//! Progress reporting for batch runs

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// One-way observer of batch progress
///
/// Notifications never influence scheduling or aggregation; implementations
/// must be cheap enough to call from hot paths.
pub trait BatchReporter: Send + Sync {
    /// A phase begins; `total` is None for unbounded phases (discovery)
    fn on_phase_start(&self, label: &str, total: Option<u64>);

    /// `count` more matching files were found during discovery
    fn on_discovered(&self, count: u64);

    /// One task reached a terminal outcome
    fn on_task_completed(&self);

    /// The current phase is over
    fn on_phase_end(&self);
}

/// Reporter that ignores everything; used headless and in tests
pub struct NullReporter;

impl BatchReporter for NullReporter {
    fn on_phase_start(&self, _label: &str, _total: Option<u64>) {}
    fn on_discovered(&self, _count: u64) {}
    fn on_task_completed(&self) {}
    fn on_phase_end(&self) {}
}

/// Terminal progress reporter backed by indicatif
///
/// Discovery renders as a spinner with a running count; conversion renders
/// as a bounded bar.
pub struct ProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({elapsed_precise}, {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReporter for ProgressReporter {
    fn on_phase_start(&self, label: &str, total: Option<u64>) {
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(Self::bar_style());
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(Self::spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        bar.set_message(label.to_string());

        let mut slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(bar);
    }

    fn on_discovered(&self, count: u64) {
        let slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = slot.as_ref() {
            bar.inc(count);
        }
    }

    fn on_task_completed(&self) {
        let slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = slot.as_ref() {
            bar.inc(1);
        }
    }

    fn on_phase_end(&self) {
        let mut slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = slot.take() {
            bar.finish_and_clear();
        }
    }
}
