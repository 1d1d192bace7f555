// src/progress.rs

//! Progress reporting for synchronization runs
//!
//! The transaction and scheduler report through the `ProgressTracker` trait:
//! - `BarProgress`: indicatif progress bar for the CLI
//! - `LogProgress`: tracing output when stderr is not a terminal
//! - `SilentProgress`: no-op, for `--quiet`

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Thread-safe progress sink
pub trait ProgressTracker: Send + Sync {
    fn set_message(&self, message: &str);

    /// Reset the position and set the number of steps of a new phase
    fn start_phase(&self, message: &str, length: u64);

    fn increment(&self, amount: u64);

    fn position(&self) -> u64;

    fn length(&self) -> u64;

    fn finish_with_message(&self, message: &str);

    fn is_finished(&self) -> bool;
}

/// Shared counters for the trackers below
#[derive(Debug, Default)]
struct Counters {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl Counters {
    fn reset(&self, length: u64) {
        self.position.store(0, Ordering::Relaxed);
        self.length.store(length, Ordering::Relaxed);
    }

    fn add(&self, amount: u64) -> u64 {
        self.position.fetch_add(amount, Ordering::Relaxed) + amount
    }
}

/// Discards everything but the counters
#[derive(Debug, Default)]
pub struct SilentProgress {
    counters: Counters,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn start_phase(&self, _message: &str, length: u64) {
        self.counters.reset(length);
    }

    fn increment(&self, amount: u64) {
        self.counters.add(amount);
    }

    fn position(&self) -> u64 {
        self.counters.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.counters.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {
        self.counters.finished.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::Relaxed)
    }
}

/// Logs phases and completed steps at info level
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    counters: Counters,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: Counters::default(),
        }
    }
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn start_phase(&self, message: &str, length: u64) {
        self.counters.reset(length);
        info!("{}: {} ({} steps)", self.name, message, length);
    }

    fn increment(&self, amount: u64) {
        let position = self.counters.add(amount);
        let length = self.length();
        if length > 0 {
            info!("{}: {}/{}", self.name, position, length);
        }
    }

    fn position(&self) -> u64 {
        self.counters.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.counters.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.counters.finished.store(true, Ordering::Relaxed);
        info!("{}: {}", self.name, message);
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::Relaxed)
    }
}

/// Terminal progress bar
pub struct BarProgress {
    bar: ProgressBar,
    finished: AtomicBool,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} {msg:30} [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self {
            bar,
            finished: AtomicBool::new(false),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker for BarProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn start_phase(&self, message: &str, length: u64) {
        self.bar.set_length(length);
        self.bar.set_position(0);
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        self.bar.finish_with_message(message.to_string());
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_progress() {
        let progress = SilentProgress::new();
        progress.start_phase("Downloading", 10);
        progress.increment(3);
        assert_eq!(progress.position(), 3);
        assert_eq!(progress.length(), 10);

        progress.start_phase("Applying", 2);
        assert_eq!(progress.position(), 0);

        assert!(!progress.is_finished());
        progress.finish_with_message("done");
        assert!(progress.is_finished());
    }

    #[test]
    fn test_log_progress() {
        let progress = LogProgress::new("sync");
        progress.start_phase("Fetching indexes", 4);
        progress.increment(2);
        progress.increment(2);
        assert_eq!(progress.position(), 4);
        progress.finish_with_message("complete");
        assert!(progress.is_finished());
    }

    #[test]
    fn test_bar_progress_counts() {
        let progress = BarProgress::new();
        progress.start_phase("Downloading", 5);
        progress.increment(2);
        assert_eq!(progress.position(), 2);
        assert_eq!(progress.length(), 5);
    }
}
