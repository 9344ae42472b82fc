//! Bounded-concurrency batch execution
//!
//! The scheduler admits one task per discovered path behind a counting
//! semaphore, so at most `budget` conversions are in flight at once.
//! Individual failures are folded into the aggregate and never stop the
//! run; only orchestration failures (a panicked worker whose outcome was
//! lost) abort the batch.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::convert::Convert;
use crate::error::{AvifpressError, Result};

pub mod report;

pub use report::{BatchReporter, NullReporter, ProgressReporter};

/// Terminal result of one task
#[derive(Debug)]
pub enum TaskOutcome {
    Success { bytes_in: u64, bytes_out: u64 },
    Failure { path: PathBuf, cause: AvifpressError },
}

/// Aggregate statistics for a whole batch run
#[derive(Debug, Default)]
pub struct BatchStats {
    /// Sum of source bytes over successful tasks
    pub total_bytes_before: u64,
    /// Sum of output bytes over successful tasks
    pub total_bytes_after: u64,
    /// Number of successful tasks
    pub succeeded: u64,
    /// One entry per failed task, in completion order
    pub failed_paths: Vec<PathBuf>,
}

impl BatchStats {
    /// Total tasks that reached a terminal outcome
    pub fn total_tasks(&self) -> u64 {
        self.succeeded + self.failed_paths.len() as u64
    }

    /// Bytes saved across all successful conversions
    pub fn saved_bytes(&self) -> u64 {
        self.total_bytes_before.saturating_sub(self.total_bytes_after)
    }

    /// Saved size as a percentage of the input size
    pub fn saved_percentage(&self) -> f64 {
        if self.total_bytes_before == 0 {
            return 0.0;
        }
        self.saved_bytes() as f64 / self.total_bytes_before as f64 * 100.0
    }
}

/// Thread-safe accumulator folding task outcomes into [`BatchStats`]
///
/// Updates are commutative, so completion order never changes the totals.
pub struct Aggregator {
    inner: Mutex<BatchStats>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BatchStats::default()),
        }
    }

    /// Fold one outcome into the running totals; safe under concurrent callers
    pub fn record(&self, outcome: TaskOutcome) {
        let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match outcome {
            TaskOutcome::Success {
                bytes_in,
                bytes_out,
            } => {
                stats.total_bytes_before += bytes_in;
                stats.total_bytes_after += bytes_out;
                stats.succeeded += 1;
            }
            TaskOutcome::Failure { path, .. } => {
                stats.failed_paths.push(path);
            }
        }
    }

    /// Take the final snapshot; only valid once all recorders are done
    pub fn into_stats(self) -> BatchStats {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Run every path to a terminal outcome with at most `budget` in flight.
///
/// Admission blocks on the semaphore once the budget is saturated and
/// resumes as soon as any task completes; permits are released
/// unconditionally, so a failing task never starves the pool. Returns only
/// after every admitted task has settled.
pub async fn run_batch<C: Convert + 'static>(
    converter: Arc<C>,
    paths: Vec<PathBuf>,
    budget: usize,
    reporter: Arc<dyn BatchReporter>,
) -> Result<BatchStats> {
    let budget = budget.max(1);
    let total = paths.len();

    info!("Starting batch of {} tasks, {} in flight max", total, budget);
    reporter.on_phase_start("Converting images", Some(total as u64));

    let semaphore = Arc::new(Semaphore::new(budget));
    let aggregator = Arc::new(Aggregator::new());
    let mut handles = Vec::with_capacity(total);

    for path in paths {
        // Admission gate: suspends here while the budget is saturated
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AvifpressError::batch(format!("Semaphore closed: {}", e)))?;

        let converter = Arc::clone(&converter);
        let aggregator = Arc::clone(&aggregator);
        let reporter = Arc::clone(&reporter);

        handles.push(tokio::spawn(async move {
            // Held until this task settles, success or failure
            let _permit = permit;

            let worker = tokio::task::spawn_blocking({
                let converter = Arc::clone(&converter);
                let path = path.clone();
                move || converter.convert(&path)
            })
            .await;

            let outcome = match worker {
                Ok(Ok((bytes_in, bytes_out))) => TaskOutcome::Success {
                    bytes_in,
                    bytes_out,
                },
                Ok(Err(cause)) => {
                    warn!("Failed to convert {:?}: {}", path, cause);
                    TaskOutcome::Failure { path, cause }
                }
                Err(join_err) => {
                    warn!("Worker panicked on {:?}: {}", path, join_err);
                    TaskOutcome::Failure {
                        path,
                        cause: AvifpressError::batch(format!("Worker panicked: {}", join_err)),
                    }
                }
            };

            aggregator.record(outcome);
            reporter.on_task_completed();
        }));
    }

    // Barrier: every admitted task must settle before the snapshot is taken
    for joined in futures::future::join_all(handles).await {
        joined.map_err(|e| AvifpressError::batch(format!("Task join error: {}", e)))?;
    }

    reporter.on_phase_end();

    let aggregator = Arc::try_unwrap(aggregator)
        .map_err(|_| AvifpressError::batch("Aggregator still shared after join"))?;
    let stats = aggregator.into_stats();

    info!(
        "Batch done: {} succeeded, {} failed",
        stats.succeeded,
        stats.failed_paths.len()
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Instrumented stand-in for the converter: tracks the in-flight peak,
    /// sleeps a path-dependent jitter, and fails on demand.
    struct FakeConvert {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        jitter: bool,
    }

    impl FakeConvert {
        fn new(jitter: bool) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                jitter,
            }
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl Convert for FakeConvert {
        fn convert(&self, path: &Path) -> crate::error::Result<(u64, u64)> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if self.jitter {
                let mut hasher = DefaultHasher::new();
                path.hash(&mut hasher);
                std::thread::sleep(Duration::from_millis(hasher.finish() % 15));
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if path.to_string_lossy().contains("bad") {
                Err(AvifpressError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "simulated decode failure",
                )))
            } else {
                Ok((1000, 400))
            }
        }
    }

    fn fake_paths(count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| PathBuf::from(format!("img{i:03}.jpg")))
            .collect()
    }

    #[test]
    fn test_aggregator_concurrent_records_lose_nothing() {
        let aggregator = Arc::new(Aggregator::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let aggregator = Arc::clone(&aggregator);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        if i % 10 == 0 {
                            aggregator.record(TaskOutcome::Failure {
                                path: PathBuf::from(format!("t{t}-{i}.jpg")),
                                cause: AvifpressError::batch("x"),
                            });
                        } else {
                            aggregator.record(TaskOutcome::Success {
                                bytes_in: 10,
                                bytes_out: 3,
                            });
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = Arc::try_unwrap(aggregator).ok().unwrap().into_stats();
        assert_eq!(stats.total_tasks(), 800);
        assert_eq!(stats.succeeded, 720);
        assert_eq!(stats.failed_paths.len(), 80);
        assert_eq!(stats.total_bytes_before, 7200);
        assert_eq!(stats.total_bytes_after, 2160);
    }

    #[test]
    fn test_stats_derived_values() {
        let stats = BatchStats {
            total_bytes_before: 1000,
            total_bytes_after: 250,
            succeeded: 2,
            failed_paths: vec![PathBuf::from("d.jpeg")],
        };
        assert_eq!(stats.total_tasks(), 3);
        assert_eq!(stats.saved_bytes(), 750);
        assert!((stats.saved_percentage() - 75.0).abs() < f64::EPSILON);

        let empty = BatchStats::default();
        assert_eq!(empty.saved_percentage(), 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_budget_bounds_in_flight_tasks() {
        for budget in [1usize, 2, 3] {
            let converter = Arc::new(FakeConvert::new(true));
            let stats = run_batch(
                Arc::clone(&converter),
                fake_paths(24),
                budget,
                Arc::new(NullReporter),
            )
            .await
            .unwrap();

            assert_eq!(stats.total_tasks(), 24);
            assert!(
                converter.peak() <= budget,
                "peak {} exceeded budget {}",
                converter.peak(),
                budget
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_do_not_stop_admission() {
        let mut paths = fake_paths(10);
        paths.insert(0, PathBuf::from("bad-early.jpg"));
        paths.push(PathBuf::from("bad-late.jpg"));

        let converter = Arc::new(FakeConvert::new(false));
        let stats = run_batch(converter, paths, 2, Arc::new(NullReporter))
            .await
            .unwrap();

        assert_eq!(stats.succeeded, 10);
        assert_eq!(stats.failed_paths.len(), 2);
        assert_eq!(stats.total_tasks(), 12);
        assert_eq!(stats.total_bytes_before, 10_000);
        assert_eq!(stats.total_bytes_after, 4_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_totals_invariant_under_budget_and_latency() {
        let paths = fake_paths(30);

        let sequential = run_batch(
            Arc::new(FakeConvert::new(true)),
            paths.clone(),
            1,
            Arc::new(NullReporter),
        )
        .await
        .unwrap();

        let parallel = run_batch(
            Arc::new(FakeConvert::new(true)),
            paths,
            8,
            Arc::new(NullReporter),
        )
        .await
        .unwrap();

        assert_eq!(sequential.total_bytes_before, parallel.total_bytes_before);
        assert_eq!(sequential.total_bytes_after, parallel.total_bytes_after);
        assert_eq!(sequential.succeeded, parallel.succeeded);
        assert_eq!(sequential.total_tasks(), parallel.total_tasks());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_batch_yields_empty_stats() {
        let stats = run_batch(
            Arc::new(FakeConvert::new(false)),
            Vec::new(),
            4,
            Arc::new(NullReporter),
        )
        .await
        .unwrap();

        assert_eq!(stats.total_tasks(), 0);
        assert_eq!(stats.total_bytes_before, 0);
        assert!(stats.failed_paths.is_empty());
    }
}
