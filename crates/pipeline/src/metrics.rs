use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, Copy)]
struct StageStats {
    total: Duration,
    runs: usize,
    items: usize,
}

/// Per-stage wall time and item counts for one pipeline run
#[derive(Default)]
pub struct StageMetrics {
    stages: Mutex<BTreeMap<String, StageStats>>,

    // Counters
    llm_failures: AtomicUsize,
    store_failures: AtomicUsize,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stage(&self, stage: &str, duration: Duration, items: usize) {
        if let Ok(mut stages) = self.stages.lock() {
            let stats = stages.entry(stage.to_string()).or_default();
            stats.total += duration;
            stats.runs += 1;
            stats.items += items;
        }
    }

    pub fn record_llm_failure(&self) {
        self.llm_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Stage name -> total milliseconds
    pub fn timings_ms(&self) -> BTreeMap<String, f64> {
        self.stages
            .lock()
            .map(|stages| {
                stages
                    .iter()
                    .map(|(name, stats)| (name.clone(), stats.total.as_secs_f64() * 1000.0))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let stages = self
            .stages
            .lock()
            .map(|stages| {
                stages
                    .iter()
                    .map(|(name, stats)| {
                        (
                            name.clone(),
                            StageSnapshot {
                                total_ms: stats.total.as_secs_f64() * 1000.0,
                                runs: stats.runs,
                                items: stats.items,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            stages,
            llm_failures: self.llm_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StageSnapshot {
    pub total_ms: f64,
    pub runs: usize,
    pub items: usize,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<String, StageSnapshot>,
    pub llm_failures: usize,
    pub store_failures: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
