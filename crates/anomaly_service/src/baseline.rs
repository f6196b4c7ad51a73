use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use vitalstream_domain::error::DomainResult;
use vitalstream_domain::measurement::VitalMetric;

/// Rolling baseline for one `(patient, metric)` pair: the last `window`
/// samples with derived mean and standard deviation.
#[derive(Debug, Clone)]
pub struct Baseline {
    values: VecDeque<f64>,
    window: usize,
    mean: f64,
    stddev: f64,
    pub updated_at: DateTime<Utc>,
}

impl Baseline {
    pub fn new(window: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window),
            window: window.max(1),
            mean: 0.0,
            stddev: 0.0,
            updated_at: Utc::now(),
        }
    }

    pub fn from_values(window: usize, values: impl IntoIterator<Item = f64>) -> Self {
        let mut baseline = Self::new(window);
        for value in values {
            baseline.push(value);
        }
        baseline
    }

    /// Appends a sample, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.updated_at = Utc::now();
        self.recompute();
    }

    fn recompute(&mut self) {
        let n = self.values.len();
        if n == 0 {
            self.mean = 0.0;
            self.stddev = 0.0;
            return;
        }

        let sum: f64 = self.values.iter().sum();
        self.mean = sum / n as f64;

        if n < 2 {
            self.stddev = 0.0;
            return;
        }

        let variance: f64 = self
            .values
            .iter()
            .map(|v| (v - self.mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        self.stddev = variance.sqrt();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn snapshot(&self) -> BaselineSnapshot {
        BaselineSnapshot {
            count: self.values.len(),
            mean: self.mean,
            stddev: self.stddev,
        }
    }
}

/// Baseline statistics at a point in time, used to score the sample that is
/// being appended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineSnapshot {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
}

impl BaselineSnapshot {
    pub fn empty() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            stddev: 0.0,
        }
    }
}

/// Storage for rolling baselines.
///
/// Implementations must serialize updates per `(patient, metric)` key: the
/// cache store does its read-append-trim in one atomic server-side script,
/// the in-process store holds a per-key map entry lock for the duration of
/// the read-modify-write.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Statistics for the current baseline, without mutating it.
    async fn fetch(&self, patient_id: &str, metric: VitalMetric)
        -> DomainResult<BaselineSnapshot>;

    /// Atomically reads the statistics of the baseline as it was before this
    /// call and appends `value` to it.
    async fn fetch_and_update(
        &self,
        patient_id: &str,
        metric: VitalMetric,
        value: f64,
    ) -> DomainResult<BaselineSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_baseline_has_zero_stats() {
        let baseline = Baseline::new(100);
        let snapshot = baseline.snapshot();
        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.mean, 0.0);
        assert_eq!(snapshot.stddev, 0.0);
    }

    #[test]
    fn mean_and_stddev_track_samples() {
        let baseline = Baseline::from_values(100, [70.0, 72.0, 74.0]);
        let snapshot = baseline.snapshot();
        assert_eq!(snapshot.count, 3);
        assert!((snapshot.mean - 72.0).abs() < 1e-9);
        assert!((snapshot.stddev - 2.0).abs() < 1e-9);
    }

    #[test]
    fn window_evicts_oldest_samples() {
        let mut baseline = Baseline::new(3);
        for value in [1.0, 2.0, 3.0, 4.0] {
            baseline.push(value);
        }
        assert_eq!(baseline.len(), 3);
        // 1.0 evicted: mean over [2, 3, 4].
        assert!((baseline.snapshot().mean - 3.0).abs() < 1e-9);
    }

    #[test]
    fn single_sample_has_no_spread() {
        let baseline = Baseline::from_values(100, [98.0]);
        assert_eq!(baseline.snapshot().stddev, 0.0);
    }
}
