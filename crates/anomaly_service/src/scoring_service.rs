use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use tracing::debug;

use vitalstream_domain::error::{DomainError, DomainResult};
use vitalstream_domain::events::{AnomalyScores, OverallRiskScore, VitalScore};
use vitalstream_domain::measurement::{VitalMetric, VitalSample};
use vitalstream_domain::repository::{ScoreVitalsOutcome, ScoreVitalsRequest, VitalsScorer};
use vitalstream_domain::severity::AnomalySeverity;

pub const SCORING_ENGINE: &str = "z_score_baseline";
pub const SCORING_ENGINE_VERSION: &str = "1.0.0";

const AGGREGATION_METHOD: &str = "z_score_based";

// Bound on the remembered source-event ids when dedupe is enabled.
const SEEN_EVENTS_CAPACITY: usize = 4096;

use crate::baseline::{BaselineSnapshot, BaselineStore};

#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    /// Ring-buffer window per `(patient, metric)` baseline.
    pub window: usize,
    /// Below this sample count the bootstrap range score is used.
    pub min_samples: usize,
    /// Floor applied to the baseline spread before dividing.
    pub stddev_floor: f64,
    /// When set, a request replaying an already-seen `source_event_id` is
    /// scored without updating the baseline.
    pub dedupe_by_source_event: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window: 100,
            min_samples: 10,
            stddev_floor: 0.1,
            dedupe_by_source_event: false,
        }
    }
}

/// Soft "looks healthy" range and hard physiological range per metric, on the
/// canonical scale (bpm / percent / Celsius). Bootstrap scores interpolate
/// between the two while the baseline is still warming up.
fn metric_ranges(metric: VitalMetric) -> ((f64, f64), (f64, f64)) {
    match metric {
        VitalMetric::HeartRate => ((60.0, 100.0), (20.0, 240.0)),
        VitalMetric::OxygenSaturation => ((95.0, 100.0), (50.0, 100.0)),
        VitalMetric::Temperature => ((36.1, 37.2), (30.0, 45.0)),
    }
}

/// Relative weights for the overall risk score, renormalized over the
/// metrics actually present.
fn metric_weight(metric: VitalMetric) -> f64 {
    match metric {
        VitalMetric::HeartRate => 0.35,
        VitalMetric::OxygenSaturation => 0.35,
        VitalMetric::Temperature => 0.30,
    }
}

/// Z-score anomaly scoring over rolling per-patient baselines.
pub struct ScoringService {
    store: Arc<dyn BaselineStore>,
    config: ScoringConfig,
    seen_events: Mutex<SeenEvents>,
}

struct SeenEvents {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl SeenEvents {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            set: HashSet::new(),
        }
    }

    fn contains(&self, event_id: &str) -> bool {
        self.set.contains(event_id)
    }

    fn insert(&mut self, event_id: String) {
        if self.set.contains(&event_id) {
            return;
        }
        if self.order.len() == SEEN_EVENTS_CAPACITY {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.order.push_back(event_id.clone());
        self.set.insert(event_id);
    }
}

impl ScoringService {
    pub fn new(store: Arc<dyn BaselineStore>, config: ScoringConfig) -> Self {
        Self {
            store,
            config,
            seen_events: Mutex::new(SeenEvents::new()),
        }
    }

    fn is_duplicate(&self, source_event_id: Option<&str>) -> bool {
        if !self.config.dedupe_by_source_event {
            return false;
        }
        let Some(event_id) = source_event_id else {
            return false;
        };
        self.seen_events
            .lock()
            .expect("seen-events lock poisoned")
            .contains(event_id)
    }

    fn remember(&self, source_event_id: Option<&str>) {
        if !self.config.dedupe_by_source_event {
            return;
        }
        if let Some(event_id) = source_event_id {
            self.seen_events
                .lock()
                .expect("seen-events lock poisoned")
                .insert(event_id.to_string());
        }
    }

    async fn score_metric(
        &self,
        patient_id: &str,
        metric: VitalMetric,
        sample: &VitalSample,
        duplicate: bool,
    ) -> DomainResult<VitalScore> {
        // Baselines live on the canonical scale so one baseline never mixes
        // Fahrenheit and Celsius readings.
        let value = sample.value_in_celsius();

        let snapshot = if duplicate {
            self.store.fetch(patient_id, metric).await?
        } else {
            self.store.fetch_and_update(patient_id, metric, value).await?
        };

        let score = if snapshot.count < self.config.min_samples {
            self.bootstrap_score(metric, value, snapshot.count)
        } else {
            self.z_score(metric, value, &snapshot)
        };

        debug!(
            patient_id,
            metric = metric.as_str(),
            score = score.score,
            samples = snapshot.count,
            duplicate,
            "Scored vital"
        );

        Ok(score)
    }

    /// Range-based score used while the baseline has fewer than
    /// `min_samples` observations: 0.2 inside the soft normal range, rising
    /// linearly to 0.5 at the hard physiological bound.
    fn bootstrap_score(&self, metric: VitalMetric, value: f64, samples: usize) -> VitalScore {
        let ((soft_min, soft_max), (hard_min, hard_max)) = metric_ranges(metric);

        let overshoot = if value > soft_max {
            ratio(value - soft_max, hard_max - soft_max)
        } else if value < soft_min {
            ratio(soft_min - value, soft_min - hard_min)
        } else {
            0.0
        };

        let (score, severity, position) = if overshoot > 0.0 {
            (
                0.2 + 0.3 * overshoot,
                AnomalySeverity::Low,
                "outside",
            )
        } else {
            (0.2, AnomalySeverity::Normal, "within")
        };

        VitalScore {
            score,
            severity,
            explanation: Some(format!(
                "{} value {value:.2} is {position} normal range ({soft_min}-{soft_max}), \
                 insufficient baseline data ({samples} samples)",
                metric.as_str().to_uppercase(),
            )),
        }
    }

    fn z_score(&self, metric: VitalMetric, value: f64, snapshot: &BaselineSnapshot) -> VitalScore {
        let spread = snapshot.stddev.max(self.config.stddev_floor);
        let z = (value - snapshot.mean).abs() / spread;

        let score = if z <= 1.0 {
            0.2 * z
        } else if z <= 2.0 {
            0.2 + 0.2 * (z - 1.0)
        } else if z <= 3.0 {
            0.4 + 0.2 * (z - 2.0)
        } else if z <= 4.0 {
            0.6 + 0.2 * (z - 3.0)
        } else {
            0.8 + (0.2 * (z - 4.0) / 4.0).min(0.2)
        };
        let score = score.clamp(0.0, 1.0);

        let direction = if value > snapshot.mean { "above" } else { "below" };
        VitalScore {
            score,
            severity: AnomalySeverity::from_score(score),
            explanation: Some(format!(
                "{} value {value:.2} is {direction} baseline (mean={:.2}, std={:.2}, \
                 z-score={z:.2}). Anomaly score: {score:.2}",
                metric.as_str().to_uppercase(),
                snapshot.mean,
                snapshot.stddev,
            )),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= f64::EPSILON {
        1.0
    } else {
        (numerator / denominator).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl VitalsScorer for ScoringService {
    async fn score_vitals(&self, request: ScoreVitalsRequest) -> DomainResult<ScoreVitalsOutcome> {
        if request.patient_id.trim().is_empty() {
            return Err(DomainError::InvalidRequest("patient_id is required".into()));
        }
        if request.vitals.is_empty() {
            return Err(DomainError::InvalidRequest(
                "at least one vital sign is required".into(),
            ));
        }

        let duplicate = self.is_duplicate(request.source_event_id.as_deref());

        let mut scores = AnomalyScores::default();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for metric in VitalMetric::ALL {
            let Some(sample) = request.vitals.get(metric) else {
                continue;
            };

            let score = self
                .score_metric(&request.patient_id, metric, sample, duplicate)
                .await?;

            weighted_sum += metric_weight(metric) * score.score;
            weight_total += metric_weight(metric);

            match metric {
                VitalMetric::HeartRate => scores.heart_rate = Some(score),
                VitalMetric::OxygenSaturation => scores.oxygen_saturation = Some(score),
                VitalMetric::Temperature => scores.temperature = Some(score),
            }
        }

        self.remember(request.source_event_id.as_deref());

        let overall = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };

        Ok(ScoreVitalsOutcome {
            anomaly_scores: scores,
            overall_risk_score: OverallRiskScore {
                score: overall,
                severity: AnomalySeverity::from_score(overall),
                aggregation_method: AGGREGATION_METHOD.to_string(),
            },
            scoring_engine: SCORING_ENGINE.to_string(),
            scoring_engine_version: SCORING_ENGINE_VERSION.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_process_store::InProcessBaselineStore;
    use chrono::Utc;
    use vitalstream_domain::measurement::{VitalUnit, Vitals};

    fn request(patient_id: &str, vitals: Vitals) -> ScoreVitalsRequest {
        ScoreVitalsRequest {
            patient_id: patient_id.to_string(),
            device_id: "D1".to_string(),
            timestamp: Utc::now(),
            vitals,
            thresholds: None,
            source_event_id: Some("evt_source".to_string()),
        }
    }

    fn vitals(hr: Option<f64>, spo2: Option<f64>, temp_c: Option<f64>) -> Vitals {
        let mut v = Vitals::default();
        let ts = Utc::now();
        if let Some(hr) = hr {
            v.insert(VitalMetric::HeartRate, VitalSample { value: hr, unit: VitalUnit::Bpm, timestamp: ts });
        }
        if let Some(spo2) = spo2 {
            v.insert(
                VitalMetric::OxygenSaturation,
                VitalSample { value: spo2, unit: VitalUnit::Percent, timestamp: ts },
            );
        }
        if let Some(temp) = temp_c {
            v.insert(
                VitalMetric::Temperature,
                VitalSample { value: temp, unit: VitalUnit::Celsius, timestamp: ts },
            );
        }
        v
    }

    fn service(config: ScoringConfig) -> (ScoringService, Arc<InProcessBaselineStore>) {
        let store = Arc::new(InProcessBaselineStore::new(config.window));
        (ScoringService::new(store.clone(), config), store)
    }

    async fn warm_baseline(service: &ScoringService, patient: &str, hr: f64, count: usize) {
        for i in 0..count {
            let mut req = request(patient, vitals(Some(hr), None, None));
            req.source_event_id = Some(format!("evt_warm_{i}"));
            service.score_vitals(req).await.unwrap();
        }
    }

    #[tokio::test]
    async fn bootstrap_score_in_normal_range_is_low_and_calm() {
        let (service, _) = service(ScoringConfig::default());

        let outcome = service
            .score_vitals(request("P1", vitals(Some(72.0), None, None)))
            .await
            .unwrap();

        let hr = outcome.anomaly_scores.heart_rate.unwrap();
        assert_eq!(hr.score, 0.2);
        assert_eq!(hr.severity, AnomalySeverity::Normal);
        assert!(hr.explanation.unwrap().contains("insufficient baseline"));
        assert!(outcome.overall_risk_score.score <= 0.5);
    }

    #[tokio::test]
    async fn bootstrap_score_scales_toward_hard_bound() {
        let (service, _) = service(ScoringConfig::default());

        // Halfway between soft max (100) and hard max (240).
        let outcome = service
            .score_vitals(request("P1", vitals(Some(170.0), None, None)))
            .await
            .unwrap();

        let hr = outcome.anomaly_scores.heart_rate.unwrap();
        assert!((hr.score - 0.35).abs() < 1e-9);
        assert_eq!(hr.severity, AnomalySeverity::Low);

        // At the hard bound the bootstrap score saturates at 0.5.
        let outcome = service
            .score_vitals(request("P2", vitals(Some(240.0), None, None)))
            .await
            .unwrap();
        assert!((outcome.anomaly_scores.heart_rate.unwrap().score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stable_baseline_scores_steady_values_normal() {
        let (service, _) = service(ScoringConfig::default());
        warm_baseline(&service, "P1", 72.0, 20).await;

        let outcome = service
            .score_vitals(request("P1", vitals(Some(72.0), None, None)))
            .await
            .unwrap();

        let hr = outcome.anomaly_scores.heart_rate.unwrap();
        assert!(hr.score < 0.2);
        assert_eq!(hr.severity, AnomalySeverity::Normal);
    }

    #[tokio::test]
    async fn large_deviation_scores_critical() {
        let (service, _) = service(ScoringConfig::default());
        warm_baseline(&service, "P1", 72.0, 20).await;

        let outcome = service
            .score_vitals(request("P1", vitals(Some(160.0), None, None)))
            .await
            .unwrap();

        let hr = outcome.anomaly_scores.heart_rate.unwrap();
        assert!(hr.score >= 0.8);
        assert_eq!(hr.severity, AnomalySeverity::Critical);
        assert!(hr.explanation.unwrap().contains("above baseline"));
    }

    #[tokio::test]
    async fn scores_stay_in_unit_interval_and_monotone() {
        // Each probe gets an identically warmed baseline so the comparison is
        // purely between probe values.
        let mut last = 0.0;
        for value in [72.0, 80.0, 95.0, 120.0, 160.0, 240.0] {
            let (service, _) = service(ScoringConfig::default());
            warm_baseline(&service, "P1", 72.0, 20).await;

            let outcome = service
                .score_vitals(request("P1", vitals(Some(value), None, None)))
                .await
                .unwrap();
            let score = outcome.anomaly_scores.heart_rate.unwrap().score;
            assert!((0.0..=1.0).contains(&score));
            assert!(score >= last - 1e-9, "score regressed at value {value}");
            last = score;
        }
    }

    #[tokio::test]
    async fn overall_risk_renormalizes_missing_metrics() {
        let (service, _) = service(ScoringConfig::default());

        // Only heart rate present: overall equals the single metric score.
        let outcome = service
            .score_vitals(request("P1", vitals(Some(72.0), None, None)))
            .await
            .unwrap();
        assert!((outcome.overall_risk_score.score - 0.2).abs() < 1e-9);

        // All three in soft range: weighted average of equal scores is the score.
        let outcome = service
            .score_vitals(request("P2", vitals(Some(72.0), Some(98.0), Some(37.0))))
            .await
            .unwrap();
        assert!((outcome.overall_risk_score.score - 0.2).abs() < 1e-9);
        assert_eq!(outcome.overall_risk_score.aggregation_method, "z_score_based");
    }

    #[tokio::test]
    async fn fahrenheit_samples_share_the_celsius_baseline() {
        let (service, store) = service(ScoringConfig::default());

        let mut v = Vitals::default();
        v.insert(
            VitalMetric::Temperature,
            VitalSample {
                value: 98.6,
                unit: VitalUnit::Fahrenheit,
                timestamp: Utc::now(),
            },
        );
        service.score_vitals(request("P1", v)).await.unwrap();

        let snapshot = store.fetch("P1", VitalMetric::Temperature).await.unwrap();
        assert!((snapshot.mean - 37.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_or_anonymous_requests_are_invalid() {
        let (service, _) = service(ScoringConfig::default());

        let result = service
            .score_vitals(request("", vitals(Some(72.0), None, None)))
            .await;
        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));

        let result = service.score_vitals(request("P1", Vitals::default())).await;
        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn duplicate_submissions_are_no_ops_when_dedupe_enabled() {
        let config = ScoringConfig {
            dedupe_by_source_event: true,
            ..ScoringConfig::default()
        };
        let (service, store) = service(config);

        let req = request("P1", vitals(Some(72.0), None, None));
        service.score_vitals(req.clone()).await.unwrap();
        service.score_vitals(req.clone()).await.unwrap();
        service.score_vitals(req).await.unwrap();

        let snapshot = store.fetch("P1", VitalMetric::HeartRate).await.unwrap();
        assert_eq!(snapshot.count, 1);
    }

    #[tokio::test]
    async fn duplicate_submissions_accumulate_when_dedupe_disabled() {
        let (service, store) = service(ScoringConfig::default());

        let req = request("P1", vitals(Some(72.0), None, None));
        service.score_vitals(req.clone()).await.unwrap();
        service.score_vitals(req).await.unwrap();

        let snapshot = store.fetch("P1", VitalMetric::HeartRate).await.unwrap();
        assert_eq!(snapshot.count, 2);
    }
}
