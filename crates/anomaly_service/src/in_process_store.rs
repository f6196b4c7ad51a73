use async_trait::async_trait;
use dashmap::DashMap;

use vitalstream_domain::error::DomainResult;
use vitalstream_domain::measurement::VitalMetric;

use crate::baseline::{Baseline, BaselineSnapshot, BaselineStore};

/// Per-replica fallback baseline store.
///
/// State lives in a sharded map keyed by `(patient, metric)`; the map entry
/// guard is held across the whole read-modify-write, which serializes
/// concurrent updates to the same key while leaving other keys independent.
/// Contents are lost on restart and rebuilt from subsequent samples.
pub struct InProcessBaselineStore {
    baselines: DashMap<(String, VitalMetric), Baseline>,
    window: usize,
}

impl InProcessBaselineStore {
    pub fn new(window: usize) -> Self {
        Self {
            baselines: DashMap::new(),
            window,
        }
    }

    pub fn key_count(&self) -> usize {
        self.baselines.len()
    }
}

#[async_trait]
impl BaselineStore for InProcessBaselineStore {
    async fn fetch(
        &self,
        patient_id: &str,
        metric: VitalMetric,
    ) -> DomainResult<BaselineSnapshot> {
        Ok(self
            .baselines
            .get(&(patient_id.to_string(), metric))
            .map(|entry| entry.snapshot())
            .unwrap_or_else(BaselineSnapshot::empty))
    }

    async fn fetch_and_update(
        &self,
        patient_id: &str,
        metric: VitalMetric,
        value: f64,
    ) -> DomainResult<BaselineSnapshot> {
        let mut entry = self
            .baselines
            .entry((patient_id.to_string(), metric))
            .or_insert_with(|| Baseline::new(self.window));

        let prior = entry.snapshot();
        entry.push(value);
        Ok(prior)
    }
}
