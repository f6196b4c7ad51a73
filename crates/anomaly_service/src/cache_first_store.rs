use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use vitalstream_domain::error::DomainResult;
use vitalstream_domain::measurement::VitalMetric;

use crate::baseline::{BaselineSnapshot, BaselineStore};

/// Cache-first baseline storage: writes go to the shared cache, and when the
/// cache is unreachable the scorer degrades to the per-replica in-process
/// store instead of failing the request.
pub struct CacheFirstBaselineStore {
    primary: Arc<dyn BaselineStore>,
    fallback: Arc<dyn BaselineStore>,
}

impl CacheFirstBaselineStore {
    pub fn new(primary: Arc<dyn BaselineStore>, fallback: Arc<dyn BaselineStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl BaselineStore for CacheFirstBaselineStore {
    async fn fetch(
        &self,
        patient_id: &str,
        metric: VitalMetric,
    ) -> DomainResult<BaselineSnapshot> {
        match self.primary.fetch(patient_id, metric).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(
                    patient_id,
                    metric = metric.as_str(),
                    error = %e,
                    "Baseline cache unreachable, falling back to in-process store"
                );
                self.fallback.fetch(patient_id, metric).await
            }
        }
    }

    async fn fetch_and_update(
        &self,
        patient_id: &str,
        metric: VitalMetric,
        value: f64,
    ) -> DomainResult<BaselineSnapshot> {
        match self.primary.fetch_and_update(patient_id, metric, value).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(
                    patient_id,
                    metric = metric.as_str(),
                    error = %e,
                    "Baseline cache unreachable, falling back to in-process store"
                );
                self.fallback.fetch_and_update(patient_id, metric, value).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MockBaselineStore;
    use crate::in_process_store::InProcessBaselineStore;
    use vitalstream_domain::error::DomainError;

    #[tokio::test]
    async fn healthy_primary_is_used() {
        let mut primary = MockBaselineStore::new();
        primary
            .expect_fetch_and_update()
            .times(1)
            .returning(|_, _, _| {
                Ok(BaselineSnapshot {
                    count: 50,
                    mean: 72.0,
                    stddev: 3.0,
                })
            });

        let fallback = Arc::new(InProcessBaselineStore::new(100));
        let store = CacheFirstBaselineStore::new(Arc::new(primary), fallback.clone());

        let snapshot = store
            .fetch_and_update("P1", VitalMetric::HeartRate, 74.0)
            .await
            .unwrap();
        assert_eq!(snapshot.count, 50);
        assert_eq!(fallback.key_count(), 0);
    }

    #[tokio::test]
    async fn primary_failure_degrades_to_fallback() {
        let mut primary = MockBaselineStore::new();
        primary
            .expect_fetch_and_update()
            .times(2)
            .returning(|_, _, _| Err(DomainError::BaselineStore("connection refused".into())));

        let fallback = Arc::new(InProcessBaselineStore::new(100));
        let store = CacheFirstBaselineStore::new(Arc::new(primary), fallback.clone());

        let first = store
            .fetch_and_update("P1", VitalMetric::HeartRate, 70.0)
            .await
            .unwrap();
        assert_eq!(first.count, 0);

        let second = store
            .fetch_and_update("P1", VitalMetric::HeartRate, 72.0)
            .await
            .unwrap();
        assert_eq!(second.count, 1);
    }
}
