use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;
use tracing::info;

use anomaly_service::baseline::{Baseline, BaselineSnapshot, BaselineStore};
use vitalstream_domain::error::{DomainError, DomainResult};
use vitalstream_domain::measurement::VitalMetric;

/// Reads the baseline as it stood before this call, then appends the new
/// sample, trims to the window and refreshes the TTL. Running as a single
/// server-side script makes the read-modify-write atomic, which is what
/// serializes concurrent updates to one `(patient, metric)` key across
/// scorer replicas.
const FETCH_AND_UPDATE_SCRIPT: &str = r#"
local key = KEYS[1]
local value = ARGV[1]
local window = tonumber(ARGV[2])
local ttl = tonumber(ARGV[3])
local prior = redis.call('LRANGE', key, 0, window - 1)
redis.call('LPUSH', key, value)
redis.call('LTRIM', key, 0, window - 1)
redis.call('EXPIRE', key, ttl)
return prior
"#;

/// Shared baseline store backed by Redis lists, one list per
/// `(patient, metric)`, newest sample first.
pub struct RedisBaselineStore {
    connection: ConnectionManager,
    window: usize,
    ttl: Duration,
    fetch_and_update: Script,
}

impl RedisBaselineStore {
    pub async fn connect(url: &str, window: usize, ttl: Duration) -> anyhow::Result<Self> {
        info!(url = %url, window, ttl_secs = ttl.as_secs(), "Connecting to baseline cache");

        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        info!("Connected to baseline cache");
        Ok(Self {
            connection,
            window,
            ttl,
            fetch_and_update: Script::new(FETCH_AND_UPDATE_SCRIPT),
        })
    }

    fn key(patient_id: &str, metric: VitalMetric) -> String {
        format!("baseline:{patient_id}:{}", metric.as_str())
    }

    fn snapshot_from(&self, raw_values: Vec<String>) -> BaselineSnapshot {
        // Lists are newest-first; order does not affect the statistics.
        let values = raw_values.iter().filter_map(|v| v.parse::<f64>().ok());
        Baseline::from_values(self.window, values).snapshot()
    }
}

#[async_trait]
impl BaselineStore for RedisBaselineStore {
    async fn fetch(
        &self,
        patient_id: &str,
        metric: VitalMetric,
    ) -> DomainResult<BaselineSnapshot> {
        let mut connection = self.connection.clone();
        let raw_values: Vec<String> = redis::cmd("LRANGE")
            .arg(Self::key(patient_id, metric))
            .arg(0)
            .arg(self.window as isize - 1)
            .query_async(&mut connection)
            .await
            .map_err(|e| DomainError::BaselineStore(e.to_string()))?;

        Ok(self.snapshot_from(raw_values))
    }

    async fn fetch_and_update(
        &self,
        patient_id: &str,
        metric: VitalMetric,
        value: f64,
    ) -> DomainResult<BaselineSnapshot> {
        let mut connection = self.connection.clone();
        let raw_values: Vec<String> = self
            .fetch_and_update
            .key(Self::key(patient_id, metric))
            .arg(value)
            .arg(self.window)
            .arg(self.ttl.as_secs())
            .invoke_async(&mut connection)
            .await
            .map_err(|e| DomainError::BaselineStore(e.to_string()))?;

        Ok(self.snapshot_from(raw_values))
    }
}
