use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Connection timeout for the initial NATS handshake in seconds
    #[serde(default = "default_nats_connect_timeout_secs")]
    pub nats_connect_timeout_secs: u64,

    /// Stream names, one per pipeline topic
    #[serde(default = "default_raw_stream")]
    pub raw_stream: String,

    #[serde(default = "default_normalized_stream")]
    pub normalized_stream: String,

    #[serde(default = "default_enriched_stream")]
    pub enriched_stream: String,

    #[serde(default = "default_scored_stream")]
    pub scored_stream: String,

    #[serde(default = "default_alerts_stream")]
    pub alerts_stream: String,

    /// Consumer group names, one per stage
    #[serde(default = "default_normalizer_group")]
    pub normalizer_group: String,

    #[serde(default = "default_enricher_group")]
    pub enricher_group: String,

    #[serde(default = "default_rules_group")]
    pub rules_group: String,

    /// Batch size for consumers
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Deliveries after which a repeatedly failing message is dropped
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    // Producer retry policy
    #[serde(default = "default_producer_retry_initial_ms")]
    pub producer_retry_initial_ms: u64,

    #[serde(default = "default_producer_retry_multiplier")]
    pub producer_retry_multiplier: f64,

    #[serde(default = "default_producer_retry_max_delay_ms")]
    pub producer_retry_max_delay_ms: u64,

    #[serde(default = "default_producer_retry_max_attempts")]
    pub producer_retry_max_attempts: u32,

    // gRPC server
    #[serde(default = "default_grpc_host")]
    pub grpc_host: String,

    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    // RPC peers
    /// Registry endpoint used by the gateway and the enricher
    #[serde(default = "default_registry_endpoint")]
    pub registry_endpoint: String,

    #[serde(default = "default_rpc_timeout_ms")]
    pub registry_timeout_ms: u64,

    #[serde(default = "default_registry_retry_attempts")]
    pub registry_retry_attempts: u32,

    #[serde(default = "default_registry_retry_delay_ms")]
    pub registry_retry_delay_ms: u64,

    /// Anomaly scorer endpoint used by the rules engine
    #[serde(default = "default_anomaly_endpoint")]
    pub anomaly_endpoint: String,

    #[serde(default = "default_rpc_timeout_ms")]
    pub anomaly_timeout_ms: u64,

    // Gateway HTTP ingress
    #[serde(default = "default_http_bind")]
    pub http_bind: String,

    /// When enabled the gateway verifies devices against the registry
    #[serde(default = "default_verify_devices")]
    pub verify_devices: bool,

    // Normalization clamp bounds
    #[serde(default = "default_hr_clamp_min")]
    pub hr_clamp_min: f64,

    #[serde(default = "default_hr_clamp_max")]
    pub hr_clamp_max: f64,

    #[serde(default = "default_spo2_clamp_min")]
    pub spo2_clamp_min: f64,

    #[serde(default = "default_spo2_clamp_max")]
    pub spo2_clamp_max: f64,

    #[serde(default = "default_temp_clamp_min_celsius")]
    pub temp_clamp_min_celsius: f64,

    #[serde(default = "default_temp_clamp_max_celsius")]
    pub temp_clamp_max_celsius: f64,

    // Combined-rule constants
    #[serde(default = "default_hr_very_high")]
    pub hr_very_high: f64,

    #[serde(default = "default_spo2_low")]
    pub spo2_low: f64,

    // Anomaly scorer
    #[serde(default = "default_baseline_window")]
    pub baseline_window: usize,

    #[serde(default = "default_min_baseline_samples")]
    pub min_baseline_samples: usize,

    #[serde(default = "default_baseline_ttl_secs")]
    pub baseline_ttl_secs: u64,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// When disabled the scorer runs on the in-process store only
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// When enabled, replayed source events do not update baselines
    #[serde(default = "default_scorer_dedupe")]
    pub scorer_dedupe_by_source_event: bool,

    // Registry seed
    /// Path to a JSON seed file; empty uses the built-in demo cohort
    #[serde(default = "default_registry_seed_path")]
    pub registry_seed_path: String,

    /// Graceful shutdown deadline in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_connect_timeout_secs() -> u64 {
    10
}

fn default_raw_stream() -> String {
    "telemetry_raw".to_string()
}

fn default_normalized_stream() -> String {
    "telemetry_normalized".to_string()
}

fn default_enriched_stream() -> String {
    "telemetry_enriched".to_string()
}

fn default_scored_stream() -> String {
    "telemetry_scored".to_string()
}

fn default_alerts_stream() -> String {
    "alerts".to_string()
}

fn default_normalizer_group() -> String {
    "telemetry-normalizer".to_string()
}

fn default_enricher_group() -> String {
    "telemetry-enricher".to_string()
}

fn default_rules_group() -> String {
    "rules-engine".to_string()
}

fn default_nats_batch_size() -> usize {
    10
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_max_deliveries() -> u32 {
    8
}

fn default_producer_retry_initial_ms() -> u64 {
    100
}

fn default_producer_retry_multiplier() -> f64 {
    2.0
}

fn default_producer_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_producer_retry_max_attempts() -> u32 {
    8
}

fn default_grpc_host() -> String {
    "0.0.0.0".to_string()
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_registry_endpoint() -> String {
    "http://localhost:50051".to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    5_000
}

fn default_registry_retry_attempts() -> u32 {
    3
}

fn default_registry_retry_delay_ms() -> u64 {
    1_000
}

fn default_anomaly_endpoint() -> String {
    "http://localhost:50051".to_string()
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_verify_devices() -> bool {
    false
}

fn default_hr_clamp_min() -> f64 {
    20.0
}

fn default_hr_clamp_max() -> f64 {
    240.0
}

fn default_spo2_clamp_min() -> f64 {
    50.0
}

fn default_spo2_clamp_max() -> f64 {
    100.0
}

fn default_temp_clamp_min_celsius() -> f64 {
    30.0
}

fn default_temp_clamp_max_celsius() -> f64 {
    45.0
}

fn default_hr_very_high() -> f64 {
    120.0
}

fn default_spo2_low() -> f64 {
    90.0
}

fn default_baseline_window() -> usize {
    100
}

fn default_min_baseline_samples() -> usize {
    10
}

fn default_baseline_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_cache_enabled() -> bool {
    true
}

fn default_scorer_dedupe() -> bool {
    false
}

fn default_registry_seed_path() -> String {
    String::new()
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("VITALSTREAM"))
            .build()?
            .try_deserialize()
    }
}
