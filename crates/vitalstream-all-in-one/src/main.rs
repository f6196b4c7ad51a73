mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use anomaly_service::{
    BaselineStore, CacheFirstBaselineStore, InProcessBaselineStore, ScoringConfig, ScoringService,
};
use config::ServiceConfig;
use enricher_worker::{EnricherWorker, EnricherWorkerConfig};
use ingest_gateway::IngestGateway;
use normalizer_worker::{NormalizerWorker, NormalizerWorkerConfig};
use registry_service::{InMemoryRegistryStore, RegistrySeed, RegistryService};
use rules_worker::{RulesWorker, RulesWorkerConfig};
use vitalstream_domain::ingestion_service::IngestionService;
use vitalstream_domain::normalizer_service::ClampBounds;
use vitalstream_domain::registry::VitalRange;
use vitalstream_domain::rules::RuleConstants;
use vitalstream_grpc::{
    run_grpc_server, GrpcRegistryConfig, GrpcRegistryReader, GrpcScorerConfig, GrpcServerConfig,
    GrpcVitalsScorer,
};
use vitalstream_nats::{NatsClient, RawTelemetryJsonProducer, RetryPolicy};
use vitalstream_redis::RedisBaselineStore;
use vitalstream_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().json().with_span_list(true).with_current_span(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting vitalstream-all-in-one service");

    if let Err(e) = run(config).await {
        error!("Failed to start platform: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let retry_policy = RetryPolicy {
        initial_delay: Duration::from_millis(config.producer_retry_initial_ms),
        multiplier: config.producer_retry_multiplier,
        max_delay: Duration::from_millis(config.producer_retry_max_delay_ms),
        max_attempts: config.producer_retry_max_attempts,
    };

    // Broker connection and topic streams.
    let nats_client = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.nats_connect_timeout_secs),
        )
        .await?,
    );
    for stream in [
        &config.raw_stream,
        &config.normalized_stream,
        &config.enriched_stream,
        &config.scored_stream,
        &config.alerts_stream,
    ] {
        nats_client.ensure_stream(stream).await?;
    }

    // Registry: seeded in-memory store behind the gRPC read surface.
    let seed = if config.registry_seed_path.is_empty() {
        info!("Using built-in registry seed");
        RegistrySeed::builtin()
    } else {
        RegistrySeed::from_file(Path::new(&config.registry_seed_path))?
    };
    let registry_service = Arc::new(RegistryService::new(Arc::new(
        InMemoryRegistryStore::from_seed(seed),
    )));

    // Anomaly scorer: cache-first baselines with in-process fallback.
    let fallback_store = Arc::new(InProcessBaselineStore::new(config.baseline_window));
    let baseline_store: Arc<dyn BaselineStore> = if config.cache_enabled {
        match RedisBaselineStore::connect(
            &config.redis_url,
            config.baseline_window,
            Duration::from_secs(config.baseline_ttl_secs),
        )
        .await
        {
            Ok(primary) => Arc::new(CacheFirstBaselineStore::new(
                Arc::new(primary),
                fallback_store,
            )),
            Err(e) => {
                warn!(
                    error = %e,
                    "Baseline cache unreachable at startup, running on in-process store"
                );
                fallback_store
            }
        }
    } else {
        fallback_store
    };
    let scoring_service = Arc::new(ScoringService::new(
        baseline_store,
        ScoringConfig {
            window: config.baseline_window,
            min_samples: config.min_baseline_samples,
            stddev_floor: 0.1,
            dedupe_by_source_event: config.scorer_dedupe_by_source_event,
        },
    ));

    // Gateway: HTTP + RPC ingress over the same ingestion service. Device
    // verification goes through the registry's RPC surface like any other
    // pipeline consumer would.
    let gateway_registry = Arc::new(GrpcRegistryReader::connect(GrpcRegistryConfig {
        endpoint: config.registry_endpoint.clone(),
        timeout: Duration::from_millis(config.registry_timeout_ms),
        retry_attempts: config.registry_retry_attempts,
        retry_delay: Duration::from_millis(config.registry_retry_delay_ms),
    })?);
    let raw_producer = Arc::new(RawTelemetryJsonProducer::new(
        nats_client.create_publisher_client(),
        config.raw_stream.clone(),
        retry_policy,
    ));
    let ingestion_service = Arc::new(IngestionService::new(
        gateway_registry,
        raw_producer,
        config.verify_devices,
    ));

    // Pipeline workers.
    let normalizer = NormalizerWorker::new(
        nats_client.clone(),
        NormalizerWorkerConfig {
            input_stream: config.raw_stream.clone(),
            output_stream: config.normalized_stream.clone(),
            consumer_group: config.normalizer_group.clone(),
            batch_size: config.nats_batch_size,
            batch_wait_secs: config.nats_batch_wait_secs,
            max_deliveries: config.max_deliveries,
            clamp_bounds: ClampBounds {
                heart_rate: VitalRange::new(config.hr_clamp_min, config.hr_clamp_max),
                oxygen_saturation: VitalRange::new(config.spo2_clamp_min, config.spo2_clamp_max),
                temperature_celsius: VitalRange::new(
                    config.temp_clamp_min_celsius,
                    config.temp_clamp_max_celsius,
                ),
            },
            retry: retry_policy,
        },
    )
    .await?;

    let enricher_registry = Arc::new(GrpcRegistryReader::connect(GrpcRegistryConfig {
        endpoint: config.registry_endpoint.clone(),
        timeout: Duration::from_millis(config.registry_timeout_ms),
        retry_attempts: config.registry_retry_attempts,
        retry_delay: Duration::from_millis(config.registry_retry_delay_ms),
    })?);
    let enricher = EnricherWorker::new(
        nats_client.clone(),
        enricher_registry,
        EnricherWorkerConfig {
            input_stream: config.normalized_stream.clone(),
            output_stream: config.enriched_stream.clone(),
            consumer_group: config.enricher_group.clone(),
            batch_size: config.nats_batch_size,
            batch_wait_secs: config.nats_batch_wait_secs,
            max_deliveries: config.max_deliveries,
            retry: retry_policy,
        },
    )
    .await?;

    let rules_scorer = Arc::new(GrpcVitalsScorer::connect(GrpcScorerConfig {
        endpoint: config.anomaly_endpoint.clone(),
        timeout: Duration::from_millis(config.anomaly_timeout_ms),
    })?);
    let rules = RulesWorker::new(
        nats_client.clone(),
        rules_scorer,
        RulesWorkerConfig {
            input_stream: config.enriched_stream.clone(),
            scored_stream: config.scored_stream.clone(),
            alerts_stream: config.alerts_stream.clone(),
            consumer_group: config.rules_group.clone(),
            batch_size: config.nats_batch_size,
            batch_wait_secs: config.nats_batch_wait_secs,
            max_deliveries: config.max_deliveries,
            rule_constants: RuleConstants {
                hr_very_high: config.hr_very_high,
                spo2_low: config.spo2_low,
            },
            retry: retry_policy,
        },
    )
    .await?;

    let gateway = IngestGateway::new(ingestion_service.clone(), config.http_bind.clone());

    let grpc_config = GrpcServerConfig {
        host: config.grpc_host.clone(),
        port: config.grpc_port,
    };

    let runner = Runner::new()
        .with_app_process({
            let registry_service = registry_service.clone();
            let scoring_service = scoring_service.clone();
            let ingestion_service = ingestion_service.clone();
            move |ctx| async move {
                run_grpc_server(
                    grpc_config,
                    registry_service,
                    scoring_service,
                    ingestion_service,
                    ctx,
                )
                .await
            }
        })
        .with_app_process(move |ctx| async move { gateway.run(ctx).await })
        .with_app_process(move |ctx| async move { normalizer.run(ctx).await })
        .with_app_process(move |ctx| async move { enricher.run(ctx).await })
        .with_app_process(move |ctx| async move { rules.run(ctx).await })
        .with_closer({
            let nats_client = nats_client.clone();
            move || async move {
                info!("Releasing broker connection");
                drop(nats_client);
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs));

    runner.run().await;
    Ok(())
}
