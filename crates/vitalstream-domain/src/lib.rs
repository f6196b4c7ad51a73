pub mod enricher_service;
pub mod envelope;
pub mod error;
pub mod events;
pub mod ingestion_service;
pub mod measurement;
pub mod normalizer_service;
pub mod registry;
pub mod repository;
pub mod rules;
pub mod rules_service;
pub mod severity;
pub mod timestamp;

pub use enricher_service::EnricherService;
pub use envelope::*;
pub use error::{DomainError, DomainResult};
pub use events::*;
pub use ingestion_service::{IngestionService, MeasurementsInput};
pub use measurement::*;
pub use normalizer_service::{ClampBounds, NormalizerService, NORMALIZATION_RULES_VERSION};
pub use registry::*;
pub use repository::{
    AlertProducer, EnrichedTelemetryProducer, NormalizedTelemetryProducer, RawTelemetryProducer,
    RegistryReader, ScoreVitalsOutcome, ScoreVitalsRequest, ScoredTelemetryProducer, VitalsScorer,
};
pub use rules::{evaluate_rules, RuleConstants, RuleResult};
pub use rules_service::{RulesService, RULE_VERSION};
pub use severity::{AnomalySeverity, Severity};
pub use timestamp::parse_device_timestamp;
