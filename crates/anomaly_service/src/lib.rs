pub mod baseline;
pub mod cache_first_store;
pub mod in_process_store;
pub mod scoring_service;

pub use baseline::{Baseline, BaselineSnapshot, BaselineStore};
pub use cache_first_store::CacheFirstBaselineStore;
pub use in_process_store::InProcessBaselineStore;
pub use scoring_service::{ScoringConfig, ScoringService, SCORING_ENGINE, SCORING_ENGINE_VERSION};

#[cfg(any(test, feature = "testing"))]
pub use baseline::MockBaselineStore;
