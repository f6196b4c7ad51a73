pub mod enricher_worker;
pub mod processor;

pub use enricher_worker::{EnricherWorker, EnricherWorkerConfig};
pub use processor::create_enricher_processor;
