pub mod normalizer_worker;
pub mod processor;

pub use normalizer_worker::{NormalizerWorker, NormalizerWorkerConfig};
pub use processor::create_normalizer_processor;
