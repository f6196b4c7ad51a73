pub mod processor;
pub mod rules_worker;

pub use processor::create_rules_processor;
pub use rules_worker::{RulesWorker, RulesWorkerConfig};
