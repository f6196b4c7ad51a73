pub mod baseline_store;

pub use baseline_store::RedisBaselineStore;
