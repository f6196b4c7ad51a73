pub mod gateway;
pub mod http;

pub use gateway::IngestGateway;
pub use http::router;
