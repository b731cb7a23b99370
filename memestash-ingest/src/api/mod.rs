//! HTTP API handlers for memestash-ingest
//!
//! Status and trigger surface for the pipeline, plus the health check.

pub mod health;
pub mod pipeline;

pub use health::health_routes;
pub use pipeline::pipeline_routes;
