//! Thin HTTP surface over the tracker, the scrape contract and the runtime stats.

pub mod health;
pub mod latency;
pub mod routes;

pub use routes::{router, ApiState};
