//! HTTP middleware

mod metrics;

pub use metrics::track_requests;
