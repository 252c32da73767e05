//! Response models for the status API
//!
//! This module defines the DTOs serialized into HTTP response bodies.

pub mod responses;

pub use responses::{HealthResponse, StatsResponse};
