//! Request and Response models for the photo cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{ImageQuery, ViewportRequest, MAX_ITEM_SIZE};
pub use responses::{
    CancelResponse, ErrorResponse, FlushResponse, HealthResponse, StatsResponse, ViewportResponse,
};
