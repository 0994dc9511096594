//! API Module
//!
//! HTTP handlers and routing for the photo cache service.
//!
//! # Endpoints
//! - `GET /image?url=` - Cached image as PNG
//! - `POST /flush` - Sync the disk journal
//! - `POST /cancel` - Cancel in-flight fetches
//! - `PUT /viewport` - Change the decode target size
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
