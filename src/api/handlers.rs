//! API Handlers
//!
//! HTTP request handlers for each photo cache endpoint.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::facade::PhotoCache;
use crate::fetch::{ImageDecoder, OneshotSink, Registration, Sink, Transport};
use crate::models::{
    CancelResponse, FlushResponse, HealthResponse, ImageQuery, StatsResponse, ViewportRequest,
    ViewportResponse,
};

/// Header telling clients whether the image came from memory or a fetch.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared two-level cache
    pub cache: Arc<PhotoCache<ImageDecoder>>,
    /// How long GET /image waits for delivery
    pub delivery_timeout: Duration,
}

impl AppState {
    /// Creates a new AppState around an opened cache.
    pub fn new(cache: PhotoCache<ImageDecoder>, delivery_timeout: Duration) -> Self {
        Self {
            cache: Arc::new(cache),
            delivery_timeout,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the cache with parameters from the Config, fetching through
    /// `transport`.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let cache = PhotoCache::open(config, transport, ImageDecoder)?;
        Ok(Self::new(cache, Duration::from_secs(config.delivery_timeout)))
    }
}

/// Handler for GET /image?url=
///
/// Serves the cached image for `url` as PNG, fetching it on a miss.
pub async fn image_handler(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response> {
    if let Some(error_msg) = query.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let (sink, rx) = OneshotSink::<DynamicImage>::new();
    let sink_id = sink.id();
    let registration = state.cache.request_asset(query.url.trim(), Arc::new(sink));
    debug!(url = %query.url, ?registration, "Image requested");

    let asset = match tokio::time::timeout(state.delivery_timeout, rx).await {
        Ok(Ok(asset)) => asset,
        Ok(Err(_)) => {
            return Err(CacheError::FetchFailed(format!(
                "no image could be produced for {}",
                query.url
            )))
        }
        Err(_) => {
            state.cache.forget_sink(sink_id);
            return Err(CacheError::Timeout(format!(
                "no image delivered for {} within {:?}",
                query.url, state.delivery_timeout
            )));
        }
    };

    let png = tokio::task::spawn_blocking(move || encode_png(&asset))
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))??;

    let cache_status = match registration {
        Registration::Delivered => "memory",
        Registration::Spawned | Registration::Attached => "fetch",
    };

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (
                header::HeaderName::from_static(CACHE_STATUS_HEADER),
                HeaderValue::from_static(cache_status),
            ),
        ],
        png,
    )
        .into_response())
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| CacheError::Internal(format!("PNG encoding failed: {}", e)))?;
    Ok(buf.into_inner())
}

/// Handler for POST /flush
///
/// Syncs the disk journal.
pub async fn flush_handler(State(state): State<AppState>) -> Result<Json<FlushResponse>> {
    let cache = Arc::clone(&state.cache);
    tokio::task::spawn_blocking(move || cache.flush())
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))??;

    Ok(Json(FlushResponse::new(state.cache.is_disk_backed())))
}

/// Handler for POST /cancel
///
/// Cancels every in-flight fetch.
pub async fn cancel_handler(State(state): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse::new(state.cache.cancel_all()))
}

/// Handler for PUT /viewport
///
/// Changes the decode target size for subsequent fetches.
pub async fn viewport_handler(
    State(state): State<AppState>,
    Json(req): Json<ViewportRequest>,
) -> Result<Json<ViewportResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.resize_viewport(req.item_size);
    Ok(Json(ViewportResponse::new(req.item_size)))
}

/// Handler for GET /stats
///
/// Returns statistics of both cache tiers and the fetch coordinator.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.is_disk_backed()))
}
