//! Request DTOs for the photo cache API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

/// Largest decode target side accepted by `PUT /viewport`.
pub const MAX_ITEM_SIZE: u32 = 4096;

/// Query string of GET /image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageQuery {
    /// Source identifier of the image (an http or https URL)
    pub url: String,
}

impl ImageQuery {
    /// Validates the query
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Some("url cannot be empty".to_string());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Some("url must use http or https".to_string());
        }
        None
    }
}

/// Request body of PUT /viewport
#[derive(Debug, Clone, Deserialize)]
pub struct ViewportRequest {
    /// Side of the square items are rendered in; 0 disables downscaling
    pub item_size: u32,
}

impl ViewportRequest {
    pub fn validate(&self) -> Option<String> {
        if self.item_size > MAX_ITEM_SIZE {
            return Some(format!(
                "item_size exceeds maximum of {} pixels",
                MAX_ITEM_SIZE
            ));
        }
        None
    }
}
