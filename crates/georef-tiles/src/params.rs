use serde::{Deserialize, Serialize};

use crate::RetryPolicy;

/// Default tile endpoint: Esri World Imagery, `{z}/{y}/{x}` path order.
pub const DEFAULT_TILE_URL: &str = "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

/// Configuration for reference imagery fetching.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchParams {
    /// Tile zoom level; 17 gives roughly 1.2 m per pixel.
    pub zoom: u8,
    /// Edge length of a provider tile in pixels.
    pub tile_size: usize,
    /// Hard cap on tiles per request, to bound provider load.
    pub max_tiles: usize,
    /// Fixed delay between tile requests.
    pub request_delay_ms: u64,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Tile URL template with `{z}`, `{x}`, `{y}` placeholders.
    pub url_template: String,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            zoom: 17,
            tile_size: 256,
            max_tiles: 400,
            request_delay_ms: 50,
            timeout_secs: 10,
            url_template: DEFAULT_TILE_URL.to_string(),
            user_agent: "georef-rs/0.1 (aerial-georeferencing)".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}
