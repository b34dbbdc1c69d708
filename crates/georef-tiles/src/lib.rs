//! Reference imagery acquisition.
//!
//! Converts a WGS84 bounding box to a Web-Mercator tile range, downloads the
//! tiles with bounded retries and rate limiting, and mosaics them into a
//! single [`georef_core::GeoRaster`] whose achieved bounds generally exceed
//! the requested box.

mod fetch;
mod mercator;
mod params;
mod retry;

pub use fetch::{
    HttpTileService, ReferenceFetcher, ReferenceImagery, TileError, TileFetchError, TileService,
};
pub use mercator::{tile_for_lat_lon, tile_nw_corner, TileGrid};
pub use params::FetchParams;
pub use retry::RetryPolicy;
