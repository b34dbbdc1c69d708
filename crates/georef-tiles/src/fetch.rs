use std::thread::sleep;
use std::time::Duration;

use georef_core::{BoundingBox, GeoRaster, GeoTransform, RgbImage};
use log::{debug, info, warn};

use crate::{FetchParams, TileGrid};

/// A single tile-fetch attempt failure.
#[derive(thiserror::Error, Debug)]
pub enum TileFetchError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("tile decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Errors surfaced by the reference fetcher as a whole.
#[derive(thiserror::Error, Debug)]
pub enum TileError {
    #[error("bounding box requires {count} tiles (max {max}); draw a smaller area")]
    TooManyTiles { count: usize, max: usize },
    #[error("bounding box resolves to an empty tile range")]
    EmptyTileRange,
    #[error(
        "{failures} of {total} tiles failed to download; the tile server may be \
         temporarily unavailable"
    )]
    FetchBudgetExceeded { failures: usize, total: usize },
}

/// One attempt at retrieving a single tile.
///
/// `Ok(None)` means the provider has no imagery for the tile (a legitimate
/// absence, not a failure).
pub trait TileService {
    fn fetch_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Option<RgbImage>, TileFetchError>;
}

/// HTTP tile source over a `{z}/{x}/{y}` URL template.
pub struct HttpTileService {
    client: reqwest::blocking::Client,
    url_template: String,
}

impl HttpTileService {
    pub fn new(params: &FetchParams) -> Result<Self, TileFetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(params.timeout_secs))
            .user_agent(params.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            url_template: params.url_template.clone(),
        })
    }

    fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

impl TileService for HttpTileService {
    fn fetch_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Option<RgbImage>, TileFetchError> {
        let url = self.tile_url(zoom, x, y);
        let resp = self.client.get(&url).send()?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TileFetchError::Status(status.as_u16()));
        }
        let bytes = resp.bytes()?;
        let decoded = image::load_from_memory(&bytes)?.to_rgb8();
        let (w, h) = decoded.dimensions();
        Ok(Some(RgbImage {
            width: w as usize,
            height: h as usize,
            data: decoded.into_raw(),
        }))
    }
}

/// Mosaic plus download statistics returned by the fetcher.
#[derive(Clone, Debug)]
pub struct ReferenceImagery {
    pub raster: GeoRaster,
    pub tile_count: usize,
    pub failures: usize,
}

/// Downloads and mosaics reference tiles for a bounding box.
pub struct ReferenceFetcher<S: TileService> {
    service: S,
    params: FetchParams,
}

impl<S: TileService> ReferenceFetcher<S> {
    pub fn new(service: S, params: FetchParams) -> Self {
        Self { service, params }
    }

    /// Fetch the mosaic covering `bounds` at the configured zoom.
    ///
    /// The tile budget is checked before any network call is made.
    pub fn fetch(&self, bounds: &BoundingBox) -> Result<ReferenceImagery, TileError> {
        let grid = TileGrid::covering(bounds, self.params.zoom);
        self.fetch_grid(grid)
    }

    /// Fetch an explicit tile grid. Exposed for tests with synthetic grids.
    pub fn fetch_grid(&self, grid: TileGrid) -> Result<ReferenceImagery, TileError> {
        let total = grid.count();
        if total < 1 {
            return Err(TileError::EmptyTileRange);
        }
        if total > self.params.max_tiles {
            return Err(TileError::TooManyTiles {
                count: total,
                max: self.params.max_tiles,
            });
        }

        info!(
            "fetching {total} tiles at z{} ({}x{})",
            grid.zoom,
            grid.tiles_x(),
            grid.tiles_y()
        );

        let tile_size = self.params.tile_size;
        let width = grid.tiles_x() * tile_size;
        let height = grid.tiles_y() * tile_size;
        let mut mosaic = RgbImage::zeroed(width, height);
        let mut failures = 0usize;

        for ty in grid.y_min..=grid.y_max {
            for tx in grid.x_min..=grid.x_max {
                match self.fetch_with_retry(grid.zoom, tx, ty) {
                    TileOutcome::Got(tile) => {
                        let ox = (tx - grid.x_min) as usize * tile_size;
                        let oy = (ty - grid.y_min) as usize * tile_size;
                        blit(&mut mosaic, &tile, ox, oy);
                    }
                    TileOutcome::Absent => {}
                    TileOutcome::Failed => failures += 1,
                }
                if self.params.request_delay_ms > 0 {
                    sleep(Duration::from_millis(self.params.request_delay_ms));
                }
            }
        }

        if self.params.retry.budget_exceeded(failures, total) {
            return Err(TileError::FetchBudgetExceeded { failures, total });
        }
        if failures > 0 {
            warn!("{failures} of {total} tiles failed; gaps remain zero-filled");
        }

        let achieved = grid.achieved_bounds();
        let transform = GeoTransform {
            origin_lon: achieved.west,
            origin_lat: achieved.north,
            px_size_lon: achieved.lon_span() / width as f64,
            // Negative: rows run south.
            px_size_lat: -achieved.lat_span() / height as f64,
        };

        Ok(ReferenceImagery {
            raster: GeoRaster {
                pixels: mosaic,
                transform,
                bounds: achieved,
            },
            tile_count: total,
            failures,
        })
    }

    /// Retry loop for one tile.
    fn fetch_with_retry(&self, zoom: u8, x: u32, y: u32) -> TileOutcome {
        let mut attempt = 1u32;
        loop {
            match self.service.fetch_tile(zoom, x, y) {
                Ok(Some(tile)) => return TileOutcome::Got(tile),
                Ok(None) => {
                    debug!("tile z{zoom}/{x}/{y} has no imagery");
                    return TileOutcome::Absent;
                }
                Err(err) => match self.params.retry.backoff_after(attempt) {
                    Some(delay) => {
                        debug!("tile z{zoom}/{x}/{y} attempt {attempt} failed: {err}");
                        if !delay.is_zero() {
                            sleep(delay);
                        }
                        attempt += 1;
                    }
                    None => {
                        warn!("tile z{zoom}/{x}/{y} failed after {attempt} attempts: {err}");
                        return TileOutcome::Failed;
                    }
                },
            }
        }
    }
}

enum TileOutcome {
    Got(RgbImage),
    Absent,
    Failed,
}

fn blit(dst: &mut RgbImage, tile: &RgbImage, ox: usize, oy: usize) {
    let w = tile.width.min(dst.width.saturating_sub(ox));
    let h = tile.height.min(dst.height.saturating_sub(oy));
    for row in 0..h {
        let src_start = row * tile.width * 3;
        let dst_start = ((oy + row) * dst.width + ox) * 3;
        dst.data[dst_start..dst_start + w * 3]
            .copy_from_slice(&tile.data[src_start..src_start + w * 3]);
    }
}
