use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Linear pixel-to-geographic mapping of a north-up raster.
///
/// `lon = origin_lon + x * px_size_lon`, `lat = origin_lat + y * px_size_lat`.
/// `px_size_lat` is negative for the usual row-south orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_lon: f64,
    pub origin_lat: f64,
    pub px_size_lon: f64,
    pub px_size_lat: f64,
}

impl GeoTransform {
    #[inline]
    pub fn pixel_to_geo(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.origin_lon + x * self.px_size_lon,
            self.origin_lat + y * self.px_size_lat,
        )
    }

    /// Transform for the same raster after uniform downsampling.
    ///
    /// `ratio` maps downsampled pixels back to original ones (>= 1).
    pub fn scaled(&self, ratio: f64) -> Self {
        Self {
            px_size_lon: self.px_size_lon * ratio,
            px_size_lat: self.px_size_lat * ratio,
            ..*self
        }
    }
}

/// Great-circle (haversine) distance between two WGS84 points, in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlam = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlam / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
