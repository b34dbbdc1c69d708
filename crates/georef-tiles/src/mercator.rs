use std::f64::consts::PI;

use georef_core::BoundingBox;

/// Tile indices for a WGS84 point at the given zoom, clamped to the valid
/// range `[0, 2^z - 1]`.
pub fn tile_for_lat_lon(lat: f64, lon: f64, zoom: u8) -> (u32, u32) {
    let n = (1u64 << zoom) as f64;
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let lat_rad = lat.to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    let max = n - 1.0;
    (
        x.clamp(0.0, max) as u32,
        y.clamp(0.0, max) as u32,
    )
}

/// Longitude/latitude of the north-west corner of a tile.
pub fn tile_nw_corner(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = (1u64 << zoom) as f64;
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();
    (lon, lat)
}

/// Inclusive tile range covering a bounding box at a fixed zoom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub zoom: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileGrid {
    pub fn covering(bounds: &BoundingBox, zoom: u8) -> Self {
        // Tile y grows southward, so the north edge gives y_min.
        let (x_min, y_min) = tile_for_lat_lon(bounds.north, bounds.west, zoom);
        let (x_max, y_max) = tile_for_lat_lon(bounds.south, bounds.east, zoom);
        Self {
            zoom,
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    // Saturating so an inverted range counts as zero tiles instead of
    // underflowing.
    #[inline]
    pub fn tiles_x(&self) -> usize {
        (u64::from(self.x_max) + 1).saturating_sub(u64::from(self.x_min)) as usize
    }

    #[inline]
    pub fn tiles_y(&self) -> usize {
        (u64::from(self.y_max) + 1).saturating_sub(u64::from(self.y_min)) as usize
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.tiles_x() * self.tiles_y()
    }

    /// Geographic bounds actually covered by the tile grid.
    pub fn achieved_bounds(&self) -> BoundingBox {
        let (west, north) = tile_nw_corner(self.x_min, self.y_min, self.zoom);
        let (east, south) = tile_nw_corner(self.x_max + 1, self.y_max + 1, self.zoom);
        BoundingBox::new(north, south, east, west)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn known_tile_at_zoom_zero() {
        assert_eq!(tile_for_lat_lon(0.0, 0.0, 0), (0, 0));
    }

    #[test]
    fn indices_clamp_at_poles() {
        let (_, y) = tile_for_lat_lon(89.9, 0.0, 3);
        assert_eq!(y, 0);
        let (_, y) = tile_for_lat_lon(-89.9, 0.0, 3);
        assert_eq!(y, 7);
    }

    #[test]
    fn nw_corner_inverts_tile_lookup() {
        let zoom = 17;
        let (x, y) = tile_for_lat_lon(34.95, -90.05, zoom);
        let (lon, lat) = tile_nw_corner(x, y, zoom);
        // The NW corner is north-west of (or equal to) the query point.
        assert!(lon <= -90.05);
        assert!(lat >= 34.95);
        // And one tile further is past it.
        let (lon2, lat2) = tile_nw_corner(x + 1, y + 1, zoom);
        assert!(lon2 > -90.05);
        assert!(lat2 < 34.95);
        assert_relative_eq!(lon2 - lon, 360.0 / (1u64 << zoom) as f64, max_relative = 1e-12);
    }

    #[test]
    fn example_box_stays_well_under_tile_budget() {
        let b = BoundingBox::new(35.00, 34.90, -90.00, -90.10);
        let grid = TileGrid::covering(&b, 17);
        let count = grid.count();
        assert_eq!(count, grid.tiles_x() * grid.tiles_y());
        assert!(count >= 1);
        assert!(count < 400, "got {count} tiles");
    }

    #[test]
    fn inverted_ranges_count_zero_tiles() {
        let grid = TileGrid {
            zoom: 17,
            x_min: 10,
            x_max: 9,
            y_min: 5,
            y_max: 4,
        };
        assert_eq!(grid.tiles_x(), 0);
        assert_eq!(grid.tiles_y(), 0);
        assert_eq!(grid.count(), 0);
    }

    #[test]
    fn achieved_bounds_contain_request() {
        let b = BoundingBox::new(35.00, 34.90, -90.00, -90.10);
        let got = TileGrid::covering(&b, 17).achieved_bounds();
        assert!(got.north >= b.north);
        assert!(got.south <= b.south);
        assert!(got.west <= b.west);
        assert!(got.east >= b.east);
    }
}
