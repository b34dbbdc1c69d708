use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

/// First-order pixel-to-geographic transform.
///
/// `lon = a0 + a1*px + a2*py`, `lat = b0 + b1*px + b2*py` with
/// `lon_coeffs = [a0, a1, a2]` and `lat_coeffs = [b0, b1, b2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub lon_coeffs: [f64; 3],
    pub lat_coeffs: [f64; 3],
}

impl AffineTransform {
    pub fn new(lon_coeffs: [f64; 3], lat_coeffs: [f64; 3]) -> Self {
        Self {
            lon_coeffs,
            lat_coeffs,
        }
    }

    #[inline]
    pub fn pixel_to_geo(&self, px: f64, py: f64) -> (f64, f64) {
        let [a0, a1, a2] = self.lon_coeffs;
        let [b0, b1, b2] = self.lat_coeffs;
        (a0 + a1 * px + a2 * py, b0 + b1 * px + b2 * py)
    }

    /// The 2x2 linear block `[[a1, a2], [b1, b2]]`.
    #[inline]
    pub fn linear_block(&self) -> Matrix2<f64> {
        Matrix2::new(
            self.lon_coeffs[1],
            self.lon_coeffs[2],
            self.lat_coeffs[1],
            self.lat_coeffs[2],
        )
    }

    /// Invert the linear block; `None` when it is singular.
    pub fn invert_linear(&self) -> Option<Matrix2<f64>> {
        self.linear_block().try_inverse()
    }

    /// Magnitude of the first column, the per-pixel step in degrees along
    /// the raster x axis.
    #[inline]
    pub fn pixel_size_deg(&self) -> f64 {
        let a1 = self.lon_coeffs[1];
        let b1 = self.lat_coeffs[1];
        (a1 * a1 + b1 * b1).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn north_up() -> AffineTransform {
        AffineTransform::new([-90.10, 1e-5, 0.0], [35.00, 0.0, -1e-5])
    }

    #[test]
    fn applies_forward_mapping() {
        let t = north_up();
        let (lon, lat) = t.pixel_to_geo(100.0, 50.0);
        assert_relative_eq!(lon, -90.099, max_relative = 1e-12);
        assert_relative_eq!(lat, 34.9995, max_relative = 1e-12);
    }

    #[test]
    fn inverse_round_trips() {
        let t = AffineTransform::new([-90.10, 1.1e-5, 2e-6], [35.00, -3e-6, -0.9e-5]);
        let inv = t.invert_linear().expect("invertible");
        let (lon, lat) = t.pixel_to_geo(321.0, 123.0);
        let d = nalgebra::Vector2::new(lon - t.lon_coeffs[0], lat - t.lat_coeffs[0]);
        let px = inv * d;
        assert_relative_eq!(px[0], 321.0, max_relative = 1e-9);
        assert_relative_eq!(px[1], 123.0, max_relative = 1e-9);
    }

    #[test]
    fn singular_linear_block_has_no_inverse() {
        let t = AffineTransform::new([0.0, 1.0, 2.0], [0.0, 2.0, 4.0]);
        assert!(t.invert_linear().is_none());
    }

    #[test]
    fn pixel_size_is_column_magnitude() {
        let t = AffineTransform::new([0.0, 3e-5, 0.0], [0.0, 4e-5, 0.0]);
        assert_relative_eq!(t.pixel_size_deg(), 5e-5, max_relative = 1e-12);
    }

    #[test]
    fn serde_round_trip() {
        let t = north_up();
        let json = serde_json::to_string(&t).expect("serialize");
        let back: AffineTransform = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, t);
    }
}
