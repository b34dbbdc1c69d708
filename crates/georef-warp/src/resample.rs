use georef_core::{sample_bilinear_rgb, BoundingBox, RgbImage};
use log::{info, warn};

use crate::{params::ResampleParams, FittedTransform};

/// Resampled output raster on an axis-aligned geographic rectangle.
#[derive(Clone, Debug)]
pub struct WarpedRaster {
    pub pixels: RgbImage,
    pub bounds: BoundingBox,
    /// False when a degenerate transform forced the source through
    /// unchanged.
    pub warped: bool,
}

/// Warp the source onto the fitted geographic rectangle.
///
/// Each output pixel is mapped to a geographic coordinate, then back into
/// source pixel space through the inverted linear block, and bilinearly
/// sampled. A singular linear block passes the source through unchanged
/// rather than failing the pipeline.
pub fn resample(
    source: &RgbImage,
    fitted: &FittedTransform,
    params: &ResampleParams,
) -> WarpedRaster {
    let affine = &fitted.affine;
    let bounds = fitted.bounds;

    let Some(inv) = affine.invert_linear() else {
        warn!("affine linear block is singular; passing source through unwarped");
        return WarpedRaster {
            pixels: source.clone(),
            bounds,
            warped: false,
        };
    };

    // Keep roughly the input pixel density.
    let mut px_size_deg = affine.pixel_size_deg();
    if px_size_deg == 0.0 {
        px_size_deg = 1e-6;
    }

    let lon_span = bounds.east - bounds.west;
    let lat_span = bounds.north - bounds.south;
    let out_w = ((lon_span / px_size_deg) as usize).clamp(params.min_dim, params.max_dim);
    let out_h = ((lat_span / px_size_deg) as usize).clamp(params.min_dim, params.max_dim);
    info!("resampling to {out_w}x{out_h} at {px_size_deg:.2e} deg/px");

    let a0 = affine.lon_coeffs[0];
    let b0 = affine.lat_coeffs[0];
    let mut out = RgbImage::zeroed(out_w, out_h);
    for oy in 0..out_h {
        // Row-constant latitude, top row at north.
        let lat = bounds.north - oy as f64 * (lat_span / out_h as f64);
        let dlat = lat - b0;
        for ox in 0..out_w {
            let lon = bounds.west + ox as f64 * (lon_span / out_w as f64);
            let dlon = lon - a0;
            let src_x = inv[(0, 0)] * dlon + inv[(0, 1)] * dlat;
            let src_y = inv[(1, 0)] * dlon + inv[(1, 1)] * dlat;
            out.set(
                ox,
                oy,
                sample_bilinear_rgb(source, src_x, src_y, params.background),
            );
        }
    }

    WarpedRaster {
        pixels: out,
        bounds,
        warped: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_core::AffineTransform;

    fn checkered(w: usize, h: usize) -> RgbImage {
        let mut img = RgbImage::zeroed(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = if (x / 8 + y / 8) % 2 == 0 { 200 } else { 40 };
                img.set(x, y, [v, v, v]);
            }
        }
        img
    }

    fn north_up(w: usize, h: usize) -> FittedTransform {
        let affine = AffineTransform::new([-90.10, 1e-5, 0.0], [35.00, 0.0, -1e-5]);
        FittedTransform {
            affine,
            bounds: crate::transform_bounds(&affine, w, h),
        }
    }

    #[test]
    fn north_up_identity_preserves_content() {
        let src = checkered(200, 150);
        let out = resample(&src, &north_up(200, 150), &ResampleParams::default());
        assert!(out.warped);
        // Dimensions are clamped up to the minimum.
        assert_eq!(out.pixels.width, 200);
        assert_eq!(out.pixels.height, 150);
        // Away from block edges the content survives.
        assert_eq!(out.pixels.get(4, 4), src.get(4, 4));
        assert_eq!(out.pixels.get(100, 75), src.get(100, 75));
    }

    #[test]
    fn output_dimensions_are_clamped() {
        let src = checkered(16, 16);
        let small = ResampleParams::default();
        let out = resample(&src, &north_up(16, 16), &small);
        assert_eq!(out.pixels.width, 100);
        assert_eq!(out.pixels.height, 100);

        let tight = ResampleParams {
            min_dim: 10,
            max_dim: 12,
            ..ResampleParams::default()
        };
        let out = resample(&src, &north_up(16, 16), &tight);
        assert_eq!(out.pixels.width, 12);
        assert_eq!(out.pixels.height, 12);
    }

    #[test]
    fn singular_transform_passes_source_through() {
        let src = checkered(32, 32);
        let affine = AffineTransform::new([0.0, 1e-5, 2e-5], [0.0, 2e-5, 4e-5]);
        let fitted = FittedTransform {
            affine,
            bounds: BoundingBox::new(1.0, 0.0, 1.0, 0.0),
        };
        let out = resample(&src, &fitted, &ResampleParams::default());
        assert!(!out.warped);
        assert_eq!(out.pixels, src);
    }

    #[test]
    fn out_of_source_pixels_use_background() {
        // Rotated transform leaves corners of the axis-aligned box uncovered.
        let src = checkered(100, 100);
        let affine = AffineTransform::new([-90.0, 7e-6, 7e-6], [35.0, 7e-6, -7e-6]);
        let fitted = FittedTransform {
            affine,
            bounds: crate::transform_bounds(&affine, 100, 100),
        };
        let params = ResampleParams {
            background: [9, 9, 9],
            ..ResampleParams::default()
        };
        let out = resample(&src, &fitted, &params);
        assert!(out.warped);
        assert_eq!(out.pixels.get(0, 0), [9, 9, 9]);
    }
}
