use georef_core::{haversine_m, AffineTransform, BoundingBox, GroundControlPoint};
use log::info;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum control points for a trustworthy 6-parameter fit.
pub const MIN_GCPS: usize = 5;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("at least {minimum} ground control points are required, got {found}")]
    NotEnoughPoints { found: usize, minimum: usize },
    #[error("control points are collinear or degenerate; cannot fit a transform")]
    SingularSystem,
}

/// Fitted pixel-to-geographic mapping with the geographic extent of the
/// source raster under it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    pub affine: AffineTransform,
    pub bounds: BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointResidual {
    pub gcp_id: u32,
    /// Great-circle distance between predicted and actual position.
    pub error_m: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResidualReport {
    pub per_point: Vec<PointResidual>,
    pub rms_m: f64,
}

/// Fit the affine transform and derive the warped extent of a
/// `width` x `height` source raster.
pub fn fit_transform(
    gcps: &[GroundControlPoint],
    width: usize,
    height: usize,
) -> Result<(FittedTransform, ResidualReport), FitError> {
    let affine = fit_affine(gcps)?;
    let bounds = transform_bounds(&affine, width, height);
    let residuals = residual_report(&affine, gcps);
    info!(
        "affine fit over {} GCPs: RMS {:.1} m, bounds N{:.4} S{:.4} E{:.4} W{:.4}",
        gcps.len(),
        residuals.rms_m,
        bounds.north,
        bounds.south,
        bounds.east,
        bounds.west
    );
    Ok((FittedTransform { affine, bounds }, residuals))
}

/// Two independent least-squares solves over design rows `[1, px, py]`,
/// one for longitude and one for latitude.
fn fit_affine(gcps: &[GroundControlPoint]) -> Result<AffineTransform, FitError> {
    if gcps.len() < MIN_GCPS {
        return Err(FitError::NotEnoughPoints {
            found: gcps.len(),
            minimum: MIN_GCPS,
        });
    }

    let n = gcps.len();
    let design = DMatrix::<f64>::from_fn(n, 3, |i, j| match j {
        0 => 1.0,
        1 => gcps[i].pixel_x,
        _ => gcps[i].pixel_y,
    });
    let lon_vec = DVector::<f64>::from_fn(n, |i, _| gcps[i].lon);
    let lat_vec = DVector::<f64>::from_fn(n, |i, _| gcps[i].lat);

    let svd = design.svd(true, true);
    let eps = svd.singular_values.max() * 1e-12;
    if svd.rank(eps) < 3 {
        return Err(FitError::SingularSystem);
    }
    let lon = svd.solve(&lon_vec, eps).map_err(|_| FitError::SingularSystem)?;
    let lat = svd.solve(&lat_vec, eps).map_err(|_| FitError::SingularSystem)?;

    Ok(AffineTransform::new(
        [lon[0], lon[1], lon[2]],
        [lat[0], lat[1], lat[2]],
    ))
}

/// Axis-aligned geographic box covering the four mapped raster corners.
pub fn transform_bounds(affine: &AffineTransform, width: usize, height: usize) -> BoundingBox {
    let (w, h) = (width as f64, height as f64);
    let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    let mut north = f64::NEG_INFINITY;
    let mut south = f64::INFINITY;
    let mut east = f64::NEG_INFINITY;
    let mut west = f64::INFINITY;
    for (px, py) in corners {
        let (lon, lat) = affine.pixel_to_geo(px, py);
        north = north.max(lat);
        south = south.min(lat);
        east = east.max(lon);
        west = west.min(lon);
    }
    BoundingBox::new(north, south, east, west)
}

/// Haversine residual per GCP plus the RMS across all of them.
pub fn residual_report(affine: &AffineTransform, gcps: &[GroundControlPoint]) -> ResidualReport {
    let mut per_point = Vec::with_capacity(gcps.len());
    let mut sum_sq = 0.0;
    for g in gcps {
        let (pred_lon, pred_lat) = affine.pixel_to_geo(g.pixel_x, g.pixel_y);
        let error_m = haversine_m(g.lat, g.lon, pred_lat, pred_lon);
        per_point.push(PointResidual {
            gcp_id: g.id,
            error_m,
        });
        sum_sq += error_m * error_m;
    }
    let rms_m = if per_point.is_empty() {
        0.0
    } else {
        (sum_sq / per_point.len() as f64).sqrt()
    };
    ResidualReport { per_point, rms_m }
}
