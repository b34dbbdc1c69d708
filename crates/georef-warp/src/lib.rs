//! Affine georeferencing: least-squares transform fitting over ground
//! control points, residual reporting, and inverse-mapped resampling of the
//! source raster onto an axis-aligned geographic rectangle.

mod fit;
mod params;
mod resample;

pub use fit::{
    fit_transform, residual_report, transform_bounds, FitError, FittedTransform, PointResidual,
    ResidualReport, MIN_GCPS,
};
pub use params::ResampleParams;
pub use resample::{resample, WarpedRaster};
