//! Core types and utilities for aerial-image georeferencing.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete matcher implementation, tile provider, or image
//! codec.

mod affine;
mod bounds;
mod control;
mod geo;
mod logger;
mod matcher;
mod raster;

pub use affine::AffineTransform;
pub use bounds::{BoundingBox, BoundsError, SpanLimits};
pub use control::{ConfidenceTier, Correspondence, GroundControlPoint, MatchQuality};
pub use geo::{haversine_m, GeoTransform, EARTH_RADIUS_M};
pub use logger::init_with_level;
pub use matcher::{CorrespondenceMatcher, MatchError, MatchOutcome};
pub use raster::{
    sample_bilinear, sample_bilinear_rgb, sample_bilinear_u8, GeoRaster, GrayImage, GrayImageView,
    RgbImage,
};
