//! High-level facade for the `georef-*` workspace.
//!
//! Ties the stages together: validate a search area, download reference
//! imagery, find correspondences with the configured matcher strategy,
//! select ground control points, fit the affine transform, and resample the
//! photo onto an axis-aligned geographic rectangle. Fitted transforms
//! persist as JSON side-cars keyed by source-image identity.
//!
//! ```no_run
//! use georef::{GeorefConfig, Georeferencer};
//! use georef_core::BoundingBox;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::ImageReader::open("frame.tif")?.decode()?.to_rgb8();
//! let source = georef::rgb_from_image(&img);
//! let bbox = BoundingBox::new(35.00, 34.90, -90.00, -90.10);
//!
//! let runner = Georeferencer::new(GeorefConfig::default());
//! let gcps = runner.run_auto(&source, bbox)?;
//! let artifact = runner.georeference(&source, &gcps.gcps)?;
//! println!("RMS {:.1} m", artifact.residuals.rms_m);
//! # Ok(())
//! # }
//! ```

pub use georef_core as core;
pub use georef_match as matching;
pub use georef_tiles as tiles;
pub use georef_vision as vision;
pub use georef_warp as warp;

mod convert;
mod pipeline;
mod sidecar;

pub use convert::{image_from_rgb, rgb_from_image};
pub use pipeline::{
    GeorefConfig, GeoreferenceArtifact, GeoreferenceError, Georeferencer, MatcherStrategy,
};
pub use sidecar::{SidecarRecord, SidecarStore, SidecarError};
