//! Classical correspondence matching.
//!
//! Two detection/matching passes (contrast-normalized images and dilated edge
//! maps) with oriented binary descriptors, ratio-test matching, and RANSAC
//! homography filtering; a denser scale-pyramid profile serves as fallback
//! when the first round finds too few inliers. Also hosts the grid-based GCP
//! selector shared by both matcher strategies.

mod clahe;
mod edges;
mod features;
mod homography;
mod matching;
mod params;
mod pipeline;
mod preprocess;
mod ransac;
mod select;

pub use clahe::equalize_adaptive;
pub use edges::edge_map;
pub use features::{detect_and_describe, DetectorProfile, Feature, Keypoint};
pub use homography::Homography;
pub use matching::{match_ratio_test, DescriptorMatch};
pub use params::{ClaheParams, EdgeParams, MaskParams, MatchParams, RansacParams, SelectParams};
pub use pipeline::ClassicalMatcher;
pub use preprocess::{border_mask, shrink_to_max_dim};
pub use ransac::{ransac_homography, RansacResult};
pub use select::{select_gcps, GcpSet, SelectError};
