use serde::{Deserialize, Serialize};

/// No-data border mask construction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MaskParams {
    /// Pixels at or below this intensity are treated as no-data.
    pub threshold: u8,
    /// Radius of the elliptical closing kernel, in pixels.
    pub close_radius: usize,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            threshold: 15,
            close_radius: 7,
        }
    }
}

/// Adaptive histogram equalization.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClaheParams {
    /// Histogram clip limit as a multiple of the uniform bin height.
    pub clip_limit: f32,
    /// Tile grid edge count (8 gives an 8x8 grid).
    pub tiles: usize,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tiles: 8,
        }
    }
}

/// Edge-map construction: gradient magnitude with hysteresis, then dilation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EdgeParams {
    pub low_threshold: f32,
    pub high_threshold: f32,
    /// Radius of the elliptical dilation kernel.
    pub dilate_radius: usize,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            low_threshold: 30.0,
            high_threshold: 100.0,
            dilate_radius: 1,
        }
    }
}

/// RANSAC homography estimation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RansacParams {
    /// Reprojection threshold in pixels.
    pub reproj_threshold: f64,
    /// Target probability of drawing at least one all-inlier sample.
    pub confidence: f64,
    pub max_iterations: usize,
    /// Seed for the sampling RNG; fixed for reproducible pipelines.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            reproj_threshold: 5.0,
            confidence: 0.995,
            max_iterations: 2000,
            seed: 0x9e3779b97f4a7c15,
        }
    }
}

/// Classical matcher configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchParams {
    /// Longest source side above which the image is downsampled.
    pub max_dim: usize,
    /// Keypoint budget per image per pass.
    pub max_keypoints: usize,
    /// FAST intensity threshold for the primary profile.
    pub fast_threshold: u8,
    /// Lowe ratio for the primary profile.
    pub ratio: f32,
    /// Lowe ratio for the dense fallback profile.
    pub dense_ratio: f32,
    /// Minimum relative contrast for dense-profile keypoints.
    pub dense_contrast_threshold: f32,
    /// Principal-curvature ratio bound for dense-profile edge rejection.
    pub dense_edge_threshold: f32,
    /// Pyramid levels for the dense profile.
    pub dense_pyramid_levels: usize,
    /// Minimum RANSAC inliers for a usable result.
    pub min_inliers: usize,
    pub mask: MaskParams,
    pub clahe: ClaheParams,
    pub edges: EdgeParams,
    pub ransac: RansacParams,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            max_dim: 4000,
            max_keypoints: 10_000,
            fast_threshold: 20,
            ratio: 0.75,
            dense_ratio: 0.7,
            dense_contrast_threshold: 0.03,
            dense_edge_threshold: 15.0,
            dense_pyramid_levels: 4,
            min_inliers: 10,
            mask: MaskParams::default(),
            clahe: ClaheParams::default(),
            edges: EdgeParams::default(),
            ransac: RansacParams::default(),
        }
    }
}

/// GCP selection and confidence scoring.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SelectParams {
    /// Grid edge count; 5 gives the 5x5 selection grid.
    pub grid_size: usize,
    /// Minimum populated cells for a usable GCP set.
    pub min_cells: usize,
    /// Inlier count at which the classical count factor saturates.
    pub count_saturation: usize,
    /// Descriptor-distance normalization divisor.
    pub distance_norm: f32,
    /// Match count at which the vision count factor saturates.
    pub vision_target_matches: usize,
}

impl Default for SelectParams {
    fn default() -> Self {
        Self {
            grid_size: 5,
            min_cells: 5,
            count_saturation: 100,
            distance_norm: 200.0,
            vision_target_matches: 12,
        }
    }
}
