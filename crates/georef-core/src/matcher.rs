use crate::{Correspondence, GeoRaster, RgbImage};

/// Raw output of a correspondence matcher, before GCP selection.
#[derive(Clone, Debug)]
pub struct MatchOutcome {
    /// Accepted correspondences in working-resolution pixel space.
    pub correspondences: Vec<Correspondence>,
    /// Maps working source pixels back to full-resolution ones (>= 1).
    pub source_ratio: f64,
    /// Maps working reference pixels back to mosaic pixels (>= 1).
    pub reference_ratio: f64,
    /// Candidate matches considered before geometric/tier filtering.
    pub total_candidates: usize,
    /// Self-reported overall confidence, when the strategy provides one.
    pub self_confidence: Option<f64>,
}

/// Errors shared by every matcher strategy.
#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    #[error(
        "insufficient feature matches (found {found}, minimum {minimum}); the photo may be \
         too different from modern imagery or the box may not overlap it; adjust the \
         search area or place control points manually"
    )]
    InsufficientMatches { found: usize, minimum: usize },

    #[error("source image is unusable for matching: {0}")]
    InvalidSource(String),

    #[error("matching service failed: {0}")]
    Service(String),
}

/// Capability shared by the classical and vision-model matchers.
///
/// Implementations are selected by explicit pipeline configuration, not by
/// runtime feature probing.
pub trait CorrespondenceMatcher {
    /// Find source-to-reference point correspondences.
    ///
    /// `source` is the full-resolution uploaded raster; `reference` the
    /// mosaic with its geo-transform. Implementations may downsample either
    /// image internally and must report the ratios in the outcome.
    fn find_matches(
        &self,
        source: &RgbImage,
        reference: &GeoRaster,
    ) -> Result<MatchOutcome, MatchError>;
}
