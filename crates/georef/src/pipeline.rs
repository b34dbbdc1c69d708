use georef_core::{
    BoundingBox, BoundsError, CorrespondenceMatcher, GeoRaster, GroundControlPoint, MatchError,
    RgbImage, SpanLimits,
};
use georef_match::{select_gcps, ClassicalMatcher, GcpSet, MatchParams, SelectError, SelectParams};
use georef_tiles::{FetchParams, HttpTileService, ReferenceFetcher, TileError, TileFetchError};
use georef_vision::{VisionMatcher, VisionParams};
use georef_warp::{
    fit_transform, resample, FitError, FittedTransform, ResampleParams, ResidualReport,
    WarpedRaster,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which matcher the automatic pipeline runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatcherStrategy {
    Classical,
    Vision,
    /// Vision model first, classical features when it fails.
    #[default]
    VisionWithClassicalFallback,
}

/// Full pipeline configuration; every stage reads its own params block.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeorefConfig {
    pub strategy: MatcherStrategy,
    pub limits: SpanLimits,
    pub fetch: FetchParams,
    pub matching: MatchParams,
    pub vision: VisionParams,
    pub select: SelectParams,
    pub resample: ResampleParams,
}

#[derive(Debug, Error)]
pub enum GeoreferenceError {
    #[error(transparent)]
    Bounds(#[from] BoundsError),
    #[error("tile client setup failed: {0}")]
    TileClient(#[from] TileFetchError),
    #[error(transparent)]
    Tiles(#[from] TileError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Output of a full georeferencing run.
#[derive(Clone, Debug)]
pub struct GeoreferenceArtifact {
    pub fitted: FittedTransform,
    pub residuals: ResidualReport,
    pub warped: WarpedRaster,
}

/// Orchestrates fetch, match, select, fit, and resample stages.
///
/// Each run owns its buffers; the caller guarantees at most one run per
/// source image at a time.
pub struct Georeferencer {
    config: GeorefConfig,
}

impl Georeferencer {
    pub fn new(config: GeorefConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeorefConfig {
        &self.config
    }

    /// Automatic pipeline: validate the box, download reference imagery, and
    /// match it against the photo.
    pub fn run_auto(
        &self,
        source: &RgbImage,
        bbox: BoundingBox,
    ) -> Result<GcpSet, GeoreferenceError> {
        bbox.validate(&self.config.limits)?;

        let service = HttpTileService::new(&self.config.fetch)?;
        let fetcher = ReferenceFetcher::new(service, self.config.fetch.clone());
        let imagery = fetcher.fetch(&bbox)?;
        info!(
            "reference imagery: {} tiles, {} failures",
            imagery.tile_count, imagery.failures
        );

        // The mosaic is dropped as soon as correspondences exist.
        self.match_reference(source, &imagery.raster)
    }

    /// Match an already-assembled reference mosaic and select GCPs.
    pub fn match_reference(
        &self,
        source: &RgbImage,
        reference: &GeoRaster,
    ) -> Result<GcpSet, GeoreferenceError> {
        let outcome = match self.config.strategy {
            MatcherStrategy::Classical => {
                ClassicalMatcher::new(self.config.matching.clone()).find_matches(source, reference)?
            }
            MatcherStrategy::Vision => self.vision_match(source, reference)?,
            MatcherStrategy::VisionWithClassicalFallback => {
                match self.vision_match(source, reference) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!("vision matching failed ({err}); falling back to classical");
                        ClassicalMatcher::new(self.config.matching.clone())
                            .find_matches(source, reference)?
                    }
                }
            }
        };

        let set = select_gcps(
            &outcome,
            source.width,
            source.height,
            &reference.transform,
            &self.config.select,
        )?;
        info!(
            "selected {} GCPs, confidence {:.2}",
            set.gcps.len(),
            set.confidence
        );
        Ok(set)
    }

    fn vision_match(
        &self,
        source: &RgbImage,
        reference: &GeoRaster,
    ) -> Result<georef_core::MatchOutcome, MatchError> {
        let matcher = VisionMatcher::from_params(self.config.vision.clone())
            .map_err(|e| MatchError::Service(e.to_string()))?;
        matcher.find_matches(source, reference)
    }

    /// Manual pipeline entry: user-placed GCPs, no matching stage.
    ///
    /// Points outside the raster are dropped before fitting.
    pub fn run_manual(
        &self,
        source: &RgbImage,
        gcps: &[GroundControlPoint],
    ) -> Result<GeoreferenceArtifact, GeoreferenceError> {
        let usable: Vec<GroundControlPoint> = gcps
            .iter()
            .filter(|g| g.within(source.width, source.height))
            .copied()
            .collect();
        if usable.len() < gcps.len() {
            warn!(
                "dropped {} GCPs outside the {}x{} raster",
                gcps.len() - usable.len(),
                source.width,
                source.height
            );
        }
        self.georeference(source, &usable)
    }

    /// Fit the transform over the GCPs and warp the photo.
    pub fn georeference(
        &self,
        source: &RgbImage,
        gcps: &[GroundControlPoint],
    ) -> Result<GeoreferenceArtifact, GeoreferenceError> {
        let (fitted, residuals) = fit_transform(gcps, source.width, source.height)?;
        let warped = resample(source, &fitted, &self.config.resample);
        Ok(GeoreferenceArtifact {
            fitted,
            residuals,
            warped,
        })
    }
}
