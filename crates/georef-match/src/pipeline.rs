use georef_core::{
    Correspondence, CorrespondenceMatcher, GeoRaster, GrayImage, MatchError, MatchOutcome,
    MatchQuality, RgbImage,
};
use log::{debug, info};
use nalgebra::Point2;

use crate::{
    border_mask, detect_and_describe, edge_map, equalize_adaptive, match_ratio_test,
    ransac_homography, DetectorProfile, MatchParams,
};

/// Feature-matching strategy over contrast-normalized images and edge maps,
/// with a dense scale-pyramid fallback.
pub struct ClassicalMatcher {
    params: MatchParams,
}

struct PassResult {
    correspondences: Vec<Correspondence>,
    total_matches: usize,
}

impl PassResult {
    fn inliers(&self) -> usize {
        self.correspondences.len()
    }
}

impl ClassicalMatcher {
    pub fn new(params: MatchParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    fn run_pass(
        &self,
        source: &GrayImage,
        mask: &GrayImage,
        reference: &GrayImage,
        profile: DetectorProfile,
        ratio: f32,
    ) -> PassResult {
        let src_feats = detect_and_describe(source, Some(mask), profile, &self.params);
        let ref_feats = detect_and_describe(reference, None, profile, &self.params);
        debug!(
            "detected {} source / {} reference keypoints ({profile:?})",
            src_feats.len(),
            ref_feats.len()
        );

        let matches = match_ratio_test(&src_feats, &ref_feats, ratio);
        if matches.len() < 4 {
            return PassResult {
                correspondences: Vec::new(),
                total_matches: matches.len(),
            };
        }

        let src_pts: Vec<Point2<f64>> = matches
            .iter()
            .map(|m| {
                let k = src_feats[m.query].keypoint;
                Point2::new(k.x as f64, k.y as f64)
            })
            .collect();
        let dst_pts: Vec<Point2<f64>> = matches
            .iter()
            .map(|m| {
                let k = ref_feats[m.train].keypoint;
                Point2::new(k.x as f64, k.y as f64)
            })
            .collect();

        let Some(consensus) = ransac_homography(&src_pts, &dst_pts, &self.params.ransac) else {
            return PassResult {
                correspondences: Vec::new(),
                total_matches: matches.len(),
            };
        };

        let correspondences = consensus
            .inliers
            .iter()
            .map(|&i| Correspondence {
                src: Point2::new(src_pts[i].x as f32, src_pts[i].y as f32),
                dst: Point2::new(dst_pts[i].x as f32, dst_pts[i].y as f32),
                quality: MatchQuality::Distance(matches[i].distance),
            })
            .collect();

        PassResult {
            correspondences,
            total_matches: matches.len(),
        }
    }

    fn better(a: PassResult, b: PassResult) -> PassResult {
        if b.inliers() > a.inliers() {
            b
        } else {
            a
        }
    }
}

impl CorrespondenceMatcher for ClassicalMatcher {
    fn find_matches(
        &self,
        source: &RgbImage,
        reference: &GeoRaster,
    ) -> Result<MatchOutcome, MatchError> {
        if source.width == 0 || source.height == 0 {
            return Err(MatchError::InvalidSource("empty raster".into()));
        }

        let gray = source.to_gray();
        let (working, source_ratio) = crate::shrink_to_max_dim(&gray, self.params.max_dim);
        drop(gray);
        info!(
            "matching {}x{} (ratio {source_ratio:.2}) against {}x{} reference",
            working.width, working.height, reference.pixels.width, reference.pixels.height
        );

        let mask = border_mask(&working, &self.params.mask);
        let ref_gray = reference.pixels.to_gray();

        let src_eq = equalize_adaptive(&working, &self.params.clahe);
        let ref_eq = equalize_adaptive(&ref_gray, &self.params.clahe);
        let src_edges = edge_map(&src_eq, &self.params.edges);
        let ref_edges = edge_map(&ref_eq, &self.params.edges);
        drop(working);
        drop(ref_gray);

        let mut best = Self::better(
            self.run_pass(&src_eq, &mask, &ref_eq, DetectorProfile::Standard, self.params.ratio),
            self.run_pass(
                &src_edges,
                &mask,
                &ref_edges,
                DetectorProfile::Standard,
                self.params.ratio,
            ),
        );
        info!("standard passes: best {} inliers", best.inliers());

        if best.inliers() < self.params.min_inliers {
            best = Self::better(
                best,
                self.run_pass(
                    &src_eq,
                    &mask,
                    &ref_eq,
                    DetectorProfile::Dense,
                    self.params.dense_ratio,
                ),
            );
            best = Self::better(
                best,
                self.run_pass(
                    &src_edges,
                    &mask,
                    &ref_edges,
                    DetectorProfile::Dense,
                    self.params.dense_ratio,
                ),
            );
            info!("dense fallback: best {} inliers", best.inliers());
        }

        if best.inliers() < self.params.min_inliers {
            return Err(MatchError::InsufficientMatches {
                found: best.inliers(),
                minimum: self.params.min_inliers,
            });
        }

        Ok(MatchOutcome {
            total_candidates: best.total_matches,
            correspondences: best.correspondences,
            source_ratio,
            reference_ratio: 1.0,
            self_confidence: None,
        })
    }
}
