use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Homography, RansacParams};

/// Consensus result of RANSAC homography estimation.
#[derive(Clone, Debug)]
pub struct RansacResult {
    pub model: Homography,
    /// Indices into the input correspondence arrays.
    pub inliers: Vec<usize>,
    pub iterations: usize,
}

/// Robustly fit a homography to `src[i] -> dst[i]` correspondences.
///
/// Samples minimal four-point subsets, scores by reprojection threshold, and
/// stops early once the adaptive iteration bound for the configured
/// confidence is reached. Returns `None` for fewer than 4 correspondences or
/// when no valid model is found.
pub fn ransac_homography(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RansacParams,
) -> Option<RansacResult> {
    let n = src.len().min(dst.len());
    if n < 4 {
        return None;
    }

    let threshold_sq = params.reproj_threshold * params.reproj_threshold;
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<RansacResult> = None;
    let mut required = params.max_iterations;
    let mut iter = 0usize;

    while iter < required && iter < params.max_iterations {
        iter += 1;

        let sample = sample_four(&mut rng, n);
        let s = [
            src[sample[0]],
            src[sample[1]],
            src[sample[2]],
            src[sample[3]],
        ];
        let d = [
            dst[sample[0]],
            dst[sample[1]],
            dst[sample[2]],
            dst[sample[3]],
        ];
        let Some(model) = Homography::from_four_points(&s, &d) else {
            continue;
        };

        let inliers: Vec<usize> = (0..n)
            .filter(|&i| model.reproj_error_sq(src[i], dst[i]) <= threshold_sq)
            .collect();

        if best.as_ref().is_none_or(|b| inliers.len() > b.inliers.len()) {
            // Shrink the iteration budget from the observed inlier ratio.
            let ratio = inliers.len() as f64 / n as f64;
            required = adaptive_iterations(params.confidence, ratio, params.max_iterations);
            best = Some(RansacResult {
                model,
                inliers,
                iterations: iter,
            });
        }
    }

    let mut out = best?;
    out.iterations = iter;
    (!out.inliers.is_empty()).then_some(out)
}

fn sample_four(rng: &mut StdRng, n: usize) -> [usize; 4] {
    let mut picked = [0usize; 4];
    let mut count = 0;
    while count < 4 {
        let candidate = rng.random_range(0..n);
        if !picked[..count].contains(&candidate) {
            picked[count] = candidate;
            count += 1;
        }
    }
    picked
}

/// Standard RANSAC bound: iterations needed to draw an all-inlier
/// four-point sample with probability `confidence`.
fn adaptive_iterations(confidence: f64, inlier_ratio: f64, cap: usize) -> usize {
    if inlier_ratio >= 1.0 {
        return 1;
    }
    if inlier_ratio <= 0.0 {
        return cap;
    }
    let p_sample = inlier_ratio.powi(4);
    if p_sample <= f64::EPSILON {
        return cap;
    }
    let needed = (1.0 - confidence).ln() / (1.0 - p_sample).ln();
    if !needed.is_finite() {
        return cap;
    }
    (needed.ceil() as usize).clamp(1, cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    fn planted_scene(n_inliers: usize, n_outliers: usize) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
        let truth = Homography::new(Matrix3::new(
            1.05, 0.02, 12.0, //
            -0.01, 0.98, -7.0, //
            0.0, 0.0, 1.0,
        ));
        let mut src = Vec::new();
        let mut dst = Vec::new();
        for i in 0..n_inliers {
            let p = Point2::new((i % 17) as f64 * 23.0 + 5.0, (i / 17) as f64 * 31.0 + 9.0);
            src.push(p);
            dst.push(truth.apply(p));
        }
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..n_outliers {
            src.push(Point2::new(
                rng.random_range(0.0..400.0),
                rng.random_range(0.0..400.0),
            ));
            dst.push(Point2::new(
                rng.random_range(0.0..400.0),
                rng.random_range(0.0..400.0),
            ));
        }
        (src, dst)
    }

    #[test]
    fn separates_planted_inliers_from_outliers() {
        let (src, dst) = planted_scene(40, 15);
        let res = ransac_homography(&src, &dst, &RansacParams::default()).expect("model");
        // Every planted correspondence must be recovered.
        for i in 0..40 {
            assert!(res.inliers.contains(&i), "lost inlier {i}");
        }
        assert!(res.inliers.len() < 55, "outliers leaked in");
    }

    #[test]
    fn adaptive_bound_shrinks_with_clean_data() {
        let (src, dst) = planted_scene(30, 0);
        let res = ransac_homography(&src, &dst, &RansacParams::default()).expect("model");
        assert!(res.iterations < 100);
    }

    #[test]
    fn too_few_points_yield_none() {
        let pts = vec![Point2::new(0.0, 0.0); 3];
        assert!(ransac_homography(&pts, &pts, &RansacParams::default()).is_none());
    }

    #[test]
    fn iteration_bound_is_clamped() {
        assert_eq!(adaptive_iterations(0.995, 0.0, 2000), 2000);
        assert_eq!(adaptive_iterations(0.995, 1.0, 2000), 1);
        let mid = adaptive_iterations(0.995, 0.5, 2000);
        assert!(mid > 1 && mid < 200);
    }
}
