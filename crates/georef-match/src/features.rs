use std::sync::OnceLock;

use georef_core::{sample_bilinear, GrayImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::edges::sobel;
use crate::MatchParams;

/// Detection profile for a matching pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorProfile {
    /// Single-scale oriented-patch detection, used by the first round.
    Standard,
    /// Denser scale-pyramid detection with lower contrast threshold and
    /// principal-curvature edge rejection, used as fallback.
    Dense,
}

/// An oriented keypoint in working-image coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub response: f32,
}

/// Keypoint plus its 256-bit binary descriptor.
#[derive(Clone, Copy, Debug)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: [u64; 4],
}

/// Pixels on the FAST-16 Bresenham circle of radius 3.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous arc length required by the segment test.
const ARC: usize = 9;

/// Border margin keeping the orientation patch and rotated descriptor
/// samples inside the image.
const MARGIN: i32 = 20;

const PATCH_RADIUS: i32 = 15;
const DESC_RADIUS: f32 = 13.0;
const PYRAMID_SCALE: f64 = 1.2;

/// Detect keypoints and compute descriptors on one image.
///
/// `mask` (when given) restricts detection to nonzero mask pixels; it is
/// applied at working resolution, so only the source image passes one.
pub fn detect_and_describe(
    img: &GrayImage,
    mask: Option<&GrayImage>,
    profile: DetectorProfile,
    params: &MatchParams,
) -> Vec<Feature> {
    let levels = match profile {
        DetectorProfile::Standard => 1,
        DetectorProfile::Dense => params.dense_pyramid_levels.max(1),
    };
    let threshold = match profile {
        DetectorProfile::Standard => params.fast_threshold,
        DetectorProfile::Dense => {
            ((params.dense_contrast_threshold * 255.0).round() as u8).max(2)
        }
    };

    let mut level_img = img.clone();
    let mut scale = 1.0f64;
    let mut keypoints: Vec<Keypoint> = Vec::new();
    let mut per_level: Vec<(GrayImage, Vec<usize>)> = Vec::new();

    for _level in 0..levels {
        let mut kps = detect_fast(&level_img, mask, threshold, scale);
        if profile == DetectorProfile::Dense {
            reject_edge_responses(&level_img, &mut kps, scale, params.dense_edge_threshold);
        }
        let indices: Vec<usize> = (keypoints.len()..keypoints.len() + kps.len()).collect();
        keypoints.extend(kps);
        per_level.push((level_img.clone(), indices));

        if level_img.width < 64 || level_img.height < 64 {
            break;
        }
        scale *= PYRAMID_SCALE;
        level_img = resize_by(&level_img, 1.0 / PYRAMID_SCALE);
    }

    // Budget: keep the strongest keypoints overall.
    let mut order: Vec<usize> = (0..keypoints.len()).collect();
    order.sort_by(|&a, &b| {
        keypoints[b]
            .response
            .partial_cmp(&keypoints[a].response)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(params.max_keypoints);
    let keep: std::collections::HashSet<usize> = order.into_iter().collect();

    let mut features = Vec::new();
    let mut level_scale = 1.0f64;
    for (level_img, indices) in &per_level {
        let blurred = blur_for_descriptors(level_img);
        for &ki in indices {
            if !keep.contains(&ki) {
                continue;
            }
            let kp = keypoints[ki];
            // Back to this level's local coordinates.
            let lx = (kp.x as f64 / level_scale) as f32;
            let ly = (kp.y as f64 / level_scale) as f32;
            let descriptor = describe(&blurred, lx, ly, kp.angle);
            features.push(Feature {
                keypoint: kp,
                descriptor,
            });
        }
        level_scale *= PYRAMID_SCALE;
    }
    features
}

fn resize_by(img: &GrayImage, factor: f64) -> GrayImage {
    let out_w = ((img.width as f64 * factor).round() as usize).max(1);
    let out_h = ((img.height as f64 * factor).round() as usize).max(1);
    let view = img.view();
    let mut out = GrayImage::zeroed(out_w, out_h);
    let inv_x = img.width as f64 / out_w as f64;
    let inv_y = img.height as f64 / out_h as f64;
    for y in 0..out_h {
        for x in 0..out_w {
            let sx = ((x as f64 + 0.5) * inv_x - 0.5).max(0.0);
            let sy = ((y as f64 + 0.5) * inv_y - 0.5).max(0.0);
            out.set(x, y, sample_bilinear(&view, sx as f32, sy as f32) as u8);
        }
    }
    out
}

fn detect_fast(img: &GrayImage, mask: Option<&GrayImage>, threshold: u8, scale: f64) -> Vec<Keypoint> {
    let (w, h) = (img.width as i32, img.height as i32);
    if w <= 2 * MARGIN || h <= 2 * MARGIN {
        return Vec::new();
    }
    let t = threshold as i32;
    let mut response = vec![0.0f32; img.width * img.height];

    for y in MARGIN..h - MARGIN {
        for x in MARGIN..w - MARGIN {
            if let Some(m) = mask {
                // Mask is defined at level-0 geometry.
                let mx = ((x as f64 * scale) as usize).min(m.width - 1);
                let my = ((y as f64 * scale) as usize).min(m.height - 1);
                if m.get(mx, my) == 0 {
                    continue;
                }
            }
            let c = img.get(x as usize, y as usize) as i32;

            // Quick reject on the four compass points.
            let mut brighter = 0;
            let mut darker = 0;
            for &idx in &[0usize, 4, 8, 12] {
                let (dx, dy) = CIRCLE[idx];
                let v = img.get((x + dx) as usize, (y + dy) as usize) as i32;
                if v >= c + t {
                    brighter += 1;
                } else if v <= c - t {
                    darker += 1;
                }
            }
            if brighter < 3 && darker < 3 {
                continue;
            }

            let ring: Vec<i32> = CIRCLE
                .iter()
                .map(|&(dx, dy)| img.get((x + dx) as usize, (y + dy) as usize) as i32)
                .collect();
            if let Some(score) = segment_test(&ring, c, t) {
                response[(y * w + x) as usize] = score;
            }
        }
    }

    // 3x3 non-maximum suppression.
    let mut kps = Vec::new();
    for y in MARGIN..h - MARGIN {
        for x in MARGIN..w - MARGIN {
            let r = response[(y * w + x) as usize];
            if r <= 0.0 {
                continue;
            }
            let mut is_max = true;
            'nms: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if (dx, dy) == (0, 0) {
                        continue;
                    }
                    if response[((y + dy) * w + x + dx) as usize] > r {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if is_max {
                let angle = orientation(img, x, y);
                kps.push(Keypoint {
                    x: (x as f64 * scale) as f32,
                    y: (y as f64 * scale) as f32,
                    angle,
                    response: r,
                });
            }
        }
    }
    kps
}

/// FAST segment test: some arc of `ARC` contiguous circle pixels must all be
/// brighter than `c + t` or all darker than `c - t`. Returns the response
/// (sum of absolute differences over the arc) when the test passes.
fn segment_test(ring: &[i32], c: i32, t: i32) -> Option<f32> {
    let mut best = 0i32;
    for dir in 0..2 {
        let mut run = 0usize;
        let mut run_sum = 0i32;
        // Walk twice around to handle wrap-around arcs.
        for i in 0..32 {
            let v = ring[i % 16];
            let on = if dir == 0 { v >= c + t } else { v <= c - t };
            if on {
                run += 1;
                run_sum += (v - c).abs();
                if run >= ARC {
                    best = best.max(run_sum);
                }
            } else {
                run = 0;
                run_sum = 0;
            }
        }
    }
    (best > 0).then_some(best as f32)
}

/// Intensity-centroid orientation over a circular patch.
fn orientation(img: &GrayImage, x: i32, y: i32) -> f32 {
    let mut m10 = 0.0f32;
    let mut m01 = 0.0f32;
    let r2 = PATCH_RADIUS * PATCH_RADIUS;
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = img.get((x + dx) as usize, (y + dy) as usize) as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

/// Reject keypoints sitting on straight edges using the ratio of principal
/// curvatures of the local second-moment matrix.
fn reject_edge_responses(img: &GrayImage, kps: &mut Vec<Keypoint>, scale: f64, edge_threshold: f32) {
    if kps.is_empty() {
        return;
    }
    let (gx, gy) = sobel(img);
    let w = img.width;
    let bound = ((edge_threshold + 1.0) * (edge_threshold + 1.0)) / edge_threshold;

    kps.retain(|kp| {
        let x = (kp.x as f64 / scale) as i32;
        let y = (kp.y as f64 / scale) as i32;
        let mut sxx = 0.0f32;
        let mut syy = 0.0f32;
        let mut sxy = 0.0f32;
        for dy in -3i32..=3 {
            for dx in -3i32..=3 {
                let i = (y + dy) as usize * w + (x + dx) as usize;
                sxx += gx[i] * gx[i];
                syy += gy[i] * gy[i];
                sxy += gx[i] * gy[i];
            }
        }
        let det = sxx * syy - sxy * sxy;
        let tr = sxx + syy;
        det > 0.0 && tr * tr / det < bound
    });
}

fn blur_for_descriptors(img: &GrayImage) -> GrayImage {
    // 5x5 box blur; binary tests want smoothed intensities.
    let (w, h) = (img.width as i32, img.height as i32);
    let mut out = GrayImage::zeroed(img.width, img.height);
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            let mut n = 0u32;
            for dy in -2i32..=2 {
                for dx in -2i32..=2 {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    sum += img.get(nx as usize, ny as usize) as u32;
                    n += 1;
                }
            }
            out.set(x as usize, y as usize, (sum / n) as u8);
        }
    }
    out
}

/// 256 point-pair offsets for the binary descriptor, generated once from a
/// fixed seed so descriptors are stable across runs and processes.
fn test_pattern() -> &'static [(f32, f32, f32, f32); 256] {
    static PATTERN: OnceLock<[(f32, f32, f32, f32); 256]> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(0x51f7_ab5e_c0de_2024);
        let mut out = [(0.0f32, 0.0f32, 0.0f32, 0.0f32); 256];
        for pair in out.iter_mut() {
            *pair = (
                rng.random_range(-DESC_RADIUS..DESC_RADIUS),
                rng.random_range(-DESC_RADIUS..DESC_RADIUS),
                rng.random_range(-DESC_RADIUS..DESC_RADIUS),
                rng.random_range(-DESC_RADIUS..DESC_RADIUS),
            );
        }
        out
    })
}

/// Rotated binary descriptor: each bit compares two blurred samples of the
/// patch, with the sampling pattern rotated by the keypoint orientation.
fn describe(blurred: &GrayImage, x: f32, y: f32, angle: f32) -> [u64; 4] {
    let view = blurred.view();
    let (sin, cos) = angle.sin_cos();
    let mut desc = [0u64; 4];
    for (bit, &(ax, ay, bx, by)) in test_pattern().iter().enumerate() {
        let (rax, ray) = (cos * ax - sin * ay, sin * ax + cos * ay);
        let (rbx, rby) = (cos * bx - sin * by, sin * bx + cos * by);
        let va = sample_bilinear(&view, x + rax, y + ray);
        let vb = sample_bilinear(&view, x + rbx, y + rby);
        if va < vb {
            desc[bit / 64] |= 1u64 << (bit % 64);
        }
    }
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(w: usize, h: usize, cell: usize) -> GrayImage {
        let mut img = GrayImage::zeroed(w, h);
        for y in 0..h {
            for x in 0..w {
                if (x / cell + y / cell) % 2 == 0 {
                    img.set(x, y, 220);
                } else {
                    img.set(x, y, 30);
                }
            }
        }
        img
    }

    #[test]
    fn finds_corners_on_checkerboard() {
        let img = checkerboard(128, 128, 16);
        let feats = detect_and_describe(&img, None, DetectorProfile::Standard, &MatchParams::default());
        assert!(!feats.is_empty());
        for f in &feats {
            assert!(f.keypoint.x >= MARGIN as f32);
            assert!(f.keypoint.y >= MARGIN as f32);
        }
    }

    #[test]
    fn flat_image_has_no_keypoints() {
        let img = GrayImage {
            width: 100,
            height: 100,
            data: vec![128; 10_000],
        };
        let feats = detect_and_describe(&img, None, DetectorProfile::Standard, &MatchParams::default());
        assert!(feats.is_empty());
    }

    #[test]
    fn mask_suppresses_detection() {
        let img = checkerboard(128, 128, 16);
        let mask = GrayImage::zeroed(128, 128); // everything masked out
        let feats = detect_and_describe(&img, Some(&mask), DetectorProfile::Standard, &MatchParams::default());
        assert!(feats.is_empty());
    }

    #[test]
    fn identical_patches_get_identical_descriptors() {
        let img = checkerboard(128, 128, 16);
        let blurred = blur_for_descriptors(&img);
        let d1 = describe(&blurred, 40.0, 40.0, 0.3);
        let d2 = describe(&blurred, 40.0, 40.0, 0.3);
        assert_eq!(d1, d2);
    }

    #[test]
    fn segment_test_requires_contiguous_arc() {
        // All 16 brighter: passes.
        let ring = [200i32; 16];
        assert!(segment_test(&ring, 100, 20).is_some());
        // Alternating: never 9 contiguous.
        let mut alt = [100i32; 16];
        for (i, v) in alt.iter_mut().enumerate() {
            if i % 2 == 0 {
                *v = 200;
            }
        }
        assert!(segment_test(&alt, 100, 20).is_none());
    }
}
