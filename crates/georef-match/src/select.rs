use georef_core::{GeoTransform, GroundControlPoint, MatchOutcome, MatchQuality};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SelectParams;

/// Spatially distributed GCPs with an overall confidence score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GcpSet {
    pub gcps: Vec<GroundControlPoint>,
    /// Heuristic reliability score in `[0, 1]`.
    pub confidence: f64,
    /// Inlier correspondences the selection drew from.
    pub match_count: usize,
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("matches cover only {cells} grid cells, need at least {minimum}")]
    SparseCoverage { cells: usize, minimum: usize },
    #[error("source raster is empty")]
    EmptySource,
}

/// Pick at most one correspondence per cell of a `grid_size` x `grid_size`
/// partition of the working source image, keeping the best-ranked match in
/// each cell, and promote the winners to full-resolution GCPs.
///
/// `source_width`/`source_height` are the full-resolution dimensions;
/// correspondence pixels are rescaled by the outcome's downsampling ratios.
pub fn select_gcps(
    outcome: &MatchOutcome,
    source_width: usize,
    source_height: usize,
    reference_transform: &GeoTransform,
    params: &SelectParams,
) -> Result<GcpSet, SelectError> {
    if source_width == 0 || source_height == 0 {
        return Err(SelectError::EmptySource);
    }

    let working_w = source_width as f64 / outcome.source_ratio;
    let working_h = source_height as f64 / outcome.source_ratio;
    let n_cells = params.grid_size * params.grid_size;

    // Best correspondence index per occupied cell.
    let mut cell_best: Vec<Option<usize>> = vec![None; n_cells];
    for (i, c) in outcome.correspondences.iter().enumerate() {
        let cx = ((c.src.x as f64 / working_w * params.grid_size as f64) as usize)
            .min(params.grid_size - 1);
        let cy = ((c.src.y as f64 / working_h * params.grid_size as f64) as usize)
            .min(params.grid_size - 1);
        let slot = &mut cell_best[cy * params.grid_size + cx];
        match *slot {
            Some(j) if outcome.correspondences[j].quality.rank() <= c.quality.rank() => {}
            _ => *slot = Some(i),
        }
    }

    let occupied = cell_best.iter().flatten().count();
    if occupied < params.min_cells {
        return Err(SelectError::SparseCoverage {
            cells: occupied,
            minimum: params.min_cells,
        });
    }

    let ref_transform = reference_transform.scaled(outcome.reference_ratio);
    let mut gcps = Vec::with_capacity(occupied);
    for (id, &i) in cell_best.iter().flatten().enumerate() {
        let c = &outcome.correspondences[i];
        let (lon, lat) = ref_transform.pixel_to_geo(c.dst.x as f64, c.dst.y as f64);
        // Rounded working dims can rescale an edge match a hair past the
        // full-resolution raster.
        gcps.push(GroundControlPoint {
            id: id as u32,
            pixel_x: (c.src.x as f64 * outcome.source_ratio).clamp(0.0, source_width as f64),
            pixel_y: (c.src.y as f64 * outcome.source_ratio).clamp(0.0, source_height as f64),
            lat,
            lon,
        });
    }

    let confidence = score_confidence(outcome, occupied, params);
    info!(
        "selected {} GCPs from {} matches over {occupied}/{n_cells} cells, confidence {confidence:.2}",
        gcps.len(),
        outcome.correspondences.len()
    );

    Ok(GcpSet {
        gcps,
        confidence,
        match_count: outcome.correspondences.len(),
    })
}

/// Blend count, quality, and spatial-coverage factors into `[0, 1]`.
///
/// Distance-quality outcomes weigh descriptor distances and cell coverage;
/// tier-quality outcomes weigh reported tiers, quadrant balance, and the
/// matcher's own confidence estimate.
fn score_confidence(outcome: &MatchOutcome, occupied_cells: usize, params: &SelectParams) -> f64 {
    let n = outcome.correspondences.len();
    if n == 0 {
        return 0.0;
    }

    let has_tiers = outcome
        .correspondences
        .iter()
        .any(|c| matches!(c.quality, MatchQuality::Tier(_)));

    let score = if has_tiers {
        let count_factor = (n as f64 / params.vision_target_matches as f64).min(1.0);
        let tier_factor = outcome
            .correspondences
            .iter()
            .map(|c| match c.quality {
                MatchQuality::Tier(georef_core::ConfidenceTier::High) => 1.0,
                MatchQuality::Tier(georef_core::ConfidenceTier::Medium) => 0.5,
                MatchQuality::Tier(georef_core::ConfidenceTier::Low) => 0.0,
                MatchQuality::Distance(_) => 0.5,
            })
            .sum::<f64>()
            / n as f64;
        let self_factor = outcome.self_confidence.unwrap_or(0.5).clamp(0.0, 1.0);
        0.25 * count_factor
            + 0.20 * tier_factor
            + 0.25 * quadrant_coverage(outcome)
            + 0.30 * self_factor
    } else {
        let count_factor = (n as f64 / params.count_saturation as f64).min(1.0);
        let inlier_factor = if outcome.total_candidates > 0 {
            n as f64 / outcome.total_candidates as f64
        } else {
            0.0
        };
        let cell_factor = occupied_cells as f64 / (params.grid_size * params.grid_size) as f64;
        let avg_distance = outcome
            .correspondences
            .iter()
            .map(|c| c.quality.rank() as f64)
            .sum::<f64>()
            / n as f64;
        let distance_factor = (1.0 - avg_distance / params.distance_norm as f64).max(0.0);
        0.3 * count_factor + 0.2 * inlier_factor + 0.3 * cell_factor + 0.2 * distance_factor
    };

    score.clamp(0.0, 1.0)
}

/// Fraction of quadrants around the midpoint of the match extents that hold
/// at least one correspondence.
fn quadrant_coverage(outcome: &MatchOutcome) -> f64 {
    if outcome.correspondences.is_empty() {
        return 0.0;
    }
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in &outcome.correspondences {
        min_x = min_x.min(c.src.x as f64);
        max_x = max_x.max(c.src.x as f64);
        min_y = min_y.min(c.src.y as f64);
        max_y = max_y.max(c.src.y as f64);
    }
    let cx = (min_x + max_x) / 2.0;
    let cy = (min_y + max_y) / 2.0;

    let mut seen = [false; 4];
    for c in &outcome.correspondences {
        let q = (((c.src.x as f64) >= cx) as usize) | ((((c.src.y as f64) >= cy) as usize) << 1);
        seen[q] = true;
    }
    seen.iter().filter(|&&s| s).count() as f64 / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_core::{ConfidenceTier, Correspondence};
    use nalgebra::Point2;

    fn transform() -> GeoTransform {
        GeoTransform {
            origin_lon: -90.10,
            origin_lat: 35.00,
            px_size_lon: 1e-5,
            px_size_lat: -1e-5,
        }
    }

    fn spread_outcome(n: usize, quality: MatchQuality) -> MatchOutcome {
        // Correspondences spread across a 1000x800 working image.
        let correspondences = (0..n)
            .map(|i| {
                let x = 50.0 + (i % 5) as f32 * 200.0;
                let y = 40.0 + (i / 5) as f32 * 150.0;
                Correspondence {
                    src: Point2::new(x, y),
                    dst: Point2::new(x + 10.0, y - 5.0),
                    quality,
                }
            })
            .collect();
        MatchOutcome {
            correspondences,
            source_ratio: 2.0,
            reference_ratio: 1.0,
            total_candidates: n * 2,
            self_confidence: None,
        }
    }

    #[test]
    fn one_gcp_per_occupied_cell_at_full_resolution() {
        let outcome = spread_outcome(25, MatchQuality::Distance(40.0));
        let set = select_gcps(&outcome, 2000, 1600, &transform(), &SelectParams::default())
            .expect("selection");
        assert_eq!(set.gcps.len(), 25);
        assert_eq!(set.match_count, 25);

        // Downsampled pixel (50, 40) scales back by ratio 2.
        let first = set.gcps.iter().find(|g| g.id == 0).expect("gcp 0");
        assert_eq!(first.pixel_x, 100.0);
        assert_eq!(first.pixel_y, 80.0);
        assert!(set.gcps.iter().all(|g| g.within(2000, 1600)));
    }

    #[test]
    fn better_ranked_match_wins_its_cell() {
        let mut outcome = spread_outcome(25, MatchQuality::Distance(40.0));
        // Second point in the same cell as the first, with a lower distance.
        outcome.correspondences.push(Correspondence {
            src: Point2::new(60.0, 45.0),
            dst: Point2::new(0.0, 0.0),
            quality: MatchQuality::Distance(5.0),
        });
        let set = select_gcps(&outcome, 2000, 1600, &transform(), &SelectParams::default())
            .expect("selection");
        assert_eq!(set.gcps.len(), 25);
        assert!(set.gcps.iter().any(|g| g.pixel_x == 120.0 && g.pixel_y == 90.0));
    }

    #[test]
    fn edge_matches_stay_inside_the_full_resolution_raster() {
        // 1601 rows shrunk by ratio 2 round up to an 801-row working image,
        // so a bottom-edge match at y = 801 would rescale to 1602.
        let mut outcome = spread_outcome(25, MatchQuality::Distance(40.0));
        outcome.correspondences.push(Correspondence {
            src: Point2::new(999.0, 801.0),
            dst: Point2::new(999.0, 801.0),
            quality: MatchQuality::Distance(1.0),
        });
        let set = select_gcps(&outcome, 2000, 1601, &transform(), &SelectParams::default())
            .expect("selection");
        assert!(set.gcps.iter().all(|g| g.within(2000, 1601)));
        let edge = set
            .gcps
            .iter()
            .find(|g| g.pixel_y > 1600.0)
            .expect("edge gcp");
        assert_eq!(edge.pixel_y, 1601.0);
    }

    #[test]
    fn clustered_matches_are_rejected() {
        let correspondences = (0..20)
            .map(|i| Correspondence {
                src: Point2::new(10.0 + i as f32, 10.0),
                dst: Point2::new(10.0 + i as f32, 10.0),
                quality: MatchQuality::Distance(30.0),
            })
            .collect();
        let outcome = MatchOutcome {
            correspondences,
            source_ratio: 1.0,
            reference_ratio: 1.0,
            total_candidates: 40,
            self_confidence: None,
        };
        match select_gcps(&outcome, 1000, 800, &transform(), &SelectParams::default()) {
            Err(SelectError::SparseCoverage { cells, minimum }) => {
                assert_eq!(cells, 1);
                assert_eq!(minimum, 5);
            }
            other => panic!("expected sparse coverage, got {other:?}"),
        }
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        for n in [5, 12, 25] {
            for q in [
                MatchQuality::Distance(0.0),
                MatchQuality::Distance(500.0),
                MatchQuality::Tier(ConfidenceTier::High),
                MatchQuality::Tier(ConfidenceTier::Low),
            ] {
                let mut outcome = spread_outcome(n, q);
                outcome.self_confidence = Some(1.0);
                if let Ok(set) =
                    select_gcps(&outcome, 2000, 1600, &transform(), &SelectParams::default())
                {
                    assert!((0.0..=1.0).contains(&set.confidence), "n={n} q={q:?}");
                }
            }
        }
    }

    #[test]
    fn high_tiers_score_above_low_tiers() {
        let params = SelectParams::default();
        let t = transform();
        let high = spread_outcome(12, MatchQuality::Tier(ConfidenceTier::High));
        let low = spread_outcome(12, MatchQuality::Tier(ConfidenceTier::Low));
        let s_high = select_gcps(&high, 2000, 1600, &t, &params).expect("high").confidence;
        let s_low = select_gcps(&low, 2000, 1600, &t, &params).expect("low").confidence;
        assert!(s_high > s_low);
    }

    #[test]
    fn geographic_positions_follow_the_reference_transform() {
        let mut outcome = spread_outcome(25, MatchQuality::Distance(40.0));
        outcome.reference_ratio = 2.0;
        let set = select_gcps(&outcome, 2000, 1600, &transform(), &SelectParams::default())
            .expect("selection");
        let first = set.gcps.iter().find(|g| g.id == 0).expect("gcp 0");
        // dst (60, 35) on a half-resolution reference: scale pixel size by 2.
        assert!((first.lon - (-90.10 + 60.0 * 2e-5)).abs() < 1e-9);
        assert!((first.lat - (35.00 - 35.0 * 2e-5)).abs() < 1e-9);
    }
}
