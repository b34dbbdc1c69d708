use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Qualitative confidence tier reported per landmark by the vision matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

/// Per-correspondence quality indicator.
///
/// Classical matches carry a descriptor distance (lower is better);
/// vision-model matches carry a qualitative tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchQuality {
    Distance(f32),
    Tier(ConfidenceTier),
}

impl MatchQuality {
    /// Ordering key for per-cell selection: lower is better.
    pub fn rank(&self) -> f32 {
        match *self {
            MatchQuality::Distance(d) => d,
            MatchQuality::Tier(ConfidenceTier::High) => 0.0,
            MatchQuality::Tier(ConfidenceTier::Medium) => 1.0,
            MatchQuality::Tier(ConfidenceTier::Low) => 2.0,
        }
    }
}

/// A single source-pixel to reference-pixel correspondence.
#[derive(Clone, Copy, Debug)]
pub struct Correspondence {
    /// Position in the (possibly downsampled) source image.
    pub src: Point2<f32>,
    /// Position in the (possibly downsampled) reference image.
    pub dst: Point2<f32>,
    pub quality: MatchQuality,
}

/// Ground control point: a full-resolution source pixel tied to a WGS84
/// coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundControlPoint {
    pub id: u32,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub lat: f64,
    pub lon: f64,
}

impl GroundControlPoint {
    /// Whether the pixel position lies within `[0, w] x [0, h]`.
    pub fn within(&self, width: usize, height: usize) -> bool {
        self.pixel_x >= 0.0
            && self.pixel_y >= 0.0
            && self.pixel_x <= width as f64
            && self.pixel_y <= height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ranks_order_high_first() {
        assert!(
            MatchQuality::Tier(ConfidenceTier::High).rank()
                < MatchQuality::Tier(ConfidenceTier::Medium).rank()
        );
        assert!(
            MatchQuality::Tier(ConfidenceTier::Medium).rank()
                < MatchQuality::Tier(ConfidenceTier::Low).rank()
        );
    }

    #[test]
    fn gcp_bounds_check_is_inclusive() {
        let g = GroundControlPoint {
            id: 1,
            pixel_x: 1000.0,
            pixel_y: 800.0,
            lat: 35.0,
            lon: -90.0,
        };
        assert!(g.within(1000, 800));
        assert!(!g.within(999, 800));
    }

    #[test]
    fn tier_deserializes_lowercase() {
        let t: ConfidenceTier = serde_json::from_str("\"high\"").expect("tier");
        assert_eq!(t, ConfidenceTier::High);
    }
}
