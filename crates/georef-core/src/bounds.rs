use serde::{Deserialize, Serialize};

/// Geographic bounding box in WGS84 degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Span limits applied when validating a user-supplied bounding box.
///
/// A box wider than `max_span_deg` in either axis would require an excessive
/// number of reference tiles; a box smaller than `min_span_deg` in *both*
/// axes covers too little ground for matching.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SpanLimits {
    pub min_span_deg: f64,
    pub max_span_deg: f64,
}

impl Default for SpanLimits {
    fn default() -> Self {
        Self {
            min_span_deg: 0.001,
            max_span_deg: 0.5,
        }
    }
}

/// Bounding box validation failures, each naming the violated constraint.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("invalid bounding box (north must be > south, east must be > west)")]
    Inverted,
    #[error(
        "selected area is too large ({lat_span:.3}° × {lon_span:.3}°, max {max:.3}°); \
         draw a tighter box around the photo area"
    )]
    TooLarge {
        lat_span: f64,
        lon_span: f64,
        max: f64,
    },
    #[error("selected area is too small; the box should cover the approximate photo extent")]
    TooSmall,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    #[inline]
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    #[inline]
    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    /// Validate the box against the span limits.
    ///
    /// Called once per georeferencing attempt, before any network or
    /// matching work.
    pub fn validate(&self, limits: &SpanLimits) -> Result<(), BoundsError> {
        let lat_span = self.lat_span();
        let lon_span = self.lon_span();

        if lat_span <= 0.0 || lon_span <= 0.0 {
            return Err(BoundsError::Inverted);
        }
        if lat_span > limits.max_span_deg || lon_span > limits.max_span_deg {
            return Err(BoundsError::TooLarge {
                lat_span,
                lon_span,
                max: limits.max_span_deg,
            });
        }
        if lat_span < limits.min_span_deg && lon_span < limits.min_span_deg {
            return Err(BoundsError::TooSmall);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SpanLimits {
        SpanLimits::default()
    }

    #[test]
    fn accepts_box_within_limits() {
        let b = BoundingBox::new(35.00, 34.90, -90.00, -90.10);
        assert!(b.validate(&limits()).is_ok());
    }

    #[test]
    fn rejects_inverted_axes() {
        let b = BoundingBox::new(34.90, 35.00, -90.00, -90.10);
        assert_eq!(b.validate(&limits()), Err(BoundsError::Inverted));

        let b = BoundingBox::new(35.00, 34.90, -90.10, -90.00);
        assert_eq!(b.validate(&limits()), Err(BoundsError::Inverted));
    }

    #[test]
    fn rejects_excessive_span() {
        let b = BoundingBox::new(36.00, 34.90, -90.00, -90.10);
        assert!(matches!(
            b.validate(&limits()),
            Err(BoundsError::TooLarge { .. })
        ));
    }

    #[test]
    fn rejects_degenerate_span_only_when_both_axes_tiny() {
        let tiny = BoundingBox::new(35.0005, 35.0, -90.0, -90.0005);
        assert_eq!(tiny.validate(&limits()), Err(BoundsError::TooSmall));

        // One narrow axis is fine as long as the other has real extent.
        let strip = BoundingBox::new(35.0005, 35.0, -90.0, -90.1);
        assert!(strip.validate(&limits()).is_ok());
    }
}
