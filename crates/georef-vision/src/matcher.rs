use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use georef_core::{
    Correspondence, CorrespondenceMatcher, GeoRaster, MatchError, MatchOutcome, MatchQuality,
    RgbImage,
};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use log::{debug, info};
use nalgebra::Point2;

use crate::client::{AnthropicClient, ContentBlock, MessagesRequest, VisionClient, VisionError};
use crate::overlay::{draw_grid_overlay, shrink_rgb_to_max_dim};
use crate::params::VisionParams;
use crate::parse::{parse_response, ParseError};

/// Landmark matcher backed by a vision-capable model.
pub struct VisionMatcher<C> {
    client: C,
    params: VisionParams,
}

impl VisionMatcher<AnthropicClient> {
    /// Build with the real API client, resolving the key from the params or
    /// the environment.
    pub fn from_params(params: VisionParams) -> Result<Self, VisionError> {
        let key = params.resolve_api_key().ok_or(VisionError::MissingApiKey)?;
        let client = AnthropicClient::new(key, Duration::from_secs(params.timeout_secs))?;
        Ok(Self::new(client, params))
    }
}

impl<C: VisionClient> VisionMatcher<C> {
    pub fn new(client: C, params: VisionParams) -> Self {
        Self { client, params }
    }

    fn encode_payload(&self, img: &RgbImage) -> Result<String, VisionError> {
        let gridded = draw_grid_overlay(img, self.params.grid_spacing);
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.params.jpeg_quality).encode(
            &gridded.data,
            gridded.width as u32,
            gridded.height as u32,
            ExtendedColorType::Rgb8,
        )?;
        Ok(STANDARD.encode(&jpeg))
    }

    fn build_request(
        &self,
        aerial_b64: String,
        ref_b64: String,
        aerial_dims: (usize, usize),
        ref_dims: (usize, usize),
        ref_bounds: (f64, f64, f64, f64),
    ) -> MessagesRequest {
        let (aw, ah) = aerial_dims;
        let (rw, rh) = ref_dims;
        let (west, east, south, north) = ref_bounds;
        let spacing = self.params.grid_spacing;
        let target = self.params.target_matches;
        let minimum = self.params.min_matches;

        let content = vec![
            ContentBlock::text(
                "You are a geospatial analyst matching landmarks between a historical aerial \
                 photograph and modern satellite imagery of the same area.\n\n\
                 Both images have a red pixel coordinate grid overlay. The grid lines are \
                 labeled with pixel coordinates along the top (X axis) and left (Y axis) \
                 edges. Use these grid labels to report precise pixel positions.",
            ),
            ContentBlock::base64_jpeg(aerial_b64),
            ContentBlock::text(format!(
                "IMAGE 1 (above): Historical aerial photograph.\n\
                 - Dimensions: {aw} x {ah} pixels\n\
                 - Grid spacing: {spacing} pixels\n\
                 - This may be black-and-white or grayscale. It may have black borders \
                 (no-data areas); ignore those regions."
            )),
            ContentBlock::base64_jpeg(ref_b64),
            ContentBlock::text(format!(
                "IMAGE 2 (above): Modern satellite imagery.\n\
                 - Dimensions: {rw} x {rh} pixels\n\
                 - Grid spacing: {spacing} pixels\n\
                 - Geographic coverage: {west:.6} to {east:.6} longitude, \
                 {south:.6} to {north:.6} latitude"
            )),
            ContentBlock::text(format!(
                "TASK: Identify {target} landmark points that are clearly visible in BOTH \
                 images. These will be used as Ground Control Points (GCPs) for \
                 georeferencing the historical photo.\n\n\
                 GOOD LANDMARKS (prioritize these):\n\
                 - Road intersections or sharp road curves\n\
                 - River bends, canal junctions, or shoreline features\n\
                 - Bridge endpoints\n\
                 - Railroad crossings or rail line curves\n\
                 - Building corners or distinctive structures\n\
                 - Levee or embankment turns\n\
                 - Field corners or property boundaries\n\
                 - Pond or lake edges with distinctive shapes\n\n\
                 BAD LANDMARKS (avoid these):\n\
                 - Points in featureless areas (open water, uniform forest, bare ground)\n\
                 - Points in the black border/no-data area of the aerial photo\n\
                 - Points that have clearly changed between time periods\n\
                 - Points near the very edge of either image\n\n\
                 SPATIAL DISTRIBUTION: Spread points across the entire overlapping area. \
                 Do NOT cluster points in one region. Aim for at least one point in each \
                 quadrant.\n\n\
                 COORDINATE PRECISION: Use the red grid overlay to determine pixel \
                 coordinates. Read the nearest grid labels and estimate the position \
                 between grid lines. For example, if a point is roughly 60% of the way \
                 between grid line X=400 and X=600, report X as approximately 520.\n\n\
                 RESPONSE FORMAT: Return ONLY valid JSON (no markdown fences, no \
                 explanation outside the JSON). Use this exact structure:\n\n\
                 {{\n\
                 \x20 \"matches\": [\n\
                 \x20   {{\n\
                 \x20     \"landmark\": \"brief description\",\n\
                 \x20     \"aerial_x\": 520,\n\
                 \x20     \"aerial_y\": 780,\n\
                 \x20     \"satellite_x\": 1240,\n\
                 \x20     \"satellite_y\": 860,\n\
                 \x20     \"confidence\": \"high\"\n\
                 \x20   }}\n\
                 \x20 ],\n\
                 \x20 \"overall_confidence\": 0.7,\n\
                 \x20 \"notes\": \"brief note about matching difficulty\"\n\
                 }}\n\n\
                 Rules:\n\
                 - aerial_x/aerial_y: pixel coordinates in IMAGE 1\n\
                 - satellite_x/satellite_y: pixel coordinates in IMAGE 2\n\
                 - confidence per point: \"high\", \"medium\", or \"low\"\n\
                 - overall_confidence: 0.0 to 1.0\n\
                 - Include at least {minimum} matches, ideally {target}\n\
                 - If you cannot find {minimum} confident matches, set \
                 overall_confidence below 0.3 and explain in notes"
            )),
        ];

        MessagesRequest::user(self.params.model.clone(), self.params.max_tokens, content)
    }
}

impl<C: VisionClient> CorrespondenceMatcher for VisionMatcher<C> {
    fn find_matches(
        &self,
        source: &RgbImage,
        reference: &GeoRaster,
    ) -> Result<MatchOutcome, MatchError> {
        if source.width == 0 || source.height == 0 {
            return Err(MatchError::InvalidSource("empty raster".into()));
        }

        let (aerial, source_ratio) = shrink_rgb_to_max_dim(source, self.params.max_dim);
        let (ref_img, reference_ratio) =
            shrink_rgb_to_max_dim(&reference.pixels, self.params.max_dim);
        info!(
            "vision payloads: aerial {}x{} (ratio {source_ratio:.2}), reference {}x{} \
             (ratio {reference_ratio:.2})",
            aerial.width, aerial.height, ref_img.width, ref_img.height
        );

        let t = reference.transform;
        let east = t.origin_lon + ref_img.width as f64 * reference_ratio * t.px_size_lon;
        let south = t.origin_lat + ref_img.height as f64 * reference_ratio * t.px_size_lat;

        let aerial_b64 = self
            .encode_payload(&aerial)
            .map_err(|e| MatchError::Service(e.to_string()))?;
        let ref_b64 = self
            .encode_payload(&ref_img)
            .map_err(|e| MatchError::Service(e.to_string()))?;

        let request = self.build_request(
            aerial_b64,
            ref_b64,
            (aerial.width, aerial.height),
            (ref_img.width, ref_img.height),
            (t.origin_lon, east, south, t.origin_lat),
        );

        let text = self
            .client
            .complete(&request)
            .map_err(|e| MatchError::Service(e.to_string()))?;

        let report = match parse_response(&text) {
            Ok(r) => r,
            Err(ParseError::NoValidMatches) => {
                return Err(MatchError::InsufficientMatches {
                    found: 0,
                    minimum: self.params.min_matches,
                })
            }
            Err(e) => return Err(MatchError::Service(e.to_string())),
        };
        info!(
            "model returned {} matches, self confidence {:.2}",
            report.matches.len(),
            report.overall_confidence
        );
        if !report.notes.is_empty() {
            debug!("model notes: {}", report.notes);
        }

        let correspondences: Vec<Correspondence> = report
            .matches
            .iter()
            .filter(|m| m.tier != georef_core::ConfidenceTier::Low)
            .filter(|m| {
                let in_aerial = m.aerial.x >= 0.0
                    && m.aerial.y >= 0.0
                    && m.aerial.x <= aerial.width as f64
                    && m.aerial.y <= aerial.height as f64;
                let in_ref = m.satellite.x >= 0.0
                    && m.satellite.y >= 0.0
                    && m.satellite.x <= ref_img.width as f64
                    && m.satellite.y <= ref_img.height as f64;
                in_aerial && in_ref
            })
            .map(|m| Correspondence {
                src: Point2::new(m.aerial.x as f32, m.aerial.y as f32),
                dst: Point2::new(m.satellite.x as f32, m.satellite.y as f32),
                quality: MatchQuality::Tier(m.tier),
            })
            .collect();

        if correspondences.len() < self.params.min_matches {
            return Err(MatchError::InsufficientMatches {
                found: correspondences.len(),
                minimum: self.params.min_matches,
            });
        }

        Ok(MatchOutcome {
            total_candidates: report.matches.len(),
            correspondences,
            source_ratio,
            reference_ratio,
            self_confidence: Some(report.overall_confidence.clamp(0.0, 1.0)),
        })
    }
}
