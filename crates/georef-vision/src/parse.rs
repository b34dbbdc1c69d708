use georef_core::ConfidenceTier;
use log::debug;
use nalgebra::Point2;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no valid landmark matches in response; the images may not overlap")]
    NoValidMatches,
}

/// One landmark reported by the model, in payload pixel coordinates.
#[derive(Clone, Debug)]
pub struct LandmarkMatch {
    pub landmark: String,
    pub aerial: Point2<f64>,
    pub satellite: Point2<f64>,
    pub tier: ConfidenceTier,
}

#[derive(Clone, Debug)]
pub struct VisionReport {
    pub matches: Vec<LandmarkMatch>,
    /// Model's self-assessed confidence in [0, 1].
    pub overall_confidence: f64,
    pub notes: String,
}

/// Parse the model's JSON reply.
///
/// Tolerates markdown code fences, trailing commas, and `~`/`≈`/
/// "approximately" prefixes on numbers. Malformed match entries are skipped;
/// an entirely empty valid set is an error.
pub fn parse_response(raw: &str) -> Result<VisionReport, ParseError> {
    let text = strip_trailing_commas(strip_code_fences(raw.trim()));
    let data: Value = serde_json::from_str(&text)?;

    let mut matches = Vec::new();
    if let Some(entries) = data.get("matches").and_then(Value::as_array) {
        for entry in entries {
            match parse_match(entry) {
                Some(m) => matches.push(m),
                None => debug!("skipping malformed match entry: {entry}"),
            }
        }
    }
    if matches.is_empty() {
        return Err(ParseError::NoValidMatches);
    }

    Ok(VisionReport {
        matches,
        overall_confidence: data
            .get("overall_confidence")
            .and_then(numeric)
            .unwrap_or(0.5),
        notes: data
            .get("notes")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
    })
}

fn parse_match(entry: &Value) -> Option<LandmarkMatch> {
    let ax = numeric(entry.get("aerial_x")?)?;
    let ay = numeric(entry.get("aerial_y")?)?;
    let sx = numeric(entry.get("satellite_x")?)?;
    let sy = numeric(entry.get("satellite_y")?)?;
    let tier = match entry.get("confidence").and_then(Value::as_str) {
        Some("high") => ConfidenceTier::High,
        Some("low") => ConfidenceTier::Low,
        _ => ConfidenceTier::Medium,
    };
    Some(LandmarkMatch {
        landmark: entry
            .get("landmark")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_owned(),
        aerial: Point2::new(ax, ay),
        satellite: Point2::new(sx, sy),
        tier,
    })
}

/// Number, or a string like "~520", "≈520", "approximately 520".
fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(raw) => {
            let mut s = raw.trim().trim_start_matches(['~', '≈']).trim();
            if let Some(rest) = s.strip_prefix("approximately") {
                s = rest.trim();
            }
            s.parse().ok()
        }
        _ => None,
    }
}

fn strip_code_fences(text: &str) -> &str {
    let mut t = text;
    if let Some(rest) = t.strip_prefix("```") {
        t = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest,
        };
    }
    t.trim_end().strip_suffix("```").unwrap_or(t).trim()
}

/// Remove commas directly preceding `]` or `}` (modulo whitespace), outside
/// of string literals.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = text[i + 1..].chars().find(|n| !n.is_whitespace());
                if !matches!(next, Some(']' | '}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
