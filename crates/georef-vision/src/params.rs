use serde::{Deserialize, Serialize};

/// Vision-model matcher configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisionParams {
    /// Longest image side above which payloads are downsampled.
    pub max_dim: usize,
    /// Grid overlay line spacing, in pixels.
    pub grid_spacing: usize,
    /// Minimum surviving matches for a usable result.
    pub min_matches: usize,
    /// Match count requested in the prompt.
    pub target_matches: usize,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// JPEG quality for the image payloads.
    pub jpeg_quality: u8,
    /// API key; falls back to `ANTHROPIC_API_KEY` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            max_dim: 2000,
            grid_spacing: 200,
            min_matches: 5,
            target_matches: 12,
            model: "claude-sonnet-4-20250514".to_owned(),
            max_tokens: 4096,
            timeout_secs: 120,
            jpeg_quality: 85,
            api_key: None,
        }
    }
}

impl VisionParams {
    /// Configured key, or the `ANTHROPIC_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}
