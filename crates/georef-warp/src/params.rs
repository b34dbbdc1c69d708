use serde::{Deserialize, Serialize};

/// Output raster sizing and fill configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ResampleParams {
    /// Lower clamp on each output dimension, in pixels.
    pub min_dim: usize,
    /// Upper clamp on each output dimension, in pixels.
    pub max_dim: usize,
    /// Fill color for output pixels that map outside the source.
    pub background: [u8; 3],
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            min_dim: 100,
            max_dim: 8000,
            background: [0, 0, 0],
        }
    }
}
