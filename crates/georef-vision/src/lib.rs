//! Landmark matching through a vision-capable language model.
//!
//! Sends the aerial photograph and the reference mosaic, each with a labeled
//! pixel-grid overlay, to the Anthropic Messages API and asks for landmarks
//! visible in both. Persistent features such as river bends and road
//! intersections survive decades of landscape change that defeat descriptor
//! matching, so this strategy complements the classical one rather than
//! replacing it.

mod client;
mod matcher;
mod overlay;
mod params;
mod parse;

pub use client::{AnthropicClient, ContentBlock, MessagesRequest, VisionClient, VisionError};
pub use matcher::VisionMatcher;
pub use overlay::{draw_grid_overlay, shrink_rgb_to_max_dim};
pub use params::VisionParams;
pub use parse::{parse_response, LandmarkMatch, ParseError, VisionReport};
