//! Chroma-key background removal.
//!
//! Converts a raster to HSV, classifies green-screen pixels with two
//! complementary keys, clears their alpha, and hardens the remaining edges.
//! Every stage takes a raster by reference and returns a new one.

pub mod composite;
pub mod hsv;
pub mod morphology;
mod pipeline;
pub mod segment;

pub use composite::{apply_mask, binarize_alpha, DEFAULT_ALPHA_THRESHOLD};
pub use hsv::{hsv_to_rgb, hue_distance, rgb_to_hsv, HsvImage};
pub use morphology::{Connectivity, Mask};
pub use pipeline::{ChromaKeyPipeline, KeyedImage, Stage, StageReport};
pub use segment::{RangeKey, RatioKey};
