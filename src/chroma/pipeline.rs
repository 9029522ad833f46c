//! Ordered chroma-key stage list.

use crate::chroma::composite::{self, DEFAULT_ALPHA_THRESHOLD};
use crate::chroma::hsv::rgb_to_hsv;
use crate::chroma::morphology;
use crate::chroma::segment::{RangeKey, RatioKey};
use crate::error::Result;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One step of the chroma-key pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    /// Mask pixels by hue/saturation/value range and clear their alpha.
    RangeKey(RangeKey),
    /// Mask pixels by green dominance and clear their alpha.
    RatioKey(RatioKey),
    /// Snap alpha to 0 or 255.
    EdgeCleanup {
        /// Alpha values below this become transparent.
        #[serde(default = "default_threshold")]
        threshold: u8,
    },
}

fn default_threshold() -> u8 {
    DEFAULT_ALPHA_THRESHOLD
}

impl Stage {
    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RangeKey(_) => "range_key",
            Self::RatioKey(_) => "ratio_key",
            Self::EdgeCleanup { .. } => "edge_cleanup",
        }
    }

    /// Applies this stage, returning the new raster and the number of
    /// pixels the stage masked (zero for edge cleanup).
    fn apply(&self, image: &RgbaImage) -> Result<(RgbaImage, usize)> {
        match self {
            Self::RangeKey(key) => {
                let mask = key.mask(&rgb_to_hsv(image));
                let out = composite::apply_mask(image, &mask)?;
                Ok((out, morphology::count(&mask)))
            }
            Self::RatioKey(key) => {
                let mask = key.mask(image);
                let out = composite::apply_mask(image, &mask)?;
                Ok((out, morphology::count(&mask)))
            }
            Self::EdgeCleanup { threshold } => Ok((composite::binarize_alpha(image, *threshold), 0)),
        }
    }
}

/// Per-stage outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// Stage name.
    pub stage: &'static str,
    /// Pixels the stage's mask covered.
    pub masked_pixels: usize,
    /// Fully transparent fraction of the raster after the stage.
    pub transparent_fraction: f64,
}

/// Output of [`ChromaKeyPipeline::run`].
#[derive(Debug, Clone)]
#[must_use = "keyed image should be saved or processed"]
pub struct KeyedImage {
    /// The keyed raster.
    pub image: RgbaImage,
    /// One report per stage, in run order.
    pub reports: Vec<StageReport>,
}

impl KeyedImage {
    /// Saves the keyed raster as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Chroma-key stages run in order over a raster.
///
/// The default order is range key, ratio key, edge cleanup. The hue test
/// runs first because it discriminates greenish grays; the ratio test then
/// sees only what the hue test left opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromaKeyPipeline {
    stages: Vec<Stage>,
}

impl Default for ChromaKeyPipeline {
    fn default() -> Self {
        Self {
            stages: vec![
                Stage::RangeKey(RangeKey::default()),
                Stage::RatioKey(RatioKey::default()),
                Stage::EdgeCleanup {
                    threshold: DEFAULT_ALPHA_THRESHOLD,
                },
            ],
        }
    }
}

impl ChromaKeyPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Stages in run order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Mutable access to the stages, for overriding single thresholds.
    pub fn stages_mut(&mut self) -> &mut Vec<Stage> {
        &mut self.stages
    }

    /// Loads a pipeline from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Runs every stage over `image`. The input is not modified.
    pub fn run(&self, image: &RgbaImage) -> Result<KeyedImage> {
        let mut current = image.clone();
        let mut reports = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let (next, masked_pixels) = stage.apply(&current)?;
            let transparent_fraction = composite::transparent_fraction(&next);
            tracing::debug!(
                stage = stage.name(),
                masked_pixels,
                transparent_fraction,
                "chroma-key stage complete"
            );
            reports.push(StageReport {
                stage: stage.name(),
                masked_pixels,
                transparent_fraction,
            });
            current = next;
        }

        Ok(KeyedImage {
            image: current,
            reports,
        })
    }

    /// Converts `image` to RGBA and runs the pipeline.
    pub fn run_dynamic(&self, image: &DynamicImage) -> Result<KeyedImage> {
        self.run(&image.to_rgba8())
    }
}
