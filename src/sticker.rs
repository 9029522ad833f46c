//! Prompt-to-sticker workflow.
//!
//! Asks an image model for an illustration on a flat chroma-key green
//! backdrop, then keys the backdrop out with a [`ChromaKeyPipeline`] and
//! writes a transparent PNG.

use crate::chroma::{ChromaKeyPipeline, StageReport};
use crate::error::Result;
use crate::image::{
    AspectRatio, GenerationMetadata, GenerationRequest, ImageProvider, ImageProviderExt,
    ImageSize, InputImage,
};
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Default number of retries around the generation call.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Builds the generation prompt for a sticker of `subject`.
///
/// The chroma-key stages rely on what this prompt asks for: a pure
/// `#00FF00` backdrop and a thin white outline between subject and backdrop.
pub fn sticker_prompt(subject: &str) -> String {
    format!(
        "Create a sticker illustration of: {subject}

CRITICAL CHROMAKEY REQUIREMENTS:
1. BACKGROUND: Solid, flat, uniform chromakey green color. Use EXACTLY hex color #00FF00 (RGB 0, 255, 0).
   The entire background must be this single pure green color with NO variation, NO gradients, NO shadows, NO lighting effects.

2. WHITE OUTLINE: The subject MUST have a clean white outline/border (2-3 pixels wide) separating it from the green background.
   This white border prevents color bleeding between the subject and background.

3. NO GREEN ON SUBJECT: The subject itself should NOT contain any green colors to avoid confusion with the chromakey.
   If the subject needs green (like leaves), use a distinctly different shade like dark forest green or teal.

4. SHARP EDGES: The subject should have crisp, sharp, well-defined edges - no soft or blurry boundaries.

5. CENTERED: Subject should be centered with padding around all sides.

6. STYLE: Vibrant, clean, cartoon/illustration sticker style with bold colors.

This is for chromakey extraction - the green background will be removed programmatically."
    )
}

/// Returns the debug path for the unkeyed image: `cat.png` -> `cat_raw.png`.
pub fn raw_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sticker".to_string());
    output.with_file_name(format!("{stem}_raw.png"))
}

/// A sticker to generate.
#[derive(Debug, Clone)]
pub struct StickerRequest {
    /// What the sticker shows, e.g. "a cute happy cat with big eyes".
    pub subject: String,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Output resolution tier.
    pub image_size: ImageSize,
    /// Reference images passed to the model.
    pub input_images: Vec<InputImage>,
    /// Also write the unkeyed image next to the output.
    pub save_raw: bool,
    /// Seed forwarded to the model for repeatable output.
    pub seed: Option<u64>,
}

impl StickerRequest {
    /// Creates a square 2K request for `subject`.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            aspect_ratio: AspectRatio::default(),
            image_size: ImageSize::default(),
            input_images: Vec::new(),
            save_raw: false,
            seed: None,
        }
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the resolution tier.
    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = size;
        self
    }

    /// Adds a reference image.
    pub fn with_input_image(mut self, image: InputImage) -> Self {
        self.input_images.push(image);
        self
    }

    /// Writes the raw image as well.
    pub fn with_save_raw(mut self, save_raw: bool) -> Self {
        self.save_raw = save_raw;
        self
    }

    /// Sets the generation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Converts to a provider request with the chroma-key prompt.
    pub fn to_generation_request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(sticker_prompt(&self.subject))
            .with_aspect_ratio(self.aspect_ratio)
            .with_image_size(self.image_size);
        request.input_images = self.input_images.clone();
        request.seed = self.seed;
        request
    }
}

/// A finished sticker.
#[derive(Debug, Clone)]
pub struct Sticker {
    /// The keyed RGBA raster that was written.
    pub image: RgbaImage,
    /// Where the sticker was written.
    pub output: PathBuf,
    /// Where the raw image was written, if requested.
    pub raw_output: Option<PathBuf>,
    /// Per-stage chroma-key reports.
    pub reports: Vec<StageReport>,
    /// Provider metadata.
    pub metadata: GenerationMetadata,
}

/// Generates stickers with a provider and a chroma-key pipeline.
#[derive(Debug)]
pub struct StickerMaker<P> {
    provider: P,
    pipeline: ChromaKeyPipeline,
    max_retries: u32,
}

impl<P: ImageProvider> StickerMaker<P> {
    /// Creates a maker with the default pipeline.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            pipeline: ChromaKeyPipeline::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Replaces the chroma-key pipeline.
    pub fn with_pipeline(mut self, pipeline: ChromaKeyPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Sets how many times a transient generation failure is retried.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the pipeline in use.
    pub fn pipeline(&self) -> &ChromaKeyPipeline {
        &self.pipeline
    }

    /// Generates, keys and writes one sticker to `output` as PNG.
    pub async fn create(
        &self,
        request: &StickerRequest,
        output: impl AsRef<Path>,
    ) -> Result<Sticker> {
        let output = output.as_ref();
        tracing::info!(
            subject = %request.subject,
            aspect_ratio = %request.aspect_ratio,
            image_size = %request.image_size,
            provider = self.provider.name(),
            "generating sticker"
        );

        let generated = self
            .provider
            .generate_with_retries(&request.to_generation_request(), self.max_retries)
            .await?;
        let raw = generated.decode()?;
        tracing::debug!(
            width = raw.width(),
            height = raw.height(),
            mime_type = generated.format.mime_type(),
            "decoded generated image"
        );

        let raw_output = if request.save_raw {
            let path = raw_path_for(output);
            raw.save_with_format(&path, image::ImageFormat::Png)?;
            tracing::info!(path = %path.display(), "saved raw image");
            Some(path)
        } else {
            None
        };

        let keyed = self.pipeline.run(&raw)?;
        keyed.save_png(output)?;
        tracing::info!(path = %output.display(), "saved sticker");

        Ok(Sticker {
            image: keyed.image,
            output: output.to_path_buf(),
            raw_output,
            reports: keyed.reports,
            metadata: generated.metadata,
        })
    }
}
