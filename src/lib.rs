#![warn(missing_docs)]
//! StickerViz - AI-generated stickers with transparent backgrounds.
//!
//! Generates an illustration on a flat chroma-key green backdrop with an
//! image model, then removes the backdrop with an HSV chroma-key pipeline.
//!
//! # Quick Start
//!
//! ```no_run
//! use stickerviz::{GeminiProvider, StickerMaker, StickerRequest};
//!
//! #[tokio::main]
//! async fn main() -> stickerviz::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let maker = StickerMaker::new(provider);
//!     let request = StickerRequest::new("a cute happy cat with big eyes").with_save_raw(true);
//!     let sticker = maker.create(&request, "cat.png").await?;
//!     println!("wrote {}", sticker.output.display());
//!     Ok(())
//! }
//! ```
//!
//! # Keying a local image
//!
//! ```no_run
//! use stickerviz::ChromaKeyPipeline;
//!
//! # fn main() -> stickerviz::Result<()> {
//! let raster = image::open("green_screen.png")?.to_rgba8();
//! let keyed = ChromaKeyPipeline::default().run(&raster)?;
//! keyed.save_png("sticker.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `gemini-image`: Gemini (Google) image provider
//! - `cli`: Command-line interface

pub mod chroma;
mod error;
pub mod image;
pub mod sticker;

// Re-export error types at crate root
pub use error::{Result, StickerError};

pub use crate::chroma::{ChromaKeyPipeline, Connectivity, KeyedImage, RangeKey, RatioKey, Stage};

pub use crate::image::{
    AspectRatio, GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProvider,
    ImageProviderExt, ImageProviderKind, ImageSize, InputImage,
};

#[cfg(feature = "gemini-image")]
pub use crate::image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

pub use sticker::{Sticker, StickerMaker, StickerRequest};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::chroma::{ChromaKeyPipeline, RangeKey, RatioKey, Stage};
    pub use crate::error::{Result, StickerError};
    pub use crate::image::{GeneratedImage, GenerationRequest, ImageProvider, ImageProviderExt};
    pub use crate::sticker::{StickerMaker, StickerRequest};

    #[cfg(feature = "gemini-image")]
    pub use crate::image::providers::GeminiProvider;
}
