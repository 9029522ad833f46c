//! Keys out the green screen of an image on disk, no API call involved.
//!
//! Run with: `cargo run --example key_local_image -- <input.png> [output.png]`

use stickerviz::chroma::{Connectivity, RangeKey, RatioKey, Stage};
use stickerviz::ChromaKeyPipeline;

fn main() -> stickerviz::Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .expect("Usage: key_local_image <input.png> [output.png]");
    let output = args.next().unwrap_or_else(|| "keyed.png".to_string());

    // Same order as the default pipeline, with an 8-connected cleanup.
    let pipeline = ChromaKeyPipeline::new()
        .with_stage(Stage::RangeKey(
            RangeKey::default().with_connectivity(Connectivity::Eight),
        ))
        .with_stage(Stage::RatioKey(RatioKey::default()))
        .with_stage(Stage::EdgeCleanup { threshold: 128 });

    let raster = image::open(&input)?.to_rgba8();
    let keyed = pipeline.run(&raster)?;
    keyed.save_png(&output)?;

    println!(
        "Keyed {} -> {} ({}x{})",
        input,
        output,
        keyed.image.width(),
        keyed.image.height()
    );
    Ok(())
}
