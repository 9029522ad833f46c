//! Sticker generation example.
//!
//! Run with: `cargo run --example generate_sticker -- "a cute happy cat with big eyes"`
//!
//! Requires `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) environment variable.

use stickerviz::{GeminiProvider, StickerMaker, StickerRequest};

#[tokio::main]
async fn main() -> stickerviz::Result<()> {
    let subject = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a cute happy cat with big eyes".to_string());

    let provider = GeminiProvider::builder().build()?;
    let maker = StickerMaker::new(provider);

    let request = StickerRequest::new(subject).with_save_raw(true);
    let sticker = maker.create(&request, "cat.png").await?;

    println!("Sticker saved to {}", sticker.output.display());
    if let Some(raw) = &sticker.raw_output {
        println!("Raw image saved to {}", raw.display());
    }
    for report in &sticker.reports {
        println!(
            "  {:<12} masked {:>8} px, {:.1}% transparent",
            report.stage,
            report.masked_pixels,
            report.transparent_fraction * 100.0
        );
    }

    Ok(())
}
