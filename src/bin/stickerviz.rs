//! CLI for StickerViz - transparent stickers from AI image models.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use stickerviz::chroma::{ChromaKeyPipeline, Connectivity, Stage};
use stickerviz::image::{AspectRatio, ImageProvider, ImageSize, InputImage};
use stickerviz::sticker::{StickerMaker, StickerRequest};
use stickerviz::{GeminiModel, GeminiProvider};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stickerviz")]
#[command(about = "Generate transparent sticker PNGs with Gemini and chroma-key removal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (-v: info, -vv: debug, -vvv: trace). RUST_LOG wins.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sticker from a text prompt
    Sticker(StickerArgs),

    /// Remove the green screen from an existing image (no network)
    Key(KeyArgs),

    /// Print the default chroma-key pipeline as JSON
    Config,
}

#[derive(Args)]
struct StickerArgs {
    /// What the sticker should show
    subject: String,

    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,

    /// Aspect ratio (1:1, 2:3, 3:2, 3:4, 4:3, 4:5, 5:4, 9:16, 16:9, 21:9)
    #[arg(long, default_value = "1:1")]
    aspect_ratio: AspectRatio,

    /// Resolution tier (1K, 2K, 4K)
    #[arg(long, default_value = "2K")]
    size: ImageSize,

    /// Reference image(s) to send with the prompt
    #[arg(short, long)]
    input: Vec<PathBuf>,

    /// Also save the unkeyed image as <output>_raw.png
    #[arg(long)]
    raw: bool,

    /// Gemini model
    #[arg(long, value_enum, default_value = "pro")]
    model: ModelArg,

    /// Seed for repeatable generation
    #[arg(long)]
    seed: Option<u64>,

    /// Retries on transient API failures
    #[arg(long, default_value_t = stickerviz::sticker::DEFAULT_MAX_RETRIES)]
    retries: u32,

    #[command(flatten)]
    key: KeyOptions,
}

#[derive(Args)]
struct KeyArgs {
    /// Input image (PNG, JPEG or WebP)
    input: PathBuf,

    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    key: KeyOptions,
}

/// Chroma-key overrides shared by `sticker` and `key`.
#[derive(Args)]
struct KeyOptions {
    /// JSON file describing the full stage list
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target hue in degrees
    #[arg(long)]
    hue_center: Option<f32>,

    /// Hue half-width in degrees
    #[arg(long)]
    hue_range: Option<f32>,

    /// Minimum saturation (0-100)
    #[arg(long)]
    min_saturation: Option<f32>,

    /// Minimum value (0-100)
    #[arg(long)]
    min_value: Option<f32>,

    /// Skip the dilate/erode cleanup of the range key
    #[arg(long)]
    no_cleanup: bool,

    /// Dilation/erosion iterations of the range-key cleanup
    #[arg(long)]
    cleanup_iterations: Option<u32>,

    /// Structuring element for morphology
    #[arg(long, value_enum)]
    connectivity: Option<ConnectivityArg>,

    /// Green-dominance ratio for the second pass
    #[arg(long)]
    green_ratio: Option<f32>,

    /// Dilation iterations for the second pass
    #[arg(long)]
    edge_dilation: Option<u32>,

    /// Alpha threshold for edge cleanup
    #[arg(long)]
    alpha_threshold: Option<u8>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    /// gemini-2.5-flash-image
    Flash,
    /// gemini-3-pro-image-preview
    Pro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => GeminiModel::NanoBanana,
            ModelArg::Pro => GeminiModel::NanoBananaPro,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConnectivityArg {
    Four,
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

impl KeyOptions {
    /// Loads the configured pipeline and applies per-threshold overrides.
    fn pipeline(&self) -> anyhow::Result<ChromaKeyPipeline> {
        let mut pipeline = match &self.config {
            Some(path) => ChromaKeyPipeline::from_json_file(path)
                .with_context(|| format!("failed to load pipeline from {}", path.display()))?,
            None => ChromaKeyPipeline::default(),
        };

        for stage in pipeline.stages_mut() {
            match stage {
                Stage::RangeKey(key) => {
                    if let Some(v) = self.hue_center {
                        key.hue_center = v;
                    }
                    if let Some(v) = self.hue_range {
                        key.hue_range = v;
                    }
                    if let Some(v) = self.min_saturation {
                        key.min_saturation = v;
                    }
                    if let Some(v) = self.min_value {
                        key.min_value = v;
                    }
                    if self.no_cleanup {
                        key.cleanup = false;
                    }
                    if let Some(v) = self.cleanup_iterations {
                        key.cleanup_iterations = v;
                    }
                    if let Some(c) = self.connectivity {
                        key.connectivity = c.into();
                    }
                }
                Stage::RatioKey(key) => {
                    if let Some(v) = self.green_ratio {
                        key.green_ratio = v;
                    }
                    if let Some(v) = self.edge_dilation {
                        key.edge_dilation = v;
                    }
                    if let Some(c) = self.connectivity {
                        key.connectivity = c.into();
                    }
                }
                Stage::EdgeCleanup { threshold } => {
                    if let Some(v) = self.alpha_threshold {
                        *threshold = v;
                    }
                }
            }
        }

        Ok(pipeline)
    }
}

fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Sticker(args) => {
            create_sticker(args, cli.json).await?;
        }
        Commands::Key(args) => {
            key_image(args, cli.json)?;
        }
        Commands::Config => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ChromaKeyPipeline::default())?
            );
        }
    }

    Ok(())
}

async fn create_sticker(args: StickerArgs, json_output: bool) -> anyhow::Result<()> {
    let pipeline = args.key.pipeline()?;

    let mut request = StickerRequest::new(&args.subject)
        .with_aspect_ratio(args.aspect_ratio)
        .with_image_size(args.size)
        .with_save_raw(args.raw);
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }
    for path in &args.input {
        let image = InputImage::from_path(path)
            .with_context(|| format!("failed to read input image {}", path.display()))?;
        request = request.with_input_image(image);
    }

    let provider = GeminiProvider::builder().model(args.model.into()).build()?;
    let provider_name = provider.name().to_string();
    let maker = StickerMaker::new(provider)
        .with_pipeline(pipeline)
        .with_max_retries(args.retries);

    let sticker = maker.create(&request, &args.output).await?;

    if json_output {
        let result = serde_json::json!({
            "type": "sticker",
            "success": true,
            "output": sticker.output.display().to_string(),
            "raw_output": sticker.raw_output.as_ref().map(|p| p.display().to_string()),
            "width": sticker.image.width(),
            "height": sticker.image.height(),
            "provider": provider_name,
            "model": sticker.metadata.model,
            "seed": sticker.metadata.seed,
            "duration_ms": sticker.metadata.duration_ms,
            "stages": sticker.reports,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated sticker: {} ({}x{}) via {}",
            sticker.output.display(),
            sticker.image.width(),
            sticker.image.height(),
            provider_name
        );
        if let Some(raw) = &sticker.raw_output {
            println!("Raw image: {}", raw.display());
        }
        if let Some(duration) = sticker.metadata.duration_ms {
            println!("Generation time: {}ms", duration);
        }
    }

    Ok(())
}

fn key_image(args: KeyArgs, json_output: bool) -> anyhow::Result<()> {
    let pipeline = args.key.pipeline()?;
    let input = image::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;

    let keyed = pipeline.run_dynamic(&input)?;
    keyed.save_png(&args.output)?;

    let transparent = keyed
        .reports
        .last()
        .map(|r| r.transparent_fraction)
        .unwrap_or(0.0);

    if json_output {
        let result = serde_json::json!({
            "type": "key",
            "success": true,
            "input": args.input.display().to_string(),
            "output": args.output.display().to_string(),
            "width": keyed.image.width(),
            "height": keyed.image.height(),
            "stages": keyed.reports,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Keyed image: {} ({}x{}, {:.1}% transparent)",
            args.output.display(),
            keyed.image.width(),
            keyed.image.height(),
            transparent * 100.0
        );
    }

    Ok(())
}
