//! Rigsmith CLI - Turn character art into rig-ready layered PSDs

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{animate, catalog, character, inspect, layers, rig, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rigsmith")]
#[command(about = "Generate Live2D-ready layered character documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Generation provider to use (gemini, mock)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Output directory (defaults to the configured output_dir)
    #[arg(long, short, global = true)]
    output: Option<String>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the layer catalog
    Catalog {
        /// Only show required layers
        #[arg(long)]
        required: bool,

        /// Path to a catalog TOML file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<String>,
    },

    /// Batch-generate catalog layers in one style and export a PSD
    Layers {
        /// Global style prompt
        #[arg(long, conflicts_with = "from_image", required_unless_present = "from_image")]
        style: Option<String>,

        /// Derive the style prompt from a reference image
        #[arg(long)]
        from_image: Option<String>,

        /// Layer id to generate (repeatable, e.g. Mouth/Mouth_A)
        #[arg(long = "layer")]
        layers: Vec<String>,

        /// Generate every catalog layer instead of only the required ones
        #[arg(long, conflicts_with = "layers")]
        all: bool,

        /// Path to a catalog TOML file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<String>,
    },

    /// Extract a master character from an image and build a five-part rig
    Rig {
        /// Source image (PNG or JPEG)
        image: String,

        /// Regenerate the parts this many extra times after the first export
        #[arg(long, default_value = "0")]
        regenerate: u32,
    },

    /// Generate a character reference sheet as PNG
    Character {
        /// Character description
        #[arg(long, short)]
        prompt: String,
    },

    /// Animate a still character image into an MP4
    Animate {
        /// Still image (PNG or JPEG)
        image: String,

        /// Motion prompt (defaults to a gentle idle loop)
        #[arg(long, short)]
        prompt: Option<String>,
    },

    /// List the layers of a PSD written by rigsmith
    Inspect {
        /// Path to the PSD file
        psd: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    let Cli {
        provider,
        output,
        verbose,
        command,
    } = Cli::parse();
    init_logging(verbose);

    let ctx = || Context::load(provider.as_deref(), output.as_deref());

    match command {
        Commands::Catalog { required, catalog } => catalog::run(catalog.as_deref(), required),
        Commands::Layers {
            style,
            from_image,
            layers,
            all,
            catalog,
        } => layers::run(
            &ctx()?,
            layers::LayersArgs {
                style,
                from_image,
                layers,
                all,
                catalog,
            },
        ),
        Commands::Rig { image, regenerate } => rig::run(&ctx()?, &image, regenerate),
        Commands::Character { prompt } => character::run(&ctx()?, &prompt),
        Commands::Animate { image, prompt } => animate::run(&ctx()?, &image, prompt.as_deref()),
        Commands::Inspect { psd } => inspect::run(&psd),
    }
}
