//! Character reference sheet command

use super::Context;
use anyhow::Result;
use rigsmith_core::encode_png;
use rigsmith_gen::prompt::character_sheet_prompt;
use rigsmith_gen::{write_timestamped, AspectRatio};

pub fn run(ctx: &Context, prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("A character description is required");
    }
    let provider = ctx.provider()?;

    println!("Generating character sheet with provider '{}'...", provider.name());
    let image = provider.generate_image(&character_sheet_prompt(prompt), AspectRatio::Portrait3x4)?;
    let bytes = encode_png(&image)?;
    let path = write_timestamped(&bytes, &ctx.output_dir, "character", "png")?;

    println!("Generated: {}", path.display());
    println!("  Size: {}x{}", image.width(), image.height());
    Ok(())
}
