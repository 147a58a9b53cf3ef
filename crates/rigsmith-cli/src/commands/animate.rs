//! Image-to-video command

use super::{read_image, Context};
use anyhow::Result;
use rigsmith_gen::prompt::DEFAULT_ANIMATION_PROMPT;
use rigsmith_gen::write_timestamped;

pub fn run(ctx: &Context, image_path: &str, prompt: Option<&str>) -> Result<()> {
    let still = read_image(image_path)?;
    let prompt = prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_ANIMATION_PROMPT);
    let provider = ctx.provider()?;

    println!("Animating {} with provider '{}'...", image_path, provider.name());
    println!("  Prompt: {}", prompt);
    let video = provider.generate_video(prompt, &still)?;
    let path = write_timestamped(&video, &ctx.output_dir, "avatar-animation", "mp4")?;

    println!("Generated: {} ({} bytes)", path.display(), video.len());
    Ok(())
}
