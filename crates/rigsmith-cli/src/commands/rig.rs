//! Rigging pipeline command

use super::{read_image, Context};
use anyhow::Result;
use rigsmith_gen::{ExportedDocument, GenerationProvider, RiggingSession};
use std::sync::Arc;

pub fn run(ctx: &Context, image_path: &str, regenerate: u32) -> Result<()> {
    let source = read_image(image_path)?;
    let provider: Arc<dyn GenerationProvider> = Arc::from(ctx.provider()?);

    println!("Rigging {} with provider '{}'", image_path, provider.name());
    let mut session = RiggingSession::new(provider, &ctx.output_dir)
        .with_tolerances(ctx.config.keying.clone())
        .with_observer(|step, status| println!("  [{}] {}", step, status));

    session.extract(&source)?;
    if let Some(master) = session.master() {
        let (w, h) = master.image.dimensions();
        println!();
        println!("Master: {}x{}", w, h);
        println!("  Description: {}", master.description);
        println!("  Face box: {}", master.analysis.face_box);
        println!("  Rigging notes: {}", master.analysis.recommendations);
        println!();
    }

    let exported = session.generate_parts()?;
    print_export(&exported);

    for i in 0..regenerate {
        println!();
        println!("Regenerating parts ({}/{})", i + 1, regenerate);
        let exported = session.generate_parts()?;
        print_export(&exported);
    }
    Ok(())
}

fn print_export(exported: &ExportedDocument) {
    println!("Exported: {}", exported.path.display());
    println!("  Hash: {}", exported.content_hash.to_prefixed_hex());
    for warning in &exported.warnings {
        println!("  Warning: {}", warning);
    }
}
