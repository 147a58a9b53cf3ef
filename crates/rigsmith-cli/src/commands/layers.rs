//! Batch layer generation command

use super::{load_catalog, read_image, Context};
use anyhow::Result;
use rigsmith_catalog::{LayerDefinition, LayerId};
use rigsmith_gen::{export_catalog_document, run_batch, LayerStore};

pub struct LayersArgs {
    pub style: Option<String>,
    pub from_image: Option<String>,
    pub layers: Vec<String>,
    pub all: bool,
    pub catalog: Option<String>,
}

pub fn run(ctx: &Context, args: LayersArgs) -> Result<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let provider = ctx.provider()?;

    let definitions: Vec<&LayerDefinition> = if args.all {
        catalog.definitions().iter().collect()
    } else if !args.layers.is_empty() {
        let mut selected = Vec::new();
        for id in &args.layers {
            match catalog.get(&LayerId::new(id.as_str())) {
                Some(def) => selected.push(def),
                None => anyhow::bail!("Unknown layer '{}'. Run `rigsmith catalog` to list ids", id),
            }
        }
        selected
    } else {
        catalog.required()
    };

    let style = match (&args.style, &args.from_image) {
        (Some(style), _) => style.clone(),
        (None, Some(path)) => {
            let reference = read_image(path)?;
            println!("Analyzing style of {}...", path);
            let description = provider.describe(&reference)?;
            println!("  Style: {}", description);
            description
        }
        (None, None) => anyhow::bail!("Either --style or --from-image is required"),
    };

    println!(
        "Generating {} layers with provider '{}'",
        definitions.len(),
        provider.name()
    );

    let mut store = LayerStore::new();
    let report = run_batch(provider.as_ref(), &definitions, &style, &mut store, |progress| {
        println!("  [{}/{}] {}", progress.current, progress.total, progress.id);
    })?;

    println!();
    println!("Batch: {}", report.summary());
    for error in &report.errors {
        println!("  FAILED {} ({}): {}", error.label, error.id, error.message);
    }

    let exported = export_catalog_document(
        &catalog,
        &store,
        ctx.config.generation.batch_canvas,
        &ctx.output_dir,
    )?;
    println!("Exported: {}", exported.path.display());
    println!("  Hash: {}", exported.content_hash.to_prefixed_hex());

    report.ensure_complete()?;
    Ok(())
}
