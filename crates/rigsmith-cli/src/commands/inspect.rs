//! PSD inspection command

use anyhow::{Context, Result};
use rigsmith_compose::psd;
use std::path::Path;

pub fn run(path: &str) -> Result<()> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {}", path);
    }
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
    let document = psd::decode(&bytes).with_context(|| format!("Failed to decode {}", path))?;

    println!("Document: {}", path);
    println!("  Canvas: {}x{}", document.width(), document.height());
    println!("  Layers: {} (bottom to top)", document.len());
    println!();

    for (i, layer) in document.layers().iter().enumerate() {
        let mut flags = Vec::new();
        if layer.hidden {
            flags.push("hidden".to_string());
        }
        if layer.opacity < 1.0 {
            flags.push(format!("opacity {:.0}%", layer.opacity * 100.0));
        }

        print!(
            "  {:>2}. {} @ ({}, {}) {}x{}",
            i + 1,
            layer.name,
            layer.left,
            layer.top,
            layer.image.width(),
            layer.image.height()
        );
        if !flags.is_empty() {
            print!(" [{}]", flags.join(", "));
        }
        println!();
    }
    Ok(())
}
