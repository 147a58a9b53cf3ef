//! Layer catalog listing

use super::load_catalog;
use anyhow::Result;

pub fn run(catalog_path: Option<&str>, required_only: bool) -> Result<()> {
    let catalog = load_catalog(catalog_path)?;
    let definitions = catalog.sorted_by_z();
    let shown: Vec<_> = definitions
        .into_iter()
        .filter(|def| !required_only || def.required)
        .collect();

    println!("{:<24} {:>5}  {:<8}  Label", "Id", "Z", "Required");
    for def in &shown {
        println!(
            "{:<24} {:>5}  {:<8}  {}",
            def.id.as_str(),
            def.z_order,
            if def.required { "yes" } else { "" },
            def.label
        );
    }
    println!();
    println!(
        "{} layers ({} required)",
        shown.len(),
        catalog.required().len()
    );
    Ok(())
}
