//! Validate a layout JSON file.

use std::path::PathBuf;

use lessoncast_layout::validate_layout;
use lessoncast_model::layout::CompositorLayout;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating layout at: {}", path.display());

    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let layout: CompositorLayout =
        serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Failed to parse layout: {e}"))?;

    println!("  Type: {}", layout.layout_type);
    println!("  Canvas: {}x{}", layout.canvas.width, layout.canvas.height);
    println!("  Sources: {}", layout.sources.len());

    let result = validate_layout(&layout);
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    if result.is_valid {
        println!("\nLayout is valid.");
        Ok(())
    } else {
        println!("\nValidation errors:");
        for error in &result.errors {
            println!("  - {error}");
        }
        anyhow::bail!("{} error(s) found", result.errors.len())
    }
}
