//! Print the rectangles of a computed layout.

use lessoncast_layout::{compute_layout, validate_layout};
use lessoncast_model::layout::{CanvasConfig, LayoutType, PipPosition};

pub fn run(
    layout_type: LayoutType,
    width: u32,
    height: u32,
    pip_position: Option<PipPosition>,
    json: bool,
) -> anyhow::Result<()> {
    let canvas = CanvasConfig::new(width, height);
    let layout = compute_layout(layout_type, canvas, pip_position);

    if json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    let sources = if layout_type.is_composite() {
        "screen and camera"
    } else {
        "one source"
    };
    println!("{layout_type} on {width}x{height} ({sources})");
    for (kind, source) in layout.sources.iter() {
        print!(
            "  {:<7} x={:>8.1} y={:>8.1} w={:>8.1} h={:>8.1} z={}",
            kind.as_str(),
            source.x,
            source.y,
            source.width,
            source.height,
            source.z_index
        );
        if let Some(radius) = source.border_radius {
            print!(" radius={radius:.1}");
        }
        println!();
    }

    let result = validate_layout(&layout);
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    if !result.is_valid {
        anyhow::bail!("layout is invalid: {}", result.errors.join("; "));
    }
    Ok(())
}
