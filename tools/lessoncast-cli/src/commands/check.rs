//! Check configuration and host capabilities.

use lessoncast_compositor::synthetic::TestPattern;
use lessoncast_compositor::{Compositor, MediaStream, MemoryProbe, ProcMemoryProbe, TickOutcome};
use lessoncast_model::config::{config_file_path, StudioConfig};
use lessoncast_model::layout::{LayoutType, SourceKind};

pub async fn run(studio: &StudioConfig) -> anyhow::Result<()> {
    println!("Lessoncast System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config file: {}", path.display());
    } else {
        println!("[OK] Config file: none at {} (using defaults)", path.display());
    }

    let config = &studio.compositor;
    let mut ready = true;
    match config.validate() {
        Ok(()) => println!(
            "[OK] Compositor config: {}x{} @ {} fps, audio {}, transitions {}",
            config.width,
            config.height,
            config.frame_rate,
            if config.enable_audio { "on" } else { "off" },
            if config.enable_transitions { "on" } else { "off" },
        ),
        Err(e) => {
            ready = false;
            println!("[FAIL] Compositor config: {e}");
        }
    }

    println!("[OK] Log level: {}", studio.logging.level);

    match ProcMemoryProbe.resident_bytes() {
        Some(bytes) => println!(
            "[OK] Memory probe: {:.1} MiB resident",
            bytes as f64 / (1024.0 * 1024.0)
        ),
        None => println!("[WARN] Memory probe: unavailable, memory usage will not be reported"),
    }

    if ready {
        match smoke_render(studio).await {
            Ok(()) => println!("[OK] Smoke render: one frame composited"),
            Err(e) => {
                ready = false;
                println!("[FAIL] Smoke render: {e}");
            }
        }
    }

    println!();
    if ready {
        println!("Lessoncast is ready.");
    } else {
        println!("Fix the problems above before recording.");
    }
    Ok(())
}

/// Composite a single frame from a test pattern.
async fn smoke_render(studio: &StudioConfig) -> anyhow::Result<()> {
    let config = studio.compositor.clone();
    let mut compositor = Compositor::new();
    compositor.initialize(config.clone())?;
    compositor.add_source(
        "screen",
        SourceKind::Screen,
        MediaStream::new("Test pattern").with_video(TestPattern::new(config.width, config.height)),
    )?;
    compositor.set_layout(LayoutType::ScreenOnly, None)?;
    compositor.start()?;
    let mut output = compositor
        .take_output_stream()
        .ok_or_else(|| anyhow::anyhow!("no output stream"))?;

    let outcome = compositor.tick(0);
    compositor.stop()?;
    compositor.dispose().await?;

    if outcome != TickOutcome::Rendered {
        anyhow::bail!("first tick returned {outcome:?}");
    }
    let frame = output
        .video
        .recv()
        .await
        .ok_or_else(|| anyhow::anyhow!("no frame reached the output"))?;
    anyhow::ensure!(
        frame.width == config.width && frame.height == config.height,
        "frame is {}x{}, expected {}x{}",
        frame.width,
        frame.height,
        config.width,
        config.height
    );
    Ok(())
}
