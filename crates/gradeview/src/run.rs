use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;
use lookconfig::LookConfig;
use renderer::{
    run_preview, Canvas, FixedTimeSource, FrameSequence, FrameSource, GradeState,
    GradingRenderer, PhysicalSize, PreviewOptions, RenderBackend, RendererConfig,
    StillFrameSource,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{LooksArgs, PreviewArgs, RenderArgs};
use crate::looks::{grade_state, load_config, renderer_config};
use crate::source::{load_first_frame, load_frames};

const PREVIEW_BOUNDS: (u32, u32) = (1280, 800);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn render(config_path: Option<&Path>, args: RenderArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let state = grade_state(&config, &args.grade)?;
    let image = load_first_frame(&args.input)?;
    let (width, height) = args.size.unwrap_or(image.dimensions());
    let size = PhysicalSize::new(width, height);
    let renderer_config = RendererConfig {
        initial_size: size,
        ..renderer_config(&config)
    };
    let source: Arc<dyn FrameSource> = Arc::new(StillFrameSource::new(image));

    let graded = if args.software {
        tracing::info!("rendering on the CPU (--software)");
        let renderer = GradingRenderer::software(renderer_config);
        grade_still(renderer, &source, &state, args.time)?
    } else {
        match GradingRenderer::initialize(Canvas::Offscreen(size), renderer_config.clone()) {
            Ok(renderer) => grade_still(renderer, &source, &state, args.time)?,
            Err(err) => {
                tracing::warn!(error = %err, "GPU renderer unavailable; falling back to software");
                let renderer = GradingRenderer::software(renderer_config);
                grade_still(renderer, &source, &state, args.time)?
            }
        }
    };

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    graded
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(
        output = %args.output.display(),
        width = graded.width(),
        height = graded.height(),
        "wrote graded frame"
    );
    Ok(())
}

fn grade_still<B: RenderBackend>(
    renderer: GradingRenderer<B>,
    source: &Arc<dyn FrameSource>,
    state: &GradeState,
    time: f32,
) -> Result<RgbaImage> {
    let mut renderer = renderer.with_time_source(Box::new(FixedTimeSource::new(time)));
    renderer.set_video_source(source);
    renderer.update_color_settings(&state.color);
    renderer.update_effects(&state.effects);
    renderer.set_split_position(state.split);
    let backend = renderer.backend().label();
    let captured = renderer
        .capture_frame()
        .with_context(|| format!("failed to render with the {backend} backend"))?;
    renderer.dispose();
    match captured {
        Some(frame) => Ok(frame.into_image()),
        None => bail!("output size has no area"),
    }
}

pub fn preview(config_path: Option<&Path>, args: PreviewArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let state = grade_state(&config, &args.grade)?;
    let frames = load_frames(&args.input)?;
    let window_size = frames
        .first()
        .map(|frame| fit_within(frame.dimensions(), PREVIEW_BOUNDS))
        .unwrap_or(PREVIEW_BOUNDS);
    let clip = FrameSequence::new(frames, config.frame_duration()).with_looping(args.looping);
    tracing::info!(
        frames = clip.len(),
        frame_ms = clip.frame_duration().as_millis() as u64,
        "starting preview"
    );

    let options = PreviewOptions {
        title: format!("gradeview - {}", args.input.display()),
        window_size,
        renderer: renderer_config(&config),
        grade: state,
        capture_dir: args.capture_dir,
        autoplay: args.autoplay,
    };
    run_preview(options, Arc::new(clip)).map_err(|err| anyhow!("preview window failed: {err}"))
}

pub fn looks(config_path: Option<&Path>, args: LooksArgs) -> Result<()> {
    let config = load_config(config_path)?;
    print_looks(&config, args.json)
}

fn print_looks(config: &LookConfig, json: bool) -> Result<()> {
    let resolved: Vec<_> = config
        .looks
        .keys()
        .filter_map(|name| config.resolve_look(name))
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }
    if resolved.is_empty() {
        println!("No looks configured.");
        return Ok(());
    }
    let default = config.default_look();
    println!("Looks:");
    for look in resolved {
        let marker = if Some(look.name.as_str()) == default {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:<20} {}",
            look.name,
            look.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Scales `size` down to fit `bounds`, keeping the aspect ratio.
fn fit_within((width, height): (u32, u32), (max_w, max_h): (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_w, max_h);
    }
    let scale = (max_w as f64 / width as f64)
        .min(max_h as f64 / height as f64)
        .min(1.0);
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_within_keeps_aspect() {
        assert_eq!(fit_within((3840, 2160), (1280, 800)), (1280, 720));
        assert_eq!(fit_within((640, 480), (1280, 800)), (640, 480));
        assert_eq!(fit_within((0, 10), (1280, 800)), (1280, 800));
    }
}
