use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use renderer::{
    ColorSettings, EffectSettings, FixedTimeSource, FrameSource, GradeState, GradingRenderer,
    HostStatus, PhysicalSize, PlaybackEvent, RendererConfig, RendererError, RendererHost,
    RendererStatus, Rgb, SoftwareBackend, SplitPosition, SteppedTimeSource, StillFrameSource,
    TickOutcome,
};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 6;

fn config() -> RendererConfig {
    RendererConfig {
        initial_size: PhysicalSize::new(WIDTH, HEIGHT),
        ..RendererConfig::default()
    }
}

fn colourful() -> RgbaImage {
    RgbaImage::from_fn(WIDTH, HEIGHT, |x, y| {
        Rgba([(x * 30 + 10) as u8, (y * 40 + 20) as u8, 200 - (x * 10) as u8, 255])
    })
}

fn gray(level: u8) -> RgbaImage {
    RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([level, level, level, 255]))
}

fn still(image: RgbaImage) -> Arc<dyn FrameSource> {
    Arc::new(StillFrameSource::new(image))
}

fn renderer_with(source: &Arc<dyn FrameSource>) -> GradingRenderer<SoftwareBackend> {
    let mut renderer = GradingRenderer::software(config());
    renderer.set_video_source(source);
    renderer
}

fn capture(renderer: &mut GradingRenderer<SoftwareBackend>) -> RgbaImage {
    renderer
        .capture_frame()
        .expect("capture succeeds")
        .expect("drawable has area")
        .into_image()
}

fn assert_close(actual: u8, expected: u8) {
    assert!(
        actual.abs_diff(expected) <= 1,
        "expected {expected} +/- 1, got {actual}"
    );
}

#[test]
fn neutral_settings_reproduce_the_source() {
    let image = colourful();
    let source = still(image.clone());
    let mut renderer = renderer_with(&source);

    let captured = capture(&mut renderer);
    assert_eq!(captured.dimensions(), (WIDTH, HEIGHT));
    assert_eq!(captured, image);
}

#[test]
fn capture_is_top_down() {
    let mut image = gray(0);
    image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    let source = still(image);
    let mut renderer = renderer_with(&source);

    let captured = capture(&mut renderer);
    assert_eq!(captured.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(captured.get_pixel(0, HEIGHT - 1).0, [0, 0, 0, 255]);
}

#[test]
fn doubled_contrast_keeps_mid_gray_and_spreads_the_rest() {
    let mut image = gray(128);
    image.put_pixel(1, 1, Rgba([64, 64, 64, 255]));
    let source = still(image);
    let mut renderer = renderer_with(&source);
    renderer.update_color_settings(&ColorSettings {
        contrast: 2.0,
        ..ColorSettings::default()
    });

    let captured = capture(&mut renderer);
    assert_close(captured.get_pixel(4, 4).0[0], 128);
    // (0.251 - 0.5) * 2 + 0.5 = 0.002
    assert_close(captured.get_pixel(1, 1).0[0], 1);
}

#[test]
fn zero_saturation_outputs_luma() {
    let image = colourful();
    let source = still(image.clone());
    let mut renderer = renderer_with(&source);
    renderer.update_color_settings(&ColorSettings {
        saturation: 0.0,
        ..ColorSettings::default()
    });

    let captured = capture(&mut renderer);
    for (out, src) in captured.pixels().zip(image.pixels()) {
        let [r, g, b, a] = src.0.map(|c| c as f32 / 255.0);
        let luma = (0.2126 * r + 0.7152 * g + 0.0722 * b) * 255.0;
        let expected = luma.round() as u8;
        assert_close(out.0[0], expected);
        assert_eq!(out.0[0], out.0[1]);
        assert_eq!(out.0[1], out.0[2]);
        assert_eq!(out.0[3], (a * 255.0) as u8);
    }
}

#[test]
fn split_shows_the_source_left_of_the_line() {
    let image = colourful();
    let source = still(image.clone());
    let mut renderer = renderer_with(&source)
        .with_time_source(Box::new(FixedTimeSource::new(0.5)));
    renderer.update_color_settings(&ColorSettings {
        contrast: 4.0,
        saturation: 0.0,
        shadows: -100.0,
        highlights: 100.0,
        lift: Rgb::new(0.5, -0.5, 0.5),
        gain: Rgb::new(3.0, 0.1, 2.0),
        ..ColorSettings::default()
    });
    renderer.update_effects(&EffectSettings {
        grain_amount: 1.0,
        vignette_amount: 1.0,
        ..EffectSettings::default()
    });
    renderer.set_split_position(SplitPosition::At(0.5));

    let captured = capture(&mut renderer);
    for y in 0..HEIGHT {
        for x in 0..WIDTH / 2 {
            assert_eq!(captured.get_pixel(x, y), image.get_pixel(x, y));
        }
    }
    let graded_differs = (0..HEIGHT)
        .flat_map(|y| (WIDTH / 2..WIDTH).map(move |x| (x, y)))
        .any(|(x, y)| captured.get_pixel(x, y) != image.get_pixel(x, y));
    assert!(graded_differs, "right half must be graded");
}

#[test]
fn updating_twice_matches_updating_once() {
    let settings = ColorSettings {
        contrast: 1.7,
        saturation: 1.4,
        temperature: -25.0,
        gamma: Rgb::new(0.8, 1.0, 1.2),
        ..ColorSettings::default()
    };
    let source = still(colourful());
    let mut once = renderer_with(&source).with_time_source(Box::new(FixedTimeSource::new(1.0)));
    let mut twice = renderer_with(&source).with_time_source(Box::new(FixedTimeSource::new(1.0)));

    once.update_color_settings(&settings);
    twice.update_color_settings(&settings);
    twice.update_color_settings(&settings);

    assert_eq!(capture(&mut once), capture(&mut twice));
}

#[test]
fn without_effects_output_does_not_depend_on_time() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source)
        .with_time_source(Box::new(SteppedTimeSource::new(0.0, 1.7)));
    renderer.update_color_settings(&ColorSettings {
        contrast: 1.3,
        temperature: 40.0,
        ..ColorSettings::default()
    });

    let first = capture(&mut renderer);
    let second = capture(&mut renderer);
    assert_eq!(first, second);
}

#[test]
fn grain_animates_with_time() {
    let source = still(gray(128));
    let mut renderer = renderer_with(&source)
        .with_time_source(Box::new(SteppedTimeSource::new(0.0, 1.7)));
    renderer.update_effects(&EffectSettings {
        grain_amount: 1.0,
        ..EffectSettings::default()
    });

    let first = capture(&mut renderer);
    let second = capture(&mut renderer);
    assert_ne!(first, second);
}

#[test]
fn repeated_renders_are_identical() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    renderer.update_color_settings(&ColorSettings {
        shadows: 30.0,
        highlights: -20.0,
        tint: 15.0,
        ..ColorSettings::default()
    });
    renderer.update_effects(&EffectSettings {
        vignette_amount: 0.6,
        ..EffectSettings::default()
    });

    let first = capture(&mut renderer);
    let second = capture(&mut renderer);
    assert_eq!(first, second);
    assert_eq!(renderer.backend().stats().uploads, 1);
}

#[test]
fn resize_reallocates_once_per_distinct_size() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    assert_eq!(renderer.backend().stats().allocations, 1);

    // Ratio 3.0 is capped to the default 2.0.
    assert!(renderer.observe_resize(100.0, 50.0, 3.0));
    assert_eq!(renderer.size(), PhysicalSize::new(200, 100));
    assert!(!renderer.observe_resize(100.0, 50.0, 3.0));
    assert!(!renderer.observe_resize(100.0, 50.0, 2.0));
    assert_eq!(renderer.backend().stats().allocations, 2);

    let captured = capture(&mut renderer);
    assert_eq!(captured.dimensions(), (200, 100));
}

#[test]
fn zero_sized_drawable_captures_nothing() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    renderer.observe_resize(0.0, 10.0, 1.0);
    assert!(renderer.capture_frame().unwrap().is_none());
    assert!(!renderer.render_frame().unwrap());
}

#[test]
fn context_loss_and_restore_reproduce_the_frame() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    renderer.update_color_settings(&ColorSettings {
        contrast: 1.4,
        saturation: 0.6,
        ..ColorSettings::default()
    });
    renderer.start_render_loop();
    let before = capture(&mut renderer);

    let handle = renderer.backend().loss_handle();
    handle.lose("driver reset");
    assert!(!renderer.render_frame().unwrap());
    assert_eq!(renderer.status(), RendererStatus::ContextLost);
    assert_eq!(renderer.tick(), TickOutcome::Suspended);
    assert!(matches!(
        renderer.capture_frame(),
        Err(RendererError::ContextLost)
    ));

    handle.restore();
    let after = capture(&mut renderer);
    assert_eq!(renderer.status(), RendererStatus::Active);
    assert_eq!(before, after);
    assert_eq!(renderer.backend().stats().compiles, 2);
    assert_eq!(renderer.tick(), TickOutcome::Rendered);
}

#[test]
fn failed_restore_is_reported() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    let handle = renderer.backend().loss_handle();
    handle.set_restore_failure(true);
    handle.lose("driver reset");
    handle.restore();
    renderer.poll_events();
    assert_eq!(renderer.status(), RendererStatus::RestoreFailed);
}

#[test]
fn idle_loop_only_draws_staged_changes() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    assert_eq!(renderer.tick(), TickOutcome::Suspended);

    renderer.start_render_loop();
    assert_eq!(renderer.tick(), TickOutcome::Rendered);
    assert_eq!(renderer.tick(), TickOutcome::Skipped);

    renderer.update_color_settings(&ColorSettings::default());
    assert_eq!(renderer.tick(), TickOutcome::Skipped);

    renderer.set_split_position(SplitPosition::At(0.25));
    assert_eq!(renderer.tick(), TickOutcome::Rendered);
    assert_eq!(renderer.tick(), TickOutcome::Skipped);

    renderer.notify_playback(PlaybackEvent::Play);
    assert_eq!(renderer.tick(), TickOutcome::Rendered);
    assert_eq!(renderer.tick(), TickOutcome::Rendered);

    renderer.notify_playback(PlaybackEvent::Pause);
    assert_eq!(renderer.tick(), TickOutcome::Rendered);
    assert_eq!(renderer.tick(), TickOutcome::Skipped);

    renderer.notify_playback(PlaybackEvent::Seeked);
    assert_eq!(renderer.tick(), TickOutcome::Rendered);

    renderer.stop_render_loop();
    assert_eq!(renderer.tick(), TickOutcome::Suspended);
}

#[test]
fn dropped_source_draws_nothing() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    drop(source);
    assert!(!renderer.render_frame().unwrap());
    assert_eq!(renderer.frames_rendered(), 0);
}

#[test]
fn dispose_is_idempotent_and_final() {
    let source = still(colourful());
    let mut renderer = renderer_with(&source);
    renderer.start_render_loop();
    assert_eq!(renderer.tick(), TickOutcome::Rendered);

    renderer.dispose();
    renderer.dispose();
    assert_eq!(renderer.status(), RendererStatus::Disposed);
    assert!(renderer.backend().is_released());
    assert!(matches!(renderer.render_frame(), Err(RendererError::Disposed)));
    assert!(matches!(renderer.capture_frame(), Err(RendererError::Disposed)));
    assert_eq!(renderer.tick(), TickOutcome::Suspended);
    assert_eq!(renderer.frames_rendered(), 1);
}

fn mount_software(
    host: &mut RendererHost<SoftwareBackend>,
    fail_after: Option<u32>,
) -> Rc<Cell<u32>> {
    let attempts = Rc::new(Cell::new(0));
    let counter = Rc::clone(&attempts);
    host.mount(move || {
        counter.set(counter.get() + 1);
        match fail_after {
            Some(limit) if counter.get() > limit => Err(RendererError::Unavailable(
                "no more contexts".to_string(),
            )),
            _ => Ok(GradingRenderer::software(config())),
        }
    })
    .expect("first mount succeeds");
    attempts
}

#[test]
fn host_recreates_renderer_when_restore_fails() {
    let source = still(colourful());
    let mut host = RendererHost::new();
    host.set_source(&source);
    let attempts = mount_software(&mut host, None);
    let grade = GradeState {
        color: ColorSettings {
            saturation: 0.0,
            ..ColorSettings::default()
        },
        ..GradeState::default()
    };
    host.apply(&grade);
    assert_eq!(host.tick(), TickOutcome::Rendered);

    let handle = host
        .renderer()
        .map(|renderer| renderer.backend().loss_handle())
        .unwrap();
    handle.set_restore_failure(true);
    handle.lose("gpu process crashed");

    assert_eq!(host.tick(), TickOutcome::Rendered);
    assert_eq!(host.status(), HostStatus::Active);
    assert_eq!(host.recreations(), 1);
    assert_eq!(attempts.get(), 2);

    let renderer = host.renderer().unwrap();
    assert_eq!(renderer.color_settings().saturation, 0.0);
    let captured = host.capture().unwrap().unwrap().into_image();
    let [r, g, b, _] = captured.get_pixel(3, 3).0;
    assert!(r == g && g == b);
}

#[test]
fn host_degrades_when_recreation_fails() {
    let source = still(colourful());
    let mut host = RendererHost::new();
    host.set_source(&source);
    mount_software(&mut host, Some(1));

    let handle = host
        .renderer()
        .map(|renderer| renderer.backend().loss_handle())
        .unwrap();
    handle.set_restore_failure(true);
    handle.lose("gpu process crashed");

    assert_eq!(host.tick(), TickOutcome::Suspended);
    assert_eq!(host.status(), HostStatus::Degraded);
    assert!(host.renderer().is_none());
    assert!(host.capture().unwrap().is_none());
}

#[test]
fn host_mount_failure_is_reported_once() {
    let mut host: RendererHost<SoftwareBackend> = RendererHost::new();
    let result = host.mount(|| Err(RendererError::Unavailable("no adapter".to_string())));
    assert!(matches!(result, Err(RendererError::Unavailable(_))));
    assert_eq!(host.status(), HostStatus::Degraded);
    assert_eq!(host.tick(), TickOutcome::Suspended);
}

#[test]
fn host_restores_in_place_when_possible() {
    let source = still(colourful());
    let mut host = RendererHost::new();
    host.set_source(&source);
    let attempts = mount_software(&mut host, None);
    assert_eq!(host.tick(), TickOutcome::Rendered);

    let handle = host
        .renderer()
        .map(|renderer| renderer.backend().loss_handle())
        .unwrap();
    handle.lose("tab backgrounded");

    assert_eq!(host.tick(), TickOutcome::Rendered);
    assert_eq!(host.recreations(), 0);
    assert_eq!(attempts.get(), 1);
}
