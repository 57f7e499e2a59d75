//! CPU evaluation of the grading pipeline.
//!
//! Mirrors `FRAGMENT_SHADER_GLSL` stage for stage in `f32` so the software
//! backend produces the same pixels the GPU would, modulo texture filtering.
//! Grain is the exception: its `fract(sin(..) * 43758.5453)` hash amplifies
//! differences in `sin` precision, so grain noise is backend-dependent.

use crate::types::GAMMA_EPSILON;
use crate::uniforms::GradeUniforms;

/// Rec. 709 luma weights.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];
/// Temperature and tint slider units to channel offset.
pub const WHITE_BALANCE_SCALE: f32 = 0.001;
/// Maximum offset applied by a full shadows/highlights slider.
pub const TONE_RANGE_SCALE: f32 = 0.3;
/// Peak grain offset at full amount.
pub const GRAIN_SCALE: f32 = 0.15;
/// Effect amounts at or below this are treated as off.
pub const EFFECT_THRESHOLD: f32 = 0.001;
const FEATHER_EPSILON: f32 = 0.001;

type Rgb3 = [f32; 3];

/// Shades one pixel.
///
/// `source` is the sampled frame texel in [0, 1] and `uv` the normalised
/// output position with y pointing up.
pub fn shade(source: [f32; 4], uv: [f32; 2], params: &GradeUniforms) -> [f32; 4] {
    let original = [source[0], source[1], source[2]];
    let mut c = clamp01(original);
    c = lift_gamma_gain(c, params);
    c = contrast(c, params.tone[0]);
    c = saturation(c, params.tone[1]);
    c = white_balance(c, params.tone[2], params.tone[3]);
    c = tone_range(c, params.range[0], params.range[1]);
    c = grain(c, uv, params);
    c = vignette(c, uv, params);

    let split = params.range[2];
    if split >= 0.0 && uv[0] < split {
        c = original;
    }
    [c[0], c[1], c[2], source[3]]
}

pub fn luma(c: Rgb3) -> f32 {
    c[0] * LUMA_WEIGHTS[0] + c[1] * LUMA_WEIGHTS[1] + c[2] * LUMA_WEIGHTS[2]
}

fn lift_gamma_gain(c: Rgb3, params: &GradeUniforms) -> Rgb3 {
    let mut out = [0.0; 3];
    for i in 0..3 {
        let lifted = params.gain[i] * (params.lift[i] * (1.0 - c[i]) + c[i]);
        let exponent = 1.0 / params.gamma[i].max(GAMMA_EPSILON);
        out[i] = lifted.max(0.0).powf(exponent);
    }
    clamp01(out)
}

fn contrast(c: Rgb3, k: f32) -> Rgb3 {
    clamp01(c.map(|v| (v - 0.5) * k + 0.5))
}

fn saturation(c: Rgb3, amount: f32) -> Rgb3 {
    let l = luma(c);
    clamp01(c.map(|v| mix(l, v, amount)))
}

fn white_balance(c: Rgb3, temperature: f32, tint: f32) -> Rgb3 {
    let warm = temperature * WHITE_BALANCE_SCALE;
    let magenta = tint * WHITE_BALANCE_SCALE;
    clamp01([c[0] + warm, c[1] - magenta, c[2] - warm])
}

fn tone_range(c: Rgb3, shadows: f32, highlights: f32) -> Rgb3 {
    let l = luma(c);
    let shadow_mask = 1.0 - smoothstep(0.0, 0.5, l);
    let highlight_mask = smoothstep(0.5, 1.0, l);
    let offset = shadows / 100.0 * TONE_RANGE_SCALE * shadow_mask
        + highlights / 100.0 * TONE_RANGE_SCALE * highlight_mask;
    clamp01(c.map(|v| v + offset))
}

fn grain(c: Rgb3, uv: [f32; 2], params: &GradeUniforms) -> Rgb3 {
    let amount = params.grain[0];
    if amount <= EFFECT_THRESHOLD {
        return c;
    }
    let cell = params.grain[1].max(1.0);
    let time = params.range[3];
    let seed = [
        (uv[0] * params.resolution[0] / cell).floor() + time * 37.0,
        (uv[1] * params.resolution[1] / cell).floor() + time * 17.0,
    ];
    let noise = hash12(seed) - 0.5;
    clamp01(c.map(|v| v + noise * amount * GRAIN_SCALE))
}

fn vignette(c: Rgb3, uv: [f32; 2], params: &GradeUniforms) -> Rgb3 {
    let amount = params.vignette[0];
    if amount <= EFFECT_THRESHOLD {
        return c;
    }
    let aspect = params.vignette[3];
    let dx = (uv[0] - 0.5) * aspect;
    let dy = uv[1] - 0.5;
    let corner = 0.5 * (aspect * aspect + 1.0).sqrt();
    let dist = (dx * dx + dy * dy).sqrt() / corner;
    let feather = params.vignette[2].max(FEATHER_EPSILON);
    let mid = params.vignette[1];
    let falloff = smoothstep(mid - feather, mid + feather, dist);
    clamp01(c.map(|v| v * (1.0 - falloff * amount)))
}

/// GLSL `fract(sin(dot(p, vec2(12.9898, 78.233))) * 43758.5453)`.
pub fn hash12(p: [f32; 2]) -> f32 {
    let value = (p[0] * 12.9898 + p[1] * 78.233).sin() * 43758.5453;
    value - value.floor()
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

fn clamp01(c: Rgb3) -> Rgb3 {
    c.map(|v| v.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorSettings, EffectSettings, Rgb, SplitPosition};
    use winit::dpi::PhysicalSize;

    fn uniforms(color: ColorSettings) -> GradeUniforms {
        let mut params = GradeUniforms::new(PhysicalSize::new(64, 32));
        params.set_color(&color);
        params
    }

    fn assert_close(actual: [f32; 4], expected: [f32; 3]) {
        for i in 0..3 {
            assert!(
                (actual[i] - expected[i]).abs() < 1e-5,
                "channel {i}: {actual:?} vs {expected:?}"
            );
        }
    }

    #[test]
    fn neutral_settings_are_identity() {
        let params = uniforms(ColorSettings::default());
        for source in [[0.0, 0.0, 0.0, 1.0], [0.2, 0.5, 0.9, 1.0], [1.0, 1.0, 1.0, 0.5]] {
            let out = shade(source, [0.3, 0.7], &params);
            assert_close(out, [source[0], source[1], source[2]]);
            assert_eq!(out[3], source[3]);
        }
    }

    #[test]
    fn contrast_pivots_on_mid_gray() {
        let params = uniforms(ColorSettings {
            contrast: 2.0,
            ..ColorSettings::default()
        });
        assert_close(shade([0.5, 0.5, 0.5, 1.0], [0.5, 0.5], &params), [0.5, 0.5, 0.5]);
        assert_close(shade([0.6, 0.4, 0.5, 1.0], [0.5, 0.5], &params), [0.7, 0.3, 0.5]);
    }

    #[test]
    fn zero_saturation_yields_luma() {
        let params = uniforms(ColorSettings {
            saturation: 0.0,
            ..ColorSettings::default()
        });
        let source = [0.9, 0.2, 0.4];
        let expected = luma(source);
        let out = shade([source[0], source[1], source[2], 1.0], [0.1, 0.1], &params);
        assert_close(out, [expected; 3]);
    }

    #[test]
    fn lift_raises_black_and_gain_scales_white() {
        let params = uniforms(ColorSettings {
            lift: Rgb::splat(0.2),
            gain: Rgb::new(0.5, 1.0, 1.0),
            ..ColorSettings::default()
        });
        let black = shade([0.0, 0.0, 0.0, 1.0], [0.5, 0.5], &params);
        assert_close(black, [0.1, 0.2, 0.2]);
        let white = shade([1.0, 1.0, 1.0, 1.0], [0.5, 0.5], &params);
        assert_close(white, [0.5, 1.0, 1.0]);
    }

    #[test]
    fn zero_gamma_does_not_produce_nan() {
        let params = uniforms(ColorSettings {
            gamma: Rgb::splat(0.0),
            ..ColorSettings::default()
        });
        let out = shade([0.5, 0.9, 1.0, 1.0], [0.5, 0.5], &params);
        assert!(out.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
    }

    #[test]
    fn warm_temperature_shifts_red_and_blue() {
        let params = uniforms(ColorSettings {
            temperature: 100.0,
            tint: 50.0,
            ..ColorSettings::default()
        });
        assert_close(shade([0.5, 0.5, 0.5, 1.0], [0.5, 0.5], &params), [0.6, 0.45, 0.4]);
    }

    #[test]
    fn shadows_only_affect_dark_pixels() {
        let params = uniforms(ColorSettings {
            shadows: 100.0,
            ..ColorSettings::default()
        });
        assert_close(shade([0.0, 0.0, 0.0, 1.0], [0.5, 0.5], &params), [0.3, 0.3, 0.3]);
        assert_close(shade([0.8, 0.8, 0.8, 1.0], [0.5, 0.5], &params), [0.8, 0.8, 0.8]);
    }

    #[test]
    fn extreme_values_stay_in_range() {
        let params = uniforms(ColorSettings {
            contrast: 50.0,
            saturation: 10.0,
            temperature: 100.0,
            tint: -100.0,
            shadows: 100.0,
            highlights: 100.0,
            lift: Rgb::splat(3.0),
            gamma: Rgb::splat(0.001),
            gain: Rgb::splat(8.0),
        });
        let out = shade([0.3, 0.6, 0.1, 1.0], [0.5, 0.5], &params);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn split_keeps_source_on_the_left() {
        let mut params = uniforms(ColorSettings {
            saturation: 0.0,
            ..ColorSettings::default()
        });
        params.set_split(SplitPosition::At(0.5));
        let source = [0.9, 0.1, 0.3, 1.0];
        assert_eq!(shade(source, [0.49, 0.5], &params), source);
        assert_ne!(shade(source, [0.5, 0.5], &params), source);
    }

    #[test]
    fn grain_varies_with_time_and_vignette_darkens_corners() {
        let mut params = GradeUniforms::new(PhysicalSize::new(64, 64));
        params.set_effects(&EffectSettings {
            grain_amount: 1.0,
            ..EffectSettings::default()
        });
        let source = [0.5, 0.5, 0.5, 1.0];
        let frames: Vec<f32> = (0..8)
            .map(|step| {
                params.set_time(step as f32 * 0.25);
                shade(source, [0.3, 0.3], &params)[0]
            })
            .collect();
        assert!(frames.windows(2).any(|pair| pair[0] != pair[1]));

        let mut params = GradeUniforms::new(PhysicalSize::new(64, 64));
        params.set_effects(&EffectSettings {
            vignette_amount: 1.0,
            vignette_midpoint: 0.5,
            vignette_feather: 0.2,
            ..EffectSettings::default()
        });
        let centre = shade(source, [0.5, 0.5], &params);
        let corner = shade(source, [0.0, 0.0], &params);
        assert_close(centre, [0.5, 0.5, 0.5]);
        assert!(corner[0] < 0.01);
    }
}
