//! Loads the look configuration and maps it onto renderer parameters.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lookconfig::{LookConfig, PowerSetting, ResolvedLook};
use renderer::{
    ColorSettings, EffectSettings, GpuPowerPreference, GradeState, RendererConfig, Rgb,
    SplitPosition,
};

use crate::cli::GradeArgs;
use crate::paths::resolve_config_file;

pub fn load_config(explicit: Option<&Path>) -> Result<LookConfig> {
    let Some(path) = resolve_config_file(explicit)? else {
        tracing::debug!("no configuration file found; using built-in defaults");
        return Ok(LookConfig::default());
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = LookConfig::from_toml_str(&raw)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        looks = config.looks.len(),
        "loaded look configuration"
    );
    Ok(config)
}

/// Picks the look named on the command line, then the configured default, then neutral.
pub fn select_look(config: &LookConfig, requested: Option<&str>) -> Result<ResolvedLook> {
    match requested.or(config.default_look()) {
        Some(name) => config.resolve_look(name).ok_or_else(|| {
            let known: Vec<&str> = config.looks.keys().map(String::as_str).collect();
            anyhow!("unknown look '{name}' (known: {})", known.join(", "))
        }),
        None => Ok(ResolvedLook::neutral("neutral")),
    }
}

pub fn renderer_config(config: &LookConfig) -> RendererConfig {
    RendererConfig {
        max_pixel_ratio: config.max_pixel_ratio(),
        power_preference: match config.power() {
            PowerSetting::Low => GpuPowerPreference::Low,
            PowerSetting::High => GpuPowerPreference::High,
        },
        ..RendererConfig::default()
    }
}

pub fn grade_state(config: &LookConfig, args: &GradeArgs) -> Result<GradeState> {
    let look = select_look(config, args.look.as_deref())?;
    tracing::info!(look = %look.name, "selected look");
    let split = args
        .split
        .or(config.defaults.split)
        .map_or(SplitPosition::Disabled, SplitPosition::At);
    Ok(GradeState {
        color: color_settings(&look),
        effects: effect_settings(&look),
        split,
    })
}

pub fn color_settings(look: &ResolvedLook) -> ColorSettings {
    ColorSettings {
        contrast: look.contrast,
        saturation: look.saturation,
        temperature: look.temperature,
        tint: look.tint,
        shadows: look.shadows,
        highlights: look.highlights,
        lift: rgb(look.lift),
        gamma: rgb(look.gamma),
        gain: rgb(look.gain),
    }
}

pub fn effect_settings(look: &ResolvedLook) -> EffectSettings {
    EffectSettings {
        grain_amount: look.grain_amount,
        grain_size: look.grain_size,
        vignette_amount: look.vignette_amount,
        vignette_midpoint: look.vignette_midpoint,
        vignette_feather: look.vignette_feather,
    }
}

fn rgb([r, g, b]: [f32; 3]) -> Rgb {
    Rgb::new(r, g, b)
}
