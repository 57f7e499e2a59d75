use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PIXEL_RATIO: f64 = 2.0;
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(40);
/// Bound for the temperature, tint, shadows and highlights sliders.
pub const SLIDER_LIMIT: f32 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LookConfig {
    pub version: u32,
    #[serde(default)]
    pub renderer: RendererSection,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub looks: BTreeMap<String, Look>,
}

impl Default for LookConfig {
    fn default() -> Self {
        Self {
            version: 1,
            renderer: RendererSection::default(),
            defaults: Defaults::default(),
            looks: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RendererSection {
    pub max_pixel_ratio: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_power_opt")]
    pub power: Option<PowerSetting>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Defaults {
    pub look: Option<String>,
    pub split: Option<f32>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub frame_duration: Option<Duration>,
}

/// A named preset. Every field is optional and falls back to neutral.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Look {
    pub description: Option<String>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub temperature: Option<f32>,
    pub tint: Option<f32>,
    pub shadows: Option<f32>,
    pub highlights: Option<f32>,
    pub lift: Option<[f32; 3]>,
    pub gamma: Option<[f32; 3]>,
    pub gain: Option<[f32; 3]>,
    #[serde(default)]
    pub effects: LookEffects,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LookEffects {
    pub grain_amount: Option<f32>,
    pub grain_size: Option<f32>,
    pub vignette_amount: Option<f32>,
    pub vignette_midpoint: Option<f32>,
    pub vignette_feather: Option<f32>,
}

/// A look with every field filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLook {
    pub name: String,
    pub description: Option<String>,
    pub contrast: f32,
    pub saturation: f32,
    pub temperature: f32,
    pub tint: f32,
    pub shadows: f32,
    pub highlights: f32,
    pub lift: [f32; 3],
    pub gamma: [f32; 3],
    pub gain: [f32; 3],
    pub grain_amount: f32,
    pub grain_size: f32,
    pub vignette_amount: f32,
    pub vignette_midpoint: f32,
    pub vignette_feather: f32,
}

impl ResolvedLook {
    pub fn neutral(name: impl Into<String>) -> Self {
        Look::default().resolve(name)
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_power_opt<'de, D>(deserializer: D) -> Result<Option<PowerSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| parse_power(&raw).map_err(de::Error::custom))
        .transpose()
}

pub fn parse_power(raw: &str) -> Result<PowerSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "high" | "high-performance" | "performance" | "discrete" => Ok(PowerSetting::High),
        "low" | "low-power" | "battery" | "integrated" => Ok(PowerSetting::Low),
        other => Err(format!("invalid power preference '{other}'")),
    }
}

impl LookConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LookConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn look(&self, name: &str) -> Option<&Look> {
        self.looks.get(name)
    }

    pub fn default_look(&self) -> Option<&str> {
        self.defaults.look.as_deref()
    }

    pub fn resolve_look(&self, name: &str) -> Option<ResolvedLook> {
        self.look(name).map(|look| look.resolve(name))
    }

    pub fn max_pixel_ratio(&self) -> f64 {
        self.renderer
            .max_pixel_ratio
            .unwrap_or(DEFAULT_MAX_PIXEL_RATIO)
    }

    pub fn power(&self) -> PowerSetting {
        self.renderer.power.unwrap_or_default()
    }

    pub fn frame_duration(&self) -> Duration {
        self.defaults
            .frame_duration
            .unwrap_or(DEFAULT_FRAME_DURATION)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(ratio) = self.renderer.max_pixel_ratio {
            if !ratio.is_finite() || ratio < 1.0 {
                return Err(ConfigError::Invalid(
                    "renderer.max_pixel_ratio must be >= 1".into(),
                ));
            }
        }

        if let Some(look) = &self.defaults.look {
            if !self.looks.contains_key(look) {
                return Err(ConfigError::Invalid(format!(
                    "defaults.look references unknown look '{look}'"
                )));
            }
        }

        if let Some(split) = self.defaults.split {
            validate_split(split).map_err(|msg| ConfigError::Invalid(format!("defaults.{msg}")))?;
        }

        if let Some(duration) = self.defaults.frame_duration {
            if duration.is_zero() {
                return Err(ConfigError::Invalid(
                    "defaults.frame_duration must be greater than zero".into(),
                ));
            }
        }

        for (name, look) in &self.looks {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("look names may not be empty".into()));
            }
            look.validate()
                .map_err(|msg| ConfigError::Invalid(format!("look '{name}' {msg}")))?;
        }

        Ok(())
    }
}

/// Accepts fractions in `[0, 1)`.
pub fn validate_split(split: f32) -> Result<(), String> {
    if (0.0..1.0).contains(&split) {
        Ok(())
    } else {
        Err(format!("split must be in [0, 1), got {split}"))
    }
}

impl Look {
    pub fn resolve(&self, name: impl Into<String>) -> ResolvedLook {
        let effects = &self.effects;
        ResolvedLook {
            name: name.into(),
            description: self.description.clone(),
            contrast: self.contrast.unwrap_or(1.0),
            saturation: self.saturation.unwrap_or(1.0),
            temperature: self.temperature.unwrap_or(0.0),
            tint: self.tint.unwrap_or(0.0),
            shadows: self.shadows.unwrap_or(0.0),
            highlights: self.highlights.unwrap_or(0.0),
            lift: self.lift.unwrap_or([0.0; 3]),
            gamma: self.gamma.unwrap_or([1.0; 3]),
            gain: self.gain.unwrap_or([1.0; 3]),
            grain_amount: effects.grain_amount.unwrap_or(0.0),
            grain_size: effects.grain_size.unwrap_or(1.0),
            vignette_amount: effects.vignette_amount.unwrap_or(0.0),
            vignette_midpoint: effects.vignette_midpoint.unwrap_or(0.5),
            vignette_feather: effects.vignette_feather.unwrap_or(0.5),
        }
    }

    fn validate(&self) -> Result<(), String> {
        for (field, value) in [("contrast", self.contrast), ("saturation", self.saturation)] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(format!("{field} must be >= 0"));
                }
            }
        }

        let sliders = [
            ("temperature", self.temperature),
            ("tint", self.tint),
            ("shadows", self.shadows),
            ("highlights", self.highlights),
        ];
        for (field, value) in sliders {
            if let Some(value) = value {
                if !value.is_finite() || value.abs() > SLIDER_LIMIT {
                    return Err(format!("{field} must be within -100..=100"));
                }
            }
        }

        if let Some(gamma) = self.gamma {
            if gamma.iter().any(|g| !g.is_finite() || *g <= 0.0) {
                return Err("gamma components must be > 0".into());
            }
        }
        for (field, value) in [("lift", self.lift), ("gain", self.gain)] {
            if value.is_some_and(|rgb| rgb.iter().any(|c| !c.is_finite())) {
                return Err(format!("{field} components must be finite"));
            }
        }

        let effects = &self.effects;
        let amounts = [
            ("grain_amount", effects.grain_amount),
            ("vignette_amount", effects.vignette_amount),
        ];
        for (field, value) in amounts {
            if let Some(value) = value {
                if !(0.0..=1.0).contains(&value) {
                    return Err(format!("effects.{field} must be in [0, 1]"));
                }
            }
        }
        if let Some(size) = effects.grain_size {
            if !size.is_finite() || size < 1.0 {
                return Err("effects.grain_size must be >= 1".into());
            }
        }
        if let Some(midpoint) = effects.vignette_midpoint {
            if !midpoint.is_finite() || midpoint < 0.0 {
                return Err("effects.vignette_midpoint must be >= 0".into());
            }
        }
        if let Some(feather) = effects.vignette_feather {
            if !feather.is_finite() || feather < 0.0 {
                return Err("effects.vignette_feather must be >= 0".into());
            }
        }

        Ok(())
    }
}
