use winit::dpi::PhysicalSize;

/// Smallest gamma value the pipeline will divide by.
pub const GAMMA_EPSILON: f32 = 0.01;

/// Default cap on the device pixel ratio used to size the backing store.
pub const DEFAULT_MAX_PIXEL_RATIO: f64 = 2.0;

/// Plain RGB triple used by the three-way colour corrector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn splat(value: f32) -> Self {
        Self::new(value, value, value)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Full colour-grade parameter set.
///
/// The renderer never patches individual fields: every UI change hands over a
/// complete value which replaces the previous one wholesale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSettings {
    /// Multiplier around mid-gray; 1.0 is neutral.
    pub contrast: f32,
    /// Distance from the luma gray; 0.0 is monochrome, 1.0 is neutral.
    pub saturation: f32,
    /// Warm/cool shift in the ±100 slider range.
    pub temperature: f32,
    /// Green/magenta shift in the ±100 slider range. Positive moves toward magenta.
    pub tint: f32,
    /// Shadow lift/crush in the ±100 slider range.
    pub shadows: f32,
    /// Highlight boost/roll-off in the ±100 slider range.
    pub highlights: f32,
    pub lift: Rgb,
    pub gamma: Rgb,
    pub gain: Rgb,
}

impl ColorSettings {
    /// Returns a copy with every gamma component clamped to [`GAMMA_EPSILON`].
    pub fn sanitized_gamma(&self) -> Rgb {
        Rgb::new(
            self.gamma.r.max(GAMMA_EPSILON),
            self.gamma.g.max(GAMMA_EPSILON),
            self.gamma.b.max(GAMMA_EPSILON),
        )
    }
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            saturation: 1.0,
            temperature: 0.0,
            tint: 0.0,
            shadows: 0.0,
            highlights: 0.0,
            lift: Rgb::splat(0.0),
            gamma: Rgb::splat(1.0),
            gain: Rgb::splat(1.0),
        }
    }
}

/// Film-effect parameters applied after the colour grade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectSettings {
    /// Grain strength in [0, 1]; 0 disables grain entirely.
    pub grain_amount: f32,
    /// Grain cell size in output pixels.
    pub grain_size: f32,
    /// Vignette strength in [0, 1]; 0 disables the vignette.
    pub vignette_amount: f32,
    /// Normalised radius where the falloff is centred (0 = centre, 1 = corners).
    pub vignette_midpoint: f32,
    /// Half-width of the falloff band around the midpoint.
    pub vignette_feather: f32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            grain_amount: 0.0,
            grain_size: 1.0,
            vignette_amount: 0.0,
            vignette_midpoint: 0.5,
            vignette_feather: 0.5,
        }
    }
}

/// Before/after comparison line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SplitPosition {
    #[default]
    Disabled,
    /// Normalised horizontal fraction; pixels left of it show the ungraded source.
    At(f32),
}

impl SplitPosition {
    /// Builds a split from a raw fraction, treating negatives and NaN as disabled.
    pub fn from_fraction(fraction: f32) -> Self {
        if fraction.is_nan() || fraction < 0.0 {
            Self::Disabled
        } else {
            Self::At(fraction.min(1.0))
        }
    }

    /// Value written into the uniform block; negative means disabled.
    pub fn as_uniform(self) -> f32 {
        match self {
            Self::Disabled => -1.0,
            Self::At(fraction) => fraction.clamp(0.0, 1.0),
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::At(_))
    }
}

/// GPU adapter power preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Explicit configuration handed to every renderer instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Upper bound on the device pixel ratio applied to the displayed size.
    pub max_pixel_ratio: f64,
    /// Adapter selection preference for accelerated backends.
    pub power_preference: GpuPowerPreference,
    /// Backing store size used until the first resize observation arrives.
    pub initial_size: PhysicalSize<u32>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_pixel_ratio: DEFAULT_MAX_PIXEL_RATIO,
            power_preference: GpuPowerPreference::default(),
            initial_size: PhysicalSize::new(1280, 720),
        }
    }
}
