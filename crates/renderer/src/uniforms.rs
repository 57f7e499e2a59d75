use bytemuck::{Pod, Zeroable};
use winit::dpi::PhysicalSize;

use crate::types::{ColorSettings, EffectSettings, SplitPosition};

/// std140 mirror of the `GradeParams` block declared in the fragment shader.
///
/// Every member is a `vec4` so the Rust and GLSL layouts agree without
/// explicit padding fields. Both backends read pixels through this block.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GradeUniforms {
    /// rgb = lift, a unused.
    pub lift: [f32; 4],
    /// rgb = gamma (already clamped to the epsilon), a unused.
    pub gamma: [f32; 4],
    /// rgb = gain, a unused.
    pub gain: [f32; 4],
    /// contrast, saturation, temperature, tint.
    pub tone: [f32; 4],
    /// shadows, highlights, split (negative = off), time in seconds.
    pub range: [f32; 4],
    /// grain amount, grain size, unused, unused.
    pub grain: [f32; 4],
    /// vignette amount, midpoint, feather, aspect ratio.
    pub vignette: [f32; 4],
    /// width, height, 1/width, 1/height.
    pub resolution: [f32; 4],
}

impl GradeUniforms {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.set_color(&ColorSettings::default());
        uniforms.set_effects(&EffectSettings::default());
        uniforms.set_split(SplitPosition::Disabled);
        uniforms.set_resolution(size);
        uniforms
    }

    pub fn set_color(&mut self, color: &ColorSettings) {
        let gamma = color.sanitized_gamma();
        self.lift = rgb4(color.lift.to_array());
        self.gamma = rgb4(gamma.to_array());
        self.gain = rgb4(color.gain.to_array());
        self.tone = [
            color.contrast,
            color.saturation,
            color.temperature,
            color.tint,
        ];
        self.range[0] = color.shadows;
        self.range[1] = color.highlights;
    }

    pub fn set_effects(&mut self, effects: &EffectSettings) {
        self.grain[0] = effects.grain_amount;
        self.grain[1] = effects.grain_size;
        self.vignette[0] = effects.vignette_amount;
        self.vignette[1] = effects.vignette_midpoint;
        self.vignette[2] = effects.vignette_feather;
    }

    pub fn set_split(&mut self, split: SplitPosition) {
        self.range[2] = split.as_uniform();
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.range[3] = seconds;
    }

    pub fn set_resolution(&mut self, size: PhysicalSize<u32>) {
        let width = size.width.max(1) as f32;
        let height = size.height.max(1) as f32;
        self.resolution = [width, height, 1.0 / width, 1.0 / height];
        self.vignette[3] = width / height;
    }

    pub fn time(&self) -> f32 {
        self.range[3]
    }

    pub fn split(&self) -> f32 {
        self.range[2]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

fn rgb4(rgb: [f32; 3]) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], 0.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rgb;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(size_of::<GradeUniforms>(), 128);
        assert_eq!(align_of::<GradeUniforms>(), 16);
        assert_eq!(offset_of!(GradeUniforms, lift), 0);
        assert_eq!(offset_of!(GradeUniforms, gamma), 16);
        assert_eq!(offset_of!(GradeUniforms, tone), 48);
        assert_eq!(offset_of!(GradeUniforms, range), 64);
        assert_eq!(offset_of!(GradeUniforms, vignette), 96);
        assert_eq!(offset_of!(GradeUniforms, resolution), 112);
    }

    #[test]
    fn gamma_is_clamped_when_packed() {
        let mut uniforms = GradeUniforms::new(PhysicalSize::new(4, 2));
        let color = ColorSettings {
            gamma: Rgb::new(0.0, -1.0, 2.0),
            ..ColorSettings::default()
        };
        uniforms.set_color(&color);
        assert_eq!(uniforms.gamma[0], 0.01);
        assert_eq!(uniforms.gamma[1], 0.01);
        assert_eq!(uniforms.gamma[2], 2.0);
    }

    #[test]
    fn resolution_tracks_aspect_and_split_sentinel() {
        let mut uniforms = GradeUniforms::new(PhysicalSize::new(200, 100));
        assert_eq!(uniforms.resolution, [200.0, 100.0, 0.005, 0.01]);
        assert_eq!(uniforms.vignette[3], 2.0);
        assert!(uniforms.split() < 0.0);
        uniforms.set_split(SplitPosition::At(0.25));
        assert_eq!(uniforms.split(), 0.25);
    }
}
