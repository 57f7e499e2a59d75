use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::error::RendererError;

/// Compiled vertex and fragment modules for the grading program.
pub(crate) struct ProgramModules {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

/// Compiles both stages of the grading program on `device`.
///
/// Each stage is compiled inside a validation error scope so that a failure
/// is returned with the compiler log instead of reaching the uncaptured
/// error handler.
pub(crate) fn compile_program(device: &wgpu::Device) -> Result<ProgramModules, RendererError> {
    let vertex = compile_stage(device, ShaderStage::Vertex, VERTEX_SHADER_GLSL)?;
    let fragment = compile_stage(device, ShaderStage::Fragment, FRAGMENT_SHADER_GLSL)?;
    Ok(ProgramModules { vertex, fragment })
}

fn compile_stage(
    device: &wgpu::Device,
    stage: ShaderStage,
    source: &'static str,
) -> Result<wgpu::ShaderModule, RendererError> {
    let stage_name = stage_name(stage);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "grade vertex",
            _ => "grade fragment",
        }),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    let info = pollster::block_on(module.get_compilation_info());
    let scope_error = pollster::block_on(device.pop_error_scope());

    let mut log = info
        .messages
        .iter()
        .filter(|message| matches!(message.message_type, wgpu::CompilationMessageType::Error))
        .map(|message| match &message.location {
            Some(location) => format!(
                "{}:{}: {}",
                location.line_number, location.line_position, message.message
            ),
            None => message.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n");
    if let Some(error) = scope_error {
        if !log.is_empty() {
            log.push('\n');
        }
        log.push_str(&error.to_string());
    }

    if log.is_empty() {
        tracing::debug!(stage = stage_name, "compiled grading shader stage");
        Ok(module)
    } else {
        tracing::error!(stage = stage_name, %log, "grading shader failed to compile");
        Err(RendererError::ShaderCompile {
            stage: stage_name,
            log,
        })
    }
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}

/// Full-screen triangle; `v_uv` runs bottom-up like GL texture space.
pub(crate) const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Colour pipeline. The uniform block layout must match
/// [`GradeUniforms`](crate::uniforms::GradeUniforms) and the stage order must
/// match [`grade::shade`](crate::grade::shade).
pub(crate) const FRAGMENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform GradeParams {
    vec4 lift;
    vec4 gamma;
    vec4 gain;
    vec4 tone;
    vec4 range;
    vec4 grain;
    vec4 vignette;
    vec4 resolution;
} params;

layout(set = 0, binding = 1) uniform texture2D frame_texture;
layout(set = 0, binding = 2) uniform sampler frame_sampler;

const float GAMMA_EPSILON = 0.01;
const float WHITE_BALANCE_SCALE = 0.001;
const float TONE_RANGE_SCALE = 0.3;
const float GRAIN_SCALE = 0.15;
const float EFFECT_THRESHOLD = 0.001;
const float FEATHER_EPSILON = 0.001;

vec3 clamp01(vec3 c) {
    return clamp(c, vec3(0.0), vec3(1.0));
}

float luma_of(vec3 c) {
    return dot(c, vec3(0.2126, 0.7152, 0.0722));
}

float hash12(vec2 p) {
    return fract(sin(dot(p, vec2(12.9898, 78.233))) * 43758.5453);
}

vec3 lift_gamma_gain(vec3 c) {
    vec3 result = params.gain.rgb * (params.lift.rgb * (vec3(1.0) - c) + c);
    vec3 exponent = vec3(1.0) / max(params.gamma.rgb, vec3(GAMMA_EPSILON));
    result = pow(max(result, vec3(0.0)), exponent);
    return clamp01(result);
}

vec3 apply_contrast(vec3 c) {
    return clamp01((c - vec3(0.5)) * params.tone.x + vec3(0.5));
}

vec3 apply_saturation(vec3 c) {
    float l = luma_of(c);
    return clamp01(mix(vec3(l), c, params.tone.y));
}

vec3 apply_white_balance(vec3 c) {
    vec3 shift = vec3(params.tone.z, -params.tone.w, -params.tone.z) * WHITE_BALANCE_SCALE;
    return clamp01(c + shift);
}

vec3 apply_tone_range(vec3 c) {
    float l = luma_of(c);
    float shadow_mask = 1.0 - smoothstep(0.0, 0.5, l);
    float highlight_mask = smoothstep(0.5, 1.0, l);
    float shadow = params.range.x / 100.0 * TONE_RANGE_SCALE * shadow_mask;
    float highlight = params.range.y / 100.0 * TONE_RANGE_SCALE * highlight_mask;
    return clamp01(c + vec3(shadow + highlight));
}

vec3 apply_grain(vec3 c, vec2 uv) {
    float amount = params.grain.x;
    if (amount <= EFFECT_THRESHOLD) {
        return c;
    }
    float cell = max(params.grain.y, 1.0);
    float time = params.range.w;
    vec2 seed = floor(uv * params.resolution.xy / cell) + vec2(time * 37.0, time * 17.0);
    float noise = hash12(seed) - 0.5;
    return clamp01(c + vec3(noise * amount * GRAIN_SCALE));
}

vec3 apply_vignette(vec3 c, vec2 uv) {
    float amount = params.vignette.x;
    if (amount <= EFFECT_THRESHOLD) {
        return c;
    }
    vec2 scale = vec2(params.vignette.w, 1.0);
    float dist = length((uv - vec2(0.5)) * scale) / (0.5 * length(scale));
    float feather = max(params.vignette.z, FEATHER_EPSILON);
    float mid = params.vignette.y;
    float falloff = smoothstep(mid - feather, mid + feather, dist);
    return clamp01(c * (1.0 - falloff * amount));
}

void main() {
    vec2 tex_uv = vec2(v_uv.x, 1.0 - v_uv.y);
    vec4 source = texture(sampler2D(frame_texture, frame_sampler), tex_uv);

    vec3 c = clamp01(source.rgb);
    c = lift_gamma_gain(c);
    c = apply_contrast(c);
    c = apply_saturation(c);
    c = apply_white_balance(c);
    c = apply_tone_range(c);
    c = apply_grain(c, v_uv);
    c = apply_vignette(c, v_uv);

    float split = params.range.z;
    if (split >= 0.0 && v_uv.x < split) {
        c = source.rgb;
    }
    outColor = vec4(c, source.a);
}
";
