//! GLSL sources of the iridescence program.
//!
//! Both stages are plain GLSL 450. The uniforms live in a single std140
//! block; the fragment stage reaches them through `#define` aliases so the
//! body can use the short `u*` names that [`crate::uniforms::Uniform::name`]
//! reports.

/// Size in bytes of the std140 `IridescenceParams` block.
pub const UNIFORM_BLOCK_SIZE: usize = 48;

/// Clip-space corners of the unit triangle that covers the viewport.
pub const TRIANGLE_POSITIONS: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];
pub const TRIANGLE_UVS: [[f32; 2]; 3] = [[0.0, 0.0], [2.0, 0.0], [0.0, 2.0]];

/// Passes the triangle through and hands `uv` to the fragment stage.
pub const VERTEX_SHADER: &str = r"#version 450
layout(location = 0) in vec2 position;
layout(location = 1) in vec2 uv;
layout(location = 0) out vec2 vUv;

void main() {
    vUv = uv;
    gl_Position = vec4(position, 0.0, 1.0);
}
";

/// Iterative trigonometric field tinted by `uColor`.
///
/// The block layout must match `IridescenceUniforms` in `gpu/uniforms.rs`.
pub const FRAGMENT_SHADER: &str = r"#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform IridescenceParams {
    vec3 color;
    float time;
    vec3 resolution;
    float amplitude;
    vec2 mouse;
    float speed;
    float _padding;
} params;

#define uColor params.color
#define uTime params.time
#define uResolution params.resolution
#define uAmplitude params.amplitude
#define uMouse params.mouse
#define uSpeed params.speed

void main() {
    float mr = max(min(uResolution.x, uResolution.y), 1.0);
    vec2 uv = (vUv * 2.0 - 1.0) * uResolution.xy / mr;
    uv += (uMouse - vec2(0.5)) * uAmplitude;

    float d = -uTime * 0.5 * uSpeed;
    float a = 0.0;
    for (int i = 0; i < 5; ++i) {
        float fi = float(i);
        a += cos(fi - d - a * uv.x);
        d += sin(uv.y * fi + a);
    }
    d += uTime * 0.5 * uSpeed;

    vec3 col = vec3(cos(uv * vec2(d, a)) * 0.6 + 0.4, cos(a + d) * 0.5 + 0.5);
    col = cos(col * cos(vec3(d, a, 2.5)) * 0.5 + 0.5) * uColor;
    outColor = vec4(col, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::UniformState;

    #[test]
    fn fragment_declares_every_uniform() {
        for uniform in UniformState::default().uniforms() {
            let alias = format!("#define {} params.", uniform.name());
            assert!(
                FRAGMENT_SHADER.contains(&alias),
                "missing alias for {}",
                uniform.name()
            );
        }
    }

    #[test]
    fn vertex_outputs_feed_fragment_inputs() {
        assert!(VERTEX_SHADER.contains("layout(location = 0) out vec2 vUv"));
        assert!(FRAGMENT_SHADER.contains("layout(location = 0) in vec2 vUv"));
    }

    #[test]
    fn triangle_covers_clip_space() {
        for (position, uv) in TRIANGLE_POSITIONS.iter().zip(TRIANGLE_UVS) {
            assert_eq!(position[0], uv[0] * 2.0 - 1.0);
            assert_eq!(position[1], uv[1] * 2.0 - 1.0);
        }
    }
}
