use bytemuck::{Pod, Zeroable};

use crate::uniforms::Uniform;

/// CPU mirror of the std140 `IridescenceParams` block in the fragment shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct IridescenceUniforms {
    pub color: [f32; 3],
    pub time: f32,
    pub resolution: [f32; 3],
    pub amplitude: f32,
    pub mouse: [f32; 2],
    pub speed: f32,
    pub _padding: f32,
}

impl IridescenceUniforms {
    pub fn apply(&mut self, uniform: Uniform) {
        match uniform {
            Uniform::Time(time) => self.time = time,
            Uniform::BaseColor(color) => self.color = color,
            Uniform::Resolution(resolution) => self.resolution = resolution,
            Uniform::Pointer(mouse) => self.mouse = mouse,
            Uniform::Amplitude(amplitude) => self.amplitude = amplitude,
            Uniform::Speed(speed) => self.speed = speed,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for IridescenceUniforms {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            time: 0.0,
            resolution: [1.0, 1.0, 1.0],
            amplitude: 0.1,
            mouse: [0.5, 0.5],
            speed: 1.0,
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::UNIFORM_BLOCK_SIZE;

    #[test]
    fn matches_std140_block_size() {
        assert_eq!(std::mem::size_of::<IridescenceUniforms>(), UNIFORM_BLOCK_SIZE);
        assert_eq!(IridescenceUniforms::default().as_bytes().len(), UNIFORM_BLOCK_SIZE);
    }

    #[test]
    fn vec3_members_leave_room_for_scalars() {
        let mut uniforms = IridescenceUniforms::zeroed();
        uniforms.apply(Uniform::BaseColor([0.1, 0.2, 0.3]));
        uniforms.apply(Uniform::Time(4.0));
        uniforms.apply(Uniform::Resolution([400.0, 300.0, 4.0 / 3.0]));
        uniforms.apply(Uniform::Amplitude(0.25));
        uniforms.apply(Uniform::Pointer([0.25, 0.75]));
        uniforms.apply(Uniform::Speed(2.0));

        let floats: &[f32] = bytemuck::cast_slice(uniforms.as_bytes());
        assert_eq!(&floats[0..4], &[0.1, 0.2, 0.3, 4.0]);
        assert_eq!(&floats[4..8], &[400.0, 300.0, 4.0 / 3.0, 0.25]);
        assert_eq!(&floats[8..12], &[0.25, 0.75, 2.0, 0.0]);
    }
}
