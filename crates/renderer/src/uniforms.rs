use crate::types::SessionConfig;

/// Shader resolution. The aspect ratio is always derived from the size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    width: f32,
    height: f32,
    aspect: f32,
}

impl Resolution {
    pub fn new(width: f32, height: f32) -> Self {
        let aspect = if height > 0.0 { width / height } else { 0.0 };
        Self {
            width,
            height,
            aspect,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn as_vec3(&self) -> [f32; 3] {
        [self.width, self.height, self.aspect]
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// One named shader parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    Time(f32),
    BaseColor([f32; 3]),
    Resolution([f32; 3]),
    Pointer([f32; 2]),
    Amplitude(f32),
    Speed(f32),
}

impl Uniform {
    /// Name of the uniform in the shader source.
    pub fn name(&self) -> &'static str {
        match self {
            Uniform::Time(_) => "uTime",
            Uniform::BaseColor(_) => "uColor",
            Uniform::Resolution(_) => "uResolution",
            Uniform::Pointer(_) => "uMouse",
            Uniform::Amplitude(_) => "uAmplitude",
            Uniform::Speed(_) => "uSpeed",
        }
    }
}

/// External parameters of the iridescence shader for the active session.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformState {
    time: f32,
    base_color: [f32; 3],
    resolution: Resolution,
    pointer: [f32; 2],
    amplitude: f32,
    speed: f32,
}

impl UniformState {
    pub fn new(base_color: [f32; 3], amplitude: f32, speed: f32) -> Self {
        Self {
            time: 0.0,
            base_color,
            resolution: Resolution::default(),
            pointer: [0.5, 0.5],
            amplitude,
            speed,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.color, config.amplitude, config.speed)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Advances the shader clock. Time never moves backwards.
    pub fn set_time(&mut self, seconds: f32) {
        if seconds > self.time {
            self.time = seconds;
        }
    }

    pub fn base_color(&self) -> [f32; 3] {
        self.base_color
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn set_resolution(&mut self, width: f32, height: f32) {
        self.resolution = Resolution::new(width, height);
    }

    pub fn pointer(&self) -> [f32; 2] {
        self.pointer
    }

    pub fn set_pointer(&mut self, pointer: [f32; 2]) {
        self.pointer = pointer;
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// All uniforms in upload order.
    pub fn uniforms(&self) -> [Uniform; 6] {
        [
            Uniform::Time(self.time),
            Uniform::BaseColor(self.base_color),
            Uniform::Resolution(self.resolution.as_vec3()),
            Uniform::Pointer(self.pointer),
            Uniform::Amplitude(self.amplitude),
            Uniform::Speed(self.speed),
        ]
    }
}

impl Default for UniformState {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
