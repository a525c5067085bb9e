//! Renderer configuration

/// Tonemapping operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TonemapOperator {
    Reinhard,
    #[default]
    Aces,
    None,
}

impl TonemapOperator {
    /// Value written into the tone mapping uniform
    pub fn shader_index(self) -> u32 {
        match self {
            TonemapOperator::Reinhard => 0,
            TonemapOperator::Aces => 1,
            TonemapOperator::None => 2,
        }
    }
}

/// Tone mapping applied when resolving the HDR target to the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapping {
    pub operator: TonemapOperator,
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for ToneMapping {
    fn default() -> Self {
        Self {
            operator: TonemapOperator::Aces,
            exposure: 1.0,
            gamma: 2.2,
        }
    }
}

/// Shadow map settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    /// Side length of the square depth texture
    pub map_size: u32,
    /// Half extent of the orthographic frustum used for directional lights
    pub ortho_extent: f32,
    pub near: f32,
    pub far: f32,
    /// Subtracted from the receiver depth before the comparison
    pub depth_bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 2048,
            ortho_extent: 20.0,
            near: 0.1,
            far: 100.0,
            depth_bias: 0.002,
        }
    }
}

/// Image-based lighting precompute settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IblConfig {
    /// Face size of the diffuse irradiance cube
    pub diffuse_size: u32,
    /// Side length of the BRDF lookup table
    pub lut_size: u32,
    /// Face size of the specular cube's first mip; half the environment when unset
    pub specular_base_size: Option<u32>,
    /// Upper bound on the specular mip chain length
    pub specular_mip_count: u32,
    pub brdf_samples: u32,
    pub diffuse_samples: u32,
    pub specular_samples: u32,
    /// Side length of the Emu table
    pub emu_size: u32,
    pub energy_compensation: bool,
}

impl Default for IblConfig {
    fn default() -> Self {
        Self {
            diffuse_size: 256,
            lut_size: 64,
            specular_base_size: None,
            specular_mip_count: 6,
            brdf_samples: 512,
            diffuse_samples: 256,
            specular_samples: 512,
            emu_size: 32,
            energy_compensation: true,
        }
    }
}

/// Configuration for the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Initial target width
    pub width: u32,
    /// Initial target height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    pub shadow: ShadowConfig,
    pub ibl: IblConfig,
    pub tone_mapping: ToneMapping,
    /// Clear color of the HDR target behind the skybox
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            shadow: ShadowConfig::default(),
            ibl: IblConfig::default(),
            tone_mapping: ToneMapping::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RendererConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn with_ibl(mut self, ibl: IblConfig) -> Self {
        self.ibl = ibl;
        self
    }

    pub fn with_tone_mapping(mut self, tone_mapping: ToneMapping) -> Self {
        self.tone_mapping = tone_mapping;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }
}
