//! Resource format registry
//!
//! Maps a logical resource name to the GPU object kind, usage, default
//! extent and binding-layout shape. Factories and the shader generator
//! resolve every name through one registry instance.

use crate::backend::{
    BindGroupLayoutEntry, BindingType, BufferUsage, SamplerBindingType, SamplerDescriptor,
    ShaderStageFlags, TextureFormat, TextureSampleType, TextureUsage, TextureViewDimension,
};
use crate::error::{RendererError, RendererResult};
use std::collections::HashMap;

/// GPU object kind behind a logical name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    TextureArray,
    CubeTexture,
    Sampler,
}

impl ResourceKind {
    /// View dimension used when binding a texture of this kind
    pub fn view_dimension(self) -> TextureViewDimension {
        match self {
            ResourceKind::TextureArray => TextureViewDimension::D2Array,
            ResourceKind::CubeTexture => TextureViewDimension::Cube,
            _ => TextureViewDimension::D2,
        }
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            ResourceKind::Texture | ResourceKind::TextureArray | ResourceKind::CubeTexture
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::TextureArray => "texture array",
            ResourceKind::CubeTexture => "cube texture",
            ResourceKind::Sampler => "sampler",
        }
    }
}

/// How a buffer appears in a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBinding {
    Uniform,
    Storage { read_only: bool },
    /// Vertex and index buffers are never bound through a group
    Unbound,
}

/// How a texture appears in a bind group
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureAccess {
    Sampled(TextureSampleType),
    /// Write-only storage texture for compute output
    StorageWrite,
}

/// Kind-specific part of a descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceFormat {
    Buffer {
        usage: BufferUsage,
        default_size: u64,
        binding: BufferBinding,
    },
    Texture {
        format: TextureFormat,
        usage: TextureUsage,
        extent: (u32, u32),
        /// Fixed layer count; cubes always have six
        layers: Option<u32>,
        mip_levels: u32,
        access: TextureAccess,
        /// Filled by GPU copies rather than CPU uploads
        copy_target: bool,
    },
    Sampler {
        desc: SamplerDescriptor,
        binding: SamplerBindingType,
    },
}

/// Everything the factories need to know about one logical resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub name: String,
    pub kind: ResourceKind,
    pub visibility: ShaderStageFlags,
    pub format: ResourceFormat,
}

impl ResourceDescriptor {
    fn buffer(name: &str, usage: BufferUsage, size: u64, binding: BufferBinding, visibility: ShaderStageFlags) -> Self {
        Self {
            name: name.to_string(),
            kind: ResourceKind::Buffer,
            visibility,
            format: ResourceFormat::Buffer {
                usage,
                default_size: size,
                binding,
            },
        }
    }

    /// Uniform buffer rewritten from the CPU
    pub fn uniform(name: &str, size: u64, visibility: ShaderStageFlags) -> Self {
        Self::buffer(
            name,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            size,
            BufferBinding::Uniform,
            visibility,
        )
    }

    /// Read-only storage buffer rewritten from the CPU
    pub fn storage(name: &str, size: u64, visibility: ShaderStageFlags) -> Self {
        Self::buffer(
            name,
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
            size,
            BufferBinding::Storage { read_only: true },
            visibility,
        )
    }

    pub fn vertex(name: &str) -> Self {
        Self::buffer(
            name,
            BufferUsage::VERTEX | BufferUsage::COPY_DST,
            0,
            BufferBinding::Unbound,
            ShaderStageFlags::VERTEX,
        )
    }

    pub fn index(name: &str) -> Self {
        Self::buffer(
            name,
            BufferUsage::INDEX | BufferUsage::COPY_DST,
            0,
            BufferBinding::Unbound,
            ShaderStageFlags::VERTEX,
        )
    }

    fn texture_of(name: &str, kind: ResourceKind, format: TextureFormat, visibility: ShaderStageFlags) -> Self {
        let filterable = !matches!(format, TextureFormat::R32Float | TextureFormat::Rg32Float | TextureFormat::Rgba32Float);
        let sample_type = if format.is_depth() {
            TextureSampleType::Depth
        } else {
            TextureSampleType::Float { filterable }
        };
        Self {
            name: name.to_string(),
            kind,
            visibility,
            format: ResourceFormat::Texture {
                format,
                usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
                extent: (1, 1),
                layers: (kind == ResourceKind::CubeTexture).then_some(6),
                mip_levels: 1,
                access: TextureAccess::Sampled(sample_type),
                copy_target: false,
            },
        }
    }

    /// Sampled 2D texture uploaded from an image
    pub fn texture(name: &str, format: TextureFormat, visibility: ShaderStageFlags) -> Self {
        Self::texture_of(name, ResourceKind::Texture, format, visibility)
    }

    /// Sampled 2D array uploaded from N images
    pub fn texture_array(name: &str, format: TextureFormat, visibility: ShaderStageFlags) -> Self {
        Self::texture_of(name, ResourceKind::TextureArray, format, visibility)
    }

    /// Sampled cube uploaded from six images
    pub fn cube_texture(name: &str, format: TextureFormat, visibility: ShaderStageFlags) -> Self {
        Self::texture_of(name, ResourceKind::CubeTexture, format, visibility)
    }

    /// Write-only compute output. 2D outputs bind as `texture_storage_2d`,
    /// array outputs as `texture_storage_2d_array`.
    pub fn storage_texture(name: &str, kind: ResourceKind, format: TextureFormat) -> Self {
        let mut desc = Self::texture_of(name, kind, format, ShaderStageFlags::COMPUTE);
        if let ResourceFormat::Texture { usage, access, .. } = &mut desc.format {
            *usage = TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_SRC;
            *access = TextureAccess::StorageWrite;
        }
        desc
    }

    /// Render attachment that later passes sample
    pub fn render_target(name: &str, format: TextureFormat, visibility: ShaderStageFlags) -> Self {
        let mut desc = Self::texture_of(name, ResourceKind::Texture, format, visibility);
        if let ResourceFormat::Texture { usage, access, .. } = &mut desc.format {
            *usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
            if format.is_depth() {
                *access = TextureAccess::Sampled(TextureSampleType::Depth);
            } else {
                *access = TextureAccess::Sampled(TextureSampleType::Float { filterable: false });
            }
        }
        desc
    }

    pub fn sampler(name: &str, desc: SamplerDescriptor, binding: SamplerBindingType, visibility: ShaderStageFlags) -> Self {
        Self {
            name: name.to_string(),
            kind: ResourceKind::Sampler,
            visibility,
            format: ResourceFormat::Sampler { desc, binding },
        }
    }

    pub fn with_extent(mut self, width: u32, height: u32) -> Self {
        if let ResourceFormat::Texture { extent, .. } = &mut self.format {
            *extent = (width.max(1), height.max(1));
        }
        self
    }

    pub fn with_layers(mut self, count: u32) -> Self {
        if let ResourceFormat::Texture { layers, .. } = &mut self.format {
            *layers = Some(count);
        }
        self
    }

    pub fn with_mip_levels(mut self, count: u32) -> Self {
        if let ResourceFormat::Texture { mip_levels, .. } = &mut self.format {
            *mip_levels = count.max(1);
        }
        self
    }

    pub fn with_sample_type(mut self, sample_type: TextureSampleType) -> Self {
        if let ResourceFormat::Texture { access, .. } = &mut self.format {
            *access = TextureAccess::Sampled(sample_type);
        }
        self
    }

    pub fn with_texture_usage(mut self, extra: TextureUsage) -> Self {
        if let ResourceFormat::Texture { usage, .. } = &mut self.format {
            *usage |= extra;
        }
        self
    }

    /// Mark a COPY_DST texture as filled by texture-to-texture copies
    pub fn as_copy_target(mut self) -> Self {
        if let ResourceFormat::Texture { usage, copy_target, .. } = &mut self.format {
            *usage |= TextureUsage::COPY_DST;
            *copy_target = true;
        }
        self
    }

    pub fn with_visibility(mut self, visibility: ShaderStageFlags) -> Self {
        self.visibility = visibility;
        self
    }

    /// Whether creation must be given CPU data to upload
    pub fn requires_data(&self) -> bool {
        match &self.format {
            ResourceFormat::Buffer { usage, .. } => usage.contains(BufferUsage::COPY_DST),
            ResourceFormat::Texture {
                usage, copy_target, ..
            } => usage.contains(TextureUsage::COPY_DST) && !copy_target,
            ResourceFormat::Sampler { .. } => false,
        }
    }

    /// Texel format of a texture descriptor
    pub fn texture_format(&self) -> Option<TextureFormat> {
        match &self.format {
            ResourceFormat::Texture { format, .. } => Some(*format),
            _ => None,
        }
    }

    /// Layout entry for this resource at `binding`
    pub fn layout_entry(&self, binding: u32) -> RendererResult<BindGroupLayoutEntry> {
        let ty = match &self.format {
            ResourceFormat::Buffer { binding: kind, .. } => match kind {
                BufferBinding::Uniform => BindingType::UniformBuffer,
                BufferBinding::Storage { read_only } => BindingType::StorageBuffer {
                    read_only: *read_only,
                },
                BufferBinding::Unbound => {
                    return Err(RendererError::ResourceKindMismatch {
                        name: self.name.clone(),
                        expected: "bindable buffer",
                    })
                }
            },
            ResourceFormat::Texture { format, access, .. } => match access {
                TextureAccess::Sampled(sample_type) => BindingType::Texture {
                    sample_type: *sample_type,
                    view_dimension: self.kind.view_dimension(),
                },
                TextureAccess::StorageWrite => BindingType::StorageTexture {
                    format: *format,
                    view_dimension: self.kind.view_dimension(),
                },
            },
            ResourceFormat::Sampler { binding: kind, .. } => BindingType::Sampler(*kind),
        };

        Ok(BindGroupLayoutEntry {
            binding,
            visibility: self.visibility,
            ty,
        })
    }
}

/// Name-keyed descriptor table, built once per renderer
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    descriptors: HashMap<String, ResourceDescriptor>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge descriptors into the registry; an existing name is overwritten
    pub fn register_formats(&mut self, table: impl IntoIterator<Item = ResourceDescriptor>) {
        for desc in table {
            if self.descriptors.contains_key(&desc.name) {
                log::debug!("Overriding resource format '{}'", desc.name);
            }
            self.descriptors.insert(desc.name.clone(), desc);
        }
    }

    pub fn register(&mut self, desc: ResourceDescriptor) {
        self.register_formats(std::iter::once(desc));
    }

    pub fn get(&self, name: &str) -> RendererResult<&ResourceDescriptor> {
        self.descriptors
            .get(name)
            .ok_or_else(|| RendererError::UnknownResourceName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_overwrites_existing_name() {
        let mut registry = FormatRegistry::new();
        registry.register(ResourceDescriptor::uniform("camera", 64, ShaderStageFlags::VERTEX));
        registry.register(ResourceDescriptor::uniform("camera", 352, ShaderStageFlags::VERTEX_FRAGMENT));

        assert_eq!(registry.len(), 1);
        let desc = registry.get("camera").unwrap();
        assert_eq!(desc.visibility, ShaderStageFlags::VERTEX_FRAGMENT);
        assert!(matches!(desc.format, ResourceFormat::Buffer { default_size: 352, .. }));
    }

    #[test]
    fn test_unknown_name() {
        let registry = FormatRegistry::new();
        assert_eq!(
            registry.get("nope").unwrap_err(),
            RendererError::UnknownResourceName("nope".into())
        );
    }

    #[test]
    fn test_cube_layout_entry_uses_cube_view() {
        let desc = ResourceDescriptor::cube_texture("env_map", TextureFormat::Rgba8UnormSrgb, ShaderStageFlags::FRAGMENT);
        let entry = desc.layout_entry(3).unwrap();
        assert_eq!(entry.binding, 3);
        assert_eq!(
            entry.ty,
            BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: true },
                view_dimension: TextureViewDimension::Cube,
            }
        );
    }

    #[test]
    fn test_copy_target_does_not_require_data() {
        let plain = ResourceDescriptor::cube_texture("env", TextureFormat::Rgba16Float, ShaderStageFlags::FRAGMENT);
        assert!(plain.requires_data());
        assert!(!plain.clone().as_copy_target().requires_data());
        let target = ResourceDescriptor::render_target("depth", TextureFormat::Depth32Float, ShaderStageFlags::FRAGMENT);
        assert!(!target.requires_data());
    }

    #[test]
    fn test_vertex_buffers_are_not_bindable() {
        let desc = ResourceDescriptor::vertex("position");
        assert!(matches!(
            desc.layout_entry(0),
            Err(RendererError::ResourceKindMismatch { .. })
        ));
    }
}
