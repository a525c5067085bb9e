//! Resource factory
//!
//! Turns an ordered list of logical names plus CPU data into GPU buffers,
//! textures and samplers, uploading data as it goes.

use super::registry::{FormatRegistry, ResourceDescriptor, ResourceFormat, ResourceKind};
use super::texture::{DecodedImage, ImageSource};
use crate::backend::{
    BufferDescriptor, BufferHandle, GraphicsBackend, SamplerHandle, TextureCopyLocation,
    TextureDescriptor, TextureFormat, TextureHandle,
};
use crate::error::{RendererError, RendererResult};
use std::collections::HashMap;

/// A realized GPU object bound to one logical name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResource {
    Buffer {
        handle: BufferHandle,
        size: u64,
    },
    Texture {
        handle: TextureHandle,
        width: u32,
        height: u32,
        layers: u32,
        mip_levels: u32,
    },
    Sampler(SamplerHandle),
}

impl GpuResource {
    pub fn kind_str(&self) -> &'static str {
        match self {
            GpuResource::Buffer { .. } => "buffer",
            GpuResource::Texture { .. } => "texture",
            GpuResource::Sampler(_) => "sampler",
        }
    }
}

/// Name-keyed resource instances owned by one component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    entries: HashMap<String, GpuResource>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, resource: GpuResource) {
        self.entries.insert(name.to_string(), resource);
    }

    pub fn get(&self, name: &str) -> Option<&GpuResource> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn buffer(&self, name: &str) -> RendererResult<BufferHandle> {
        match self.entries.get(name) {
            Some(GpuResource::Buffer { handle, .. }) => Ok(*handle),
            Some(_) => Err(RendererError::ResourceKindMismatch {
                name: name.to_string(),
                expected: "buffer",
            }),
            None => Err(RendererError::ResourceInstanceMissing(name.to_string())),
        }
    }

    pub fn texture(&self, name: &str) -> RendererResult<TextureHandle> {
        match self.entries.get(name) {
            Some(GpuResource::Texture { handle, .. }) => Ok(*handle),
            Some(_) => Err(RendererError::ResourceKindMismatch {
                name: name.to_string(),
                expected: "texture",
            }),
            None => Err(RendererError::ResourceInstanceMissing(name.to_string())),
        }
    }

    /// Bind `alias` to the same GPU object as `name`
    pub fn alias(&mut self, alias: &str, name: &str) -> RendererResult<()> {
        let resource = *self
            .entries
            .get(name)
            .ok_or_else(|| RendererError::ResourceInstanceMissing(name.to_string()))?;
        self.entries.insert(alias.to_string(), resource);
        Ok(())
    }

    /// Take over every entry of `other`
    pub fn merge(&mut self, other: ResourceSet) {
        self.entries.extend(other.entries);
    }

    /// Collect `names` from several owners into one set for a bind group.
    /// Earlier sources win when a name appears twice.
    pub fn gather(names: &[&str], sources: &[&ResourceSet]) -> RendererResult<ResourceSet> {
        let mut set = ResourceSet::new();
        for name in names {
            let resource = sources
                .iter()
                .find_map(|source| source.get(name))
                .ok_or_else(|| RendererError::ResourceInstanceMissing(name.to_string()))?;
            set.insert(name, *resource);
        }
        Ok(set)
    }

    /// Destroy every buffer, texture and sampler and forget all entries.
    /// Aliased objects are destroyed once.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        let mut buffers: Vec<BufferHandle> = Vec::new();
        let mut textures: Vec<TextureHandle> = Vec::new();
        let mut samplers: Vec<SamplerHandle> = Vec::new();
        for resource in self.entries.values() {
            match resource {
                GpuResource::Buffer { handle, .. } => buffers.push(*handle),
                GpuResource::Texture { handle, .. } => textures.push(*handle),
                GpuResource::Sampler(handle) => samplers.push(*handle),
            }
        }
        buffers.sort();
        buffers.dedup();
        textures.sort();
        textures.dedup();
        samplers.sort();
        samplers.dedup();

        for buffer in buffers {
            backend.destroy_buffer(buffer);
        }
        for texture in textures {
            backend.destroy_texture(texture);
        }
        for sampler in samplers {
            backend.destroy_sampler(sampler);
        }
        self.entries.clear();
    }
}

/// CPU-side data for one resource
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    Bytes(Vec<u8>),
    Images(Vec<ImageSource>),
}

/// Inputs to [`ResourceFactory::create_resources`]: data and extent
/// overrides keyed by name
#[derive(Debug, Clone, Default)]
pub struct ResourceInputs {
    data: HashMap<String, ResourceData>,
    extents: HashMap<String, (u32, u32)>,
    mip_levels: HashMap<String, u32>,
}

impl ResourceInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.data.insert(name.to_string(), ResourceData::Bytes(bytes.into()));
        self
    }

    pub fn images(mut self, name: &str, images: Vec<ImageSource>) -> Self {
        self.data.insert(name.to_string(), ResourceData::Images(images));
        self
    }

    /// Allocate `name` at this extent instead of the descriptor default
    pub fn extent(mut self, name: &str, width: u32, height: u32) -> Self {
        self.extents.insert(name.to_string(), (width.max(1), height.max(1)));
        self
    }

    pub fn mip_levels(mut self, name: &str, count: u32) -> Self {
        self.mip_levels.insert(name.to_string(), count.max(1));
        self
    }

    pub fn set_bytes(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.data.insert(name.to_string(), ResourceData::Bytes(bytes.into()));
    }

    pub fn set_images(&mut self, name: &str, images: Vec<ImageSource>) {
        self.data.insert(name.to_string(), ResourceData::Images(images));
    }
}

/// Allocates and uploads GPU resources described by a registry
pub struct ResourceFactory<'a> {
    registry: &'a FormatRegistry,
}

impl<'a> ResourceFactory<'a> {
    pub fn new(registry: &'a FormatRegistry) -> Self {
        Self { registry }
    }

    /// Create one GPU object per name. Every supplied datum must belong to
    /// a requested name. On error nothing created by this call survives.
    pub fn create_resources(
        &self,
        backend: &mut dyn GraphicsBackend,
        names: &[&str],
        inputs: &ResourceInputs,
    ) -> RendererResult<ResourceSet> {
        for name in names {
            self.registry.get(name)?;
        }
        if let Some(extra) = inputs.data.keys().find(|key| !names.contains(&key.as_str())) {
            return Err(RendererError::UnexpectedResourceInstance(extra.clone()));
        }

        let mut set = ResourceSet::new();
        if let Err(err) = self.fill(backend, &mut set, names, inputs) {
            set.release(backend);
            return Err(err);
        }
        Ok(set)
    }

    fn fill(
        &self,
        backend: &mut dyn GraphicsBackend,
        set: &mut ResourceSet,
        names: &[&str],
        inputs: &ResourceInputs,
    ) -> RendererResult<()> {
        for name in names {
            if set.contains(name) {
                return Err(RendererError::DuplicateName {
                    list: "resource list".into(),
                    name: name.to_string(),
                });
            }
            let desc = self.registry.get(name)?;
            let resource = self.create_one(backend, desc, inputs)?;
            set.insert(name, resource);
        }
        Ok(())
    }

    fn create_one(
        &self,
        backend: &mut dyn GraphicsBackend,
        desc: &ResourceDescriptor,
        inputs: &ResourceInputs,
    ) -> RendererResult<GpuResource> {
        let data = inputs.data.get(&desc.name);
        match &desc.format {
            ResourceFormat::Buffer {
                usage,
                default_size,
                ..
            } => {
                let bytes = match data {
                    Some(ResourceData::Bytes(bytes)) => Some(bytes.as_slice()),
                    Some(ResourceData::Images(_)) => {
                        return Err(RendererError::ResourceKindMismatch {
                            name: desc.name.clone(),
                            expected: "texture",
                        })
                    }
                    None if desc.requires_data() => {
                        return Err(RendererError::MissingResourceData(desc.name.clone()))
                    }
                    None => None,
                };

                let size = align_to_four(bytes.map_or(*default_size, |b| b.len() as u64));
                let buffer_desc = BufferDescriptor {
                    label: Some(desc.name.clone()),
                    size,
                    usage: *usage,
                    mapped_at_creation: false,
                };
                let handle = match bytes {
                    Some(bytes) if bytes.len() as u64 == size => backend.create_buffer_init(&buffer_desc, bytes)?,
                    Some(bytes) => {
                        let mut padded = bytes.to_vec();
                        padded.resize(size as usize, 0);
                        backend.create_buffer_init(&buffer_desc, &padded)?
                    }
                    None => backend.create_buffer(&buffer_desc)?,
                };
                log::debug!("Created buffer '{}' ({} bytes)", desc.name, size);
                Ok(GpuResource::Buffer { handle, size })
            }
            ResourceFormat::Texture { .. } => {
                let images = match data {
                    Some(ResourceData::Images(images)) => Some(images.as_slice()),
                    Some(ResourceData::Bytes(_)) => {
                        return Err(RendererError::ResourceKindMismatch {
                            name: desc.name.clone(),
                            expected: "buffer",
                        })
                    }
                    None => None,
                };
                self.create_texture(backend, desc, images, inputs)
            }
            ResourceFormat::Sampler { desc: sampler, .. } => {
                if data.is_some() {
                    return Err(RendererError::ResourceKindMismatch {
                        name: desc.name.clone(),
                        expected: "sampler without data",
                    });
                }
                let mut sampler = sampler.clone();
                sampler.label = Some(desc.name.clone());
                Ok(GpuResource::Sampler(backend.create_sampler(&sampler)?))
            }
        }
    }

    fn create_texture(
        &self,
        backend: &mut dyn GraphicsBackend,
        desc: &ResourceDescriptor,
        images: Option<&[ImageSource]>,
        inputs: &ResourceInputs,
    ) -> RendererResult<GpuResource> {
        let ResourceFormat::Texture {
            format,
            usage,
            extent,
            layers,
            mip_levels,
            ..
        } = &desc.format
        else {
            return Err(RendererError::ResourceKindMismatch {
                name: desc.name.clone(),
                expected: "texture",
            });
        };

        let images = images.unwrap_or(&[]);
        if images.is_empty() && desc.requires_data() {
            return Err(RendererError::MissingResourceData(desc.name.clone()));
        }

        let expected_layers = match desc.kind {
            ResourceKind::CubeTexture => 6,
            ResourceKind::TextureArray => layers.unwrap_or(images.len().max(1) as u32),
            _ => 1,
        } as usize;
        if !images.is_empty() && images.len() != expected_layers {
            return Err(RendererError::InvalidImageCount {
                name: desc.name.clone(),
                expected: expected_layers,
                actual: images.len(),
            });
        }

        let decoded = images
            .iter()
            .map(|image| image.decode(&desc.name))
            .collect::<RendererResult<Vec<_>>>()?;

        let (width, height) = match decoded.first() {
            Some(first) => (first.width, first.height),
            None => inputs.extents.get(&desc.name).copied().unwrap_or(*extent),
        };
        if decoded.iter().any(|img| img.width != width || img.height != height) {
            return Err(RendererError::ImageSizeMismatch {
                name: desc.name.clone(),
            });
        }
        let mip_levels = inputs.mip_levels.get(&desc.name).copied().unwrap_or(*mip_levels);
        let layers = decoded
            .iter()
            .map(|image| texel_bytes(&desc.name, image, *format))
            .collect::<RendererResult<Vec<_>>>()?;

        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(desc.name.clone()),
            width,
            height,
            array_layers: expected_layers as u32,
            mip_levels,
            format: *format,
            usage: *usage,
        })?;

        for (layer, bytes) in layers.into_iter().enumerate() {
            backend.write_texture(
                TextureCopyLocation::layer(handle, 0, layer as u32),
                bytes,
                width * format.bytes_per_pixel(),
                width,
                height,
            );
        }

        log::debug!(
            "Created {} '{}' {}x{} with {} layer(s), {} uploaded",
            desc.kind.as_str(),
            desc.name,
            width,
            height,
            expected_layers,
            decoded.len()
        );

        Ok(GpuResource::Texture {
            handle,
            width,
            height,
            layers: expected_layers as u32,
            mip_levels,
        })
    }
}

/// Check decoded bytes fit the destination format
fn texel_bytes<'i>(name: &str, image: &'i DecodedImage, format: TextureFormat) -> RendererResult<&'i [u8]> {
    let rgba8_family = matches!(
        format,
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb
    );
    if image.rgba8 && !rgba8_family {
        return Err(RendererError::ImageDecode {
            name: name.to_string(),
            message: format!("8-bit RGBA pixels cannot fill a {:?} texture", format),
        });
    }

    let expected = image.width as usize * image.height as usize * format.bytes_per_pixel() as usize;
    if image.bytes.len() != expected {
        return Err(RendererError::ImageDecode {
            name: name.to_string(),
            message: format!("expected {} bytes of texel data, got {}", expected, image.bytes.len()),
        });
    }
    Ok(&image.bytes)
}

fn align_to_four(size: u64) -> u64 {
    size.max(4).div_ceil(4) * 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{RecordingBackend, TraceEvent};
    use crate::backend::ShaderStageFlags;
    use crate::resources::ResourceDescriptor;

    fn registry() -> FormatRegistry {
        let mut registry = FormatRegistry::new();
        registry.register_formats([
            ResourceDescriptor::uniform("camera", 352, ShaderStageFlags::VERTEX_FRAGMENT),
            ResourceDescriptor::cube_texture("env_map", TextureFormat::Rgba8UnormSrgb, ShaderStageFlags::FRAGMENT),
            ResourceDescriptor::texture_array("layers", TextureFormat::Rgba8Unorm, ShaderStageFlags::FRAGMENT),
            ResourceDescriptor::render_target("depth", TextureFormat::Depth32Float, ShaderStageFlags::FRAGMENT)
                .with_extent(64, 32),
        ]);
        registry
    }

    fn faces(count: usize) -> Vec<ImageSource> {
        (0..count).map(|_| ImageSource::checkerboard(4, [0; 4], [255; 4])).collect()
    }

    #[test]
    fn test_buffer_is_sized_to_data_and_uploaded() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let set = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["camera"], &ResourceInputs::new().bytes("camera", vec![0u8; 10]))
            .unwrap();

        assert!(matches!(set.get("camera"), Some(GpuResource::Buffer { size: 12, .. })));
        assert_eq!(
            backend.count(|e| matches!(e, TraceEvent::CreateBuffer { initialized: true, .. })),
            1
        );
    }

    #[test]
    fn test_copy_dst_buffer_without_data_fails() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let err = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["camera"], &ResourceInputs::new())
            .unwrap_err();
        assert_eq!(err, RendererError::MissingResourceData("camera".into()));
    }

    #[test]
    fn test_cube_writes_six_faces() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let set = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["env_map"], &ResourceInputs::new().images("env_map", faces(6)))
            .unwrap();

        assert!(matches!(set.get("env_map"), Some(GpuResource::Texture { layers: 6, width: 4, .. })));
        assert_eq!(backend.count(|e| matches!(e, TraceEvent::WriteTexture { .. })), 6);
    }

    #[test]
    fn test_cube_with_five_faces_fails() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let err = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["env_map"], &ResourceInputs::new().images("env_map", faces(5)))
            .unwrap_err();
        assert_eq!(
            err,
            RendererError::InvalidImageCount {
                name: "env_map".into(),
                expected: 6,
                actual: 5,
            }
        );
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_failure_releases_earlier_resources() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let err = ResourceFactory::new(&registry)
            .create_resources(
                &mut backend,
                &["camera", "depth", "env_map"],
                &ResourceInputs::new()
                    .bytes("camera", vec![0u8; 352])
                    .images("env_map", faces(5)),
            )
            .unwrap_err();

        assert!(matches!(err, RendererError::InvalidImageCount { actual: 5, .. }));
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_bad_texel_data_creates_no_texture() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let raw = ImageSource::Raw {
            width: 4,
            height: 4,
            bytes: vec![0u8; 3],
        };
        let err = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["layers"], &ResourceInputs::new().images("layers", vec![raw]))
            .unwrap_err();

        assert!(matches!(err, RendererError::ImageDecode { .. }));
        assert_eq!(backend.count(|e| matches!(e, TraceEvent::CreateTexture { .. })), 0);
    }

    #[test]
    fn test_huge_texel_size_does_not_overflow() {
        let image = DecodedImage {
            width: 1 << 16,
            height: 1 << 16,
            bytes: Vec::new(),
            rgba8: false,
        };
        let err = texel_bytes("huge", &image, TextureFormat::Rgba32Float).unwrap_err();
        match err {
            RendererError::ImageDecode { message, .. } => assert!(message.contains("68719476736"), "{message}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_array_takes_layer_count_from_images() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let set = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["layers"], &ResourceInputs::new().images("layers", faces(3)))
            .unwrap();
        assert!(matches!(set.get("layers"), Some(GpuResource::Texture { layers: 3, .. })));
        assert_eq!(backend.count(|e| matches!(e, TraceEvent::WriteTexture { .. })), 3);
    }

    #[test]
    fn test_mismatched_layer_sizes_fail() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let mut images = faces(2);
        images.push(ImageSource::checkerboard(8, [0; 4], [255; 4]));
        let err = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["layers"], &ResourceInputs::new().images("layers", images))
            .unwrap_err();
        assert_eq!(err, RendererError::ImageSizeMismatch { name: "layers".into() });
    }

    #[test]
    fn test_render_target_uses_default_extent_or_override() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let factory = ResourceFactory::new(&registry);

        let set = factory
            .create_resources(&mut backend, &["depth"], &ResourceInputs::new())
            .unwrap();
        assert!(matches!(set.get("depth"), Some(GpuResource::Texture { width: 64, height: 32, .. })));

        let set = factory
            .create_resources(&mut backend, &["depth"], &ResourceInputs::new().extent("depth", 10, 20))
            .unwrap();
        assert!(matches!(set.get("depth"), Some(GpuResource::Texture { width: 10, height: 20, .. })));
    }

    #[test]
    fn test_unknown_name_and_stray_data_fail() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let factory = ResourceFactory::new(&registry);

        let err = factory
            .create_resources(&mut backend, &["missing"], &ResourceInputs::new())
            .unwrap_err();
        assert_eq!(err, RendererError::UnknownResourceName("missing".into()));

        let err = factory
            .create_resources(&mut backend, &["depth"], &ResourceInputs::new().bytes("camera", vec![0u8; 4]))
            .unwrap_err();
        assert_eq!(err, RendererError::UnexpectedResourceInstance("camera".into()));
    }

    #[test]
    fn test_release_destroys_aliased_texture_once() {
        let registry = registry();
        let mut backend = RecordingBackend::new(8, 8);
        let mut set = ResourceFactory::new(&registry)
            .create_resources(&mut backend, &["depth"], &ResourceInputs::new())
            .unwrap();
        set.alias("depth_alias", "depth").unwrap();
        set.release(&mut backend);

        assert!(set.is_empty());
        assert_eq!(backend.count(|e| matches!(e, TraceEvent::DestroyTexture(_))), 1);
        assert_eq!(backend.live_texture_count(), 0);
    }
}
