//! Image-based lighting precompute
//!
//! Runs once before the first frame. Every table is produced by a compute
//! dispatch inside a single compute pass and one submission:
//!
//! 1. BRDF LUT (split-sum scale and bias)
//! 2. Diffuse irradiance cube
//! 3. Specular prefilter, one dispatch per mip into a packed temp texture
//! 4. Emu and Eavg energy compensation tables (optional)
//!
//! The packed specular mips are then copied face by face into the specular
//! cube, the device is drained and the temp texture destroyed.

mod layout;
mod sampling;

pub use layout::*;
pub use sampling::*;

use crate::backend::{
    BindGroupHandle, ComputePipelineHandle, GraphicsBackend, TextureCopyLocation,
};
use crate::config::IblConfig;
use crate::error::{RendererError, RendererResult};
use crate::pipeline::PipelineCache;
use crate::resources::names::*;
use crate::resources::{
    BindGroup, BindGroupFactory, FormatRegistry, GpuResource, ImageSource, ResourceFactory, ResourceInputs,
    ResourceSet,
};
use crate::shader::{TemplateKind, WORKGROUP_SIZE};
use bytemuck::{Pod, Zeroable};
use std::time::Instant;

/// GPU layout of the per-dispatch precompute parameters
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct IblParams {
    /// Output side length
    pub size: u32,
    pub sample_count: u32,
    /// Face size of the specular mip being written
    pub face_size: u32,
    /// Column of the mip inside the packed texture
    pub offset_x: u32,
    pub roughness: f32,
    pub mip_level: u32,
    pub mip_count: u32,
    pub _padding: u32,
}

/// Persistent image-based lighting inputs of the lighting pass
#[derive(Debug)]
pub struct IblResources {
    /// Environment cube and every output under both its storage and its
    /// sampled name
    pub resources: ResourceSet,
    pub specular_layout: SpecularMipLayout,
}

struct Dispatch {
    label: String,
    pipeline: ComputePipelineHandle,
    bind_group: BindGroupHandle,
    workgroups: [u32; 3],
}

fn workgroups(n: u32) -> u32 {
    (n + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
}

/// Dispatches prepared ahead of recording, with the parameter buffers and
/// bind groups they own until the device is drained
struct DispatchList<'a> {
    factory: ResourceFactory<'a>,
    cache: &'a mut PipelineCache,
    bind_groups: &'a mut BindGroupFactory,
    dispatches: Vec<Dispatch>,
    params: Vec<ResourceSet>,
    groups: Vec<BindGroup>,
}

impl<'a> DispatchList<'a> {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        label: &str,
        template: TemplateKind,
        names: &[&str],
        sources: &[&ResourceSet],
        params: IblParams,
        workgroups: [u32; 3],
    ) -> RendererResult<()> {
        let params_set = self.factory.create_resources(
            backend,
            &[IBL_PARAMS],
            &ResourceInputs::new().bytes(IBL_PARAMS, bytemuck::bytes_of(&params)),
        )?;
        self.params.push(params_set);
        let pipeline = self
            .cache
            .compute_pipeline(backend, self.bind_groups, label, template, &[names])?;

        let mut all_sources: Vec<&ResourceSet> = self.params.last().into_iter().collect();
        all_sources.extend_from_slice(sources);
        let instances = ResourceSet::gather(names, &all_sources)?;
        let group = self
            .bind_groups
            .create(backend, names, &instances, pipeline.layouts.first())?;

        self.dispatches.push(Dispatch {
            label: label.to_string(),
            pipeline: pipeline.handle,
            bind_group: group.handle,
            workgroups,
        });
        self.groups.push(group);
        Ok(())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for group in self.groups.drain(..) {
            group.release(backend);
        }
        for set in &mut self.params {
            set.release(backend);
        }
        self.params.clear();
    }
}

fn texture_width(set: &ResourceSet, name: &str) -> RendererResult<u32> {
    match set.get(name) {
        Some(GpuResource::Texture { width, .. }) => Ok(*width),
        Some(_) => Err(RendererError::ResourceKindMismatch {
            name: name.to_string(),
            expected: "texture",
        }),
        None => Err(RendererError::ResourceInstanceMissing(name.to_string())),
    }
}

/// Upload the environment cube and run the whole precompute.
///
/// `environment` holds the six faces in +X, -X, +Y, -Y, +Z, -Z order.
/// Returns once the GPU has finished and the transient resources are gone.
/// On error every resource created here is destroyed.
pub fn precompute(
    backend: &mut dyn GraphicsBackend,
    registry: &FormatRegistry,
    cache: &mut PipelineCache,
    bind_groups: &mut BindGroupFactory,
    config: &IblConfig,
    environment: &[ImageSource],
) -> RendererResult<IblResources> {
    let start = Instant::now();
    let mut resources = ResourceSet::new();
    let mut temp = ResourceSet::new();
    let mut list = DispatchList {
        factory: ResourceFactory::new(registry),
        cache,
        bind_groups,
        dispatches: Vec::new(),
        params: Vec::new(),
        groups: Vec::new(),
    };

    let result = run(backend, config, environment, &mut resources, &mut temp, &mut list);
    temp.release(backend);
    list.release(backend);

    match result {
        Ok(layout) => {
            log::info!(
                "IBL precompute finished in {:.2?}: {} dispatches, specular {}px x {} mips",
                start.elapsed(),
                list.dispatches.len(),
                layout.base_size(),
                layout.mip_count()
            );
            Ok(IblResources {
                resources,
                specular_layout: layout,
            })
        }
        Err(err) => {
            resources.release(backend);
            Err(err)
        }
    }
}

fn run(
    backend: &mut dyn GraphicsBackend,
    config: &IblConfig,
    environment: &[ImageSource],
    resources: &mut ResourceSet,
    temp: &mut ResourceSet,
    list: &mut DispatchList,
) -> RendererResult<SpecularMipLayout> {
    resources.merge(list.factory.create_resources(
        backend,
        &[ENV_MAP, ENV_SAMPLER],
        &ResourceInputs::new().images(ENV_MAP, environment.to_vec()),
    )?);
    let env_size = texture_width(resources, ENV_MAP)?;
    let base_size = config.specular_base_size.unwrap_or(env_size / 2).max(1);
    let layout = SpecularMipLayout::new(base_size, config.specular_mip_count);

    let mut outputs = vec![DIFFUSE_ENV_OUTPUT, SPECULAR_ENV, BRDF_LUT_OUTPUT];
    if config.energy_compensation {
        outputs.extend([EMU_OUTPUT, EAVG_OUTPUT]);
    }
    resources.merge(list.factory.create_resources(
        backend,
        &outputs,
        &ResourceInputs::new()
            .extent(SPECULAR_ENV, base_size, base_size)
            .mip_levels(SPECULAR_ENV, layout.mip_count()),
    )?);

    resources.alias(ENV_FACES, ENV_MAP)?;
    resources.alias(DIFFUSE_ENV, DIFFUSE_ENV_OUTPUT)?;
    resources.alias(BRDF_LUT, BRDF_LUT_OUTPUT)?;
    if config.energy_compensation {
        resources.alias(EMU, EMU_OUTPUT)?;
        resources.alias(EAVG, EAVG_OUTPUT)?;
    }

    temp.merge(list.factory.create_resources(
        backend,
        &[SPECULAR_TEMP],
        &ResourceInputs::new().extent(SPECULAR_TEMP, layout.packed_width(), base_size),
    )?);

    let lut = config.lut_size;
    list.push(
        backend,
        "BRDF LUT",
        TemplateKind::BrdfLut,
        &[BRDF_LUT_OUTPUT, IBL_PARAMS],
        &[&*resources],
        IblParams {
            size: lut,
            sample_count: config.brdf_samples,
            ..Default::default()
        },
        [workgroups(lut), workgroups(lut), 1],
    )?;

    let diffuse = config.diffuse_size;
    list.push(
        backend,
        "Diffuse Irradiance",
        TemplateKind::Irradiance,
        &[ENV_FACES, DIFFUSE_ENV_OUTPUT, IBL_PARAMS],
        &[&*resources],
        IblParams {
            size: diffuse,
            sample_count: config.diffuse_samples,
            ..Default::default()
        },
        [workgroups(diffuse), workgroups(diffuse), 6],
    )?;

    for region in layout.regions() {
        list.push(
            backend,
            &format!("Specular Prefilter mip {}", region.level),
            TemplateKind::SpecularPrefilter,
            &[ENV_FACES, SPECULAR_TEMP, IBL_PARAMS],
            &[&*resources, &*temp],
            IblParams {
                size: base_size,
                sample_count: config.specular_samples,
                face_size: region.size,
                offset_x: region.offset_x,
                roughness: layout.roughness(region.level),
                mip_level: region.level,
                mip_count: layout.mip_count(),
                _padding: 0,
            },
            [workgroups(region.size), workgroups(region.size), 6],
        )?;
    }

    if config.energy_compensation {
        let emu = config.emu_size;
        list.push(
            backend,
            "Energy Emu",
            TemplateKind::EnergyEmu,
            &[EMU_OUTPUT, IBL_PARAMS],
            &[&*resources],
            IblParams {
                size: emu,
                sample_count: config.brdf_samples,
                ..Default::default()
            },
            [workgroups(emu), workgroups(emu), 1],
        )?;
        list.push(
            backend,
            "Energy Eavg",
            TemplateKind::EnergyEavg,
            &[EAVG_OUTPUT, IBL_PARAMS],
            &[&*resources],
            IblParams {
                size: emu,
                sample_count: config.brdf_samples,
                ..Default::default()
            },
            [workgroups(emu), 1, 1],
        )?;
    }

    backend.begin_commands(Some("IBL Precompute"));
    backend.begin_compute_pass(Some("IBL Precompute"));
    for dispatch in &list.dispatches {
        log::trace!("Dispatching '{}' {:?}", dispatch.label, dispatch.workgroups);
        backend.set_compute_pipeline(dispatch.pipeline);
        backend.set_compute_bind_group(0, dispatch.bind_group);
        let [x, y, z] = dispatch.workgroups;
        backend.dispatch_compute(x, y, z);
    }
    backend.end_compute_pass();

    // Relocate the packed mips into the specular cube
    let packed = temp.texture(SPECULAR_TEMP)?;
    let specular = resources.texture(SPECULAR_ENV)?;
    for region in layout.regions() {
        for face in 0..6 {
            backend.copy_texture_to_texture(
                TextureCopyLocation {
                    texture: packed,
                    mip_level: 0,
                    origin: [region.offset_x, 0, face],
                },
                TextureCopyLocation::layer(specular, region.level, face),
                [region.size, region.size, 1],
            );
        }
    }

    backend.submit();
    backend.wait_idle()?;
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{RecordingBackend, TraceEvent};
    use crate::backend::TextureHandle;
    use crate::config::RendererConfig;
    use std::mem::size_of;
    use std::sync::Arc;

    fn environment() -> Vec<ImageSource> {
        (0..6)
            .map(|i| ImageSource::checkerboard(16, [i * 40, 0, 0, 255], [0, 0, 255, 255]))
            .collect()
    }

    fn run(config: RendererConfig) -> (RecordingBackend, RendererResult<IblResources>) {
        let registry = Arc::new(FormatRegistry::with_builtin_formats(&config));
        let mut backend = RecordingBackend::new(4, 4);
        let mut cache = PipelineCache::new();
        let mut bind_groups = BindGroupFactory::new(registry.clone());
        let result = precompute(
            &mut backend,
            &registry,
            &mut cache,
            &mut bind_groups,
            &config.ibl,
            &environment(),
        );
        (backend, result)
    }

    fn texture_named(backend: &RecordingBackend, name: &str) -> TextureHandle {
        backend
            .events()
            .iter()
            .find_map(|e| match e {
                TraceEvent::CreateTexture { handle, desc } if desc.label.as_deref() == Some(name) => Some(*handle),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_params_match_wgsl_layout() {
        assert_eq!(size_of::<IblParams>(), 32);
    }

    #[test]
    fn test_full_precompute_sequence() {
        let (backend, result) = run(RendererConfig::default());
        let ibl = result.unwrap();

        // 16px environment: specular base 8 with a 4 level chain
        assert_eq!(ibl.specular_layout.base_size(), 8);
        let mips = ibl.specular_layout.mip_count();
        assert_eq!(mips, 4);

        let dispatches = backend.count(|e| matches!(e, TraceEvent::Dispatch { .. }));
        assert_eq!(dispatches as u32, 2 + mips + 2);
        assert_eq!(
            backend.count(|e| matches!(e, TraceEvent::CreateComputePipeline { .. })),
            5
        );
        assert_eq!(
            backend.count(|e| matches!(e, TraceEvent::CopyTextureToTexture { .. })) as u32,
            6 * mips
        );
        assert_eq!(
            backend.count(|e| matches!(e, TraceEvent::BeginComputePass { .. })),
            1
        );
        assert_eq!(backend.count(|e| matches!(e, TraceEvent::Submit)), 1);
        assert!(backend.hazards().is_empty());

        for name in [ENV_MAP, DIFFUSE_ENV, SPECULAR_ENV, BRDF_LUT, EMU, EAVG, ENV_SAMPLER] {
            assert!(ibl.resources.contains(name), "{name}");
        }
        assert!(!ibl.resources.contains(SPECULAR_TEMP));
    }

    #[test]
    fn test_temp_texture_outlives_the_submission() {
        let (backend, result) = run(RendererConfig::default());
        result.unwrap();

        let temp = texture_named(&backend, SPECULAR_TEMP);
        let wait = backend.position(|e| matches!(e, TraceEvent::WaitIdle)).unwrap();
        let destroy = backend
            .position(|e| *e == TraceEvent::DestroyTexture(temp))
            .unwrap();
        let last_copy = backend
            .events()
            .iter()
            .rposition(|e| matches!(e, TraceEvent::CopyTextureToTexture { .. }))
            .unwrap();

        assert!(last_copy < wait);
        assert!(wait < destroy);
        assert!(!backend.is_texture_alive(temp));
        assert_eq!(backend.texture_descriptor(texture_named(&backend, SPECULAR_ENV)).map(|d| d.mip_levels), Some(4));
    }

    #[test]
    fn test_transient_groups_and_params_are_released() {
        let (backend, result) = run(RendererConfig::default());
        let ibl = result.unwrap();

        assert_eq!(backend.live_bind_group_count(), 0);
        assert_eq!(backend.live_view_count(), 0);
        assert_eq!(backend.live_buffer_count(), 0);
        // Environment, diffuse, specular, LUT, Emu and Eavg stay alive
        assert_eq!(backend.live_texture_count(), 6);
        assert_eq!(backend.live_sampler_count(), 1);
        assert!(ibl.resources.contains(ENV_SAMPLER));
    }

    #[test]
    fn test_failed_pipeline_releases_everything() {
        let config = RendererConfig::default();
        let registry = Arc::new(FormatRegistry::with_builtin_formats(&config));
        let mut backend = RecordingBackend::new(4, 4);
        backend.fail_pipelines_matching("Specular Prefilter");
        let mut bind_groups = BindGroupFactory::new(registry.clone());

        let err = precompute(
            &mut backend,
            &registry,
            &mut PipelineCache::new(),
            &mut bind_groups,
            &config.ibl,
            &environment(),
        )
        .unwrap_err();

        assert!(matches!(err, RendererError::PipelineBuildFailure { .. }));
        assert_eq!(backend.count(|e| matches!(e, TraceEvent::Dispatch { .. })), 0);
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.live_sampler_count(), 0);
        assert_eq!(backend.live_bind_group_count(), 0);
        assert_eq!(backend.live_view_count(), 0);
    }

    #[test]
    fn test_copies_move_each_region_into_its_mip() {
        let (backend, result) = run(RendererConfig::default());
        let ibl = result.unwrap();
        let specular = texture_named(&backend, SPECULAR_ENV);

        for region in ibl.specular_layout.regions() {
            let copies: Vec<_> = backend
                .events()
                .iter()
                .filter_map(|e| match e {
                    TraceEvent::CopyTextureToTexture {
                        source,
                        destination,
                        size,
                    } if destination.texture == specular && destination.mip_level == region.level => {
                        Some((*source, *size))
                    }
                    _ => None,
                })
                .collect();
            assert_eq!(copies.len(), 6);
            for (source, size) in copies {
                assert_eq!(source.origin[0], region.offset_x);
                assert_eq!(size, [region.size, region.size, 1]);
            }
        }
    }

    #[test]
    fn test_energy_compensation_can_be_disabled() {
        let mut config = RendererConfig::default();
        config.ibl.energy_compensation = false;
        config.ibl.specular_base_size = Some(4);
        let (backend, result) = run(config);
        let ibl = result.unwrap();

        assert!(!ibl.resources.contains(EMU));
        assert_eq!(ibl.specular_layout.mip_count(), 3);
        assert_eq!(
            backend.count(|e| matches!(e, TraceEvent::Dispatch { .. })),
            2 + 3
        );
    }

    #[test]
    fn test_wrong_face_count_fails() {
        let config = RendererConfig::default();
        let registry = Arc::new(FormatRegistry::with_builtin_formats(&config));
        let mut backend = RecordingBackend::new(4, 4);
        let mut bind_groups = BindGroupFactory::new(registry.clone());
        let faces = environment()[..5].to_vec();

        let err = precompute(
            &mut backend,
            &registry,
            &mut PipelineCache::new(),
            &mut bind_groups,
            &config.ibl,
            &faces,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RendererError::InvalidImageCount {
                expected: 6,
                actual: 5,
                ..
            }
        ));
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(backend.live_sampler_count(), 0);
    }
}
