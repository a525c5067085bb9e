//! Bind group factory
//!
//! Derives binding layouts from ordered name lists (binding index = list
//! position) and builds bind groups from resource sets. Layouts are cached
//! by name list so objects with identical resource sets share one.

use super::factory::{GpuResource, ResourceSet};
use super::registry::{FormatRegistry, ResourceFormat, TextureAccess};
use crate::backend::{
    BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry, BindGroupLayoutHandle,
    GraphicsBackend, TextureViewDescriptor, TextureViewHandle,
};
use crate::error::{RendererError, RendererResult};
use std::collections::HashMap;
use std::sync::Arc;

/// A backend layout together with the names and entries it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct BindingLayout {
    pub names: Vec<String>,
    pub entries: Vec<BindGroupLayoutEntry>,
    pub handle: BindGroupLayoutHandle,
}

/// A realized bind group
#[derive(Debug, Clone)]
pub struct BindGroup {
    pub layout: Arc<BindingLayout>,
    pub handle: BindGroupHandle,
    pub views: Vec<TextureViewHandle>,
}

impl BindGroup {
    /// Drop the group and the views it created. The layout stays cached.
    pub fn release(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.handle);
        for view in &self.views {
            backend.destroy_texture_view(*view);
        }
    }
}

/// Reject repeated names in an ordered list
pub fn check_unique(list: &str, names: &[&str]) -> RendererResult<()> {
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(RendererError::DuplicateName {
                list: list.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Layout entries for an ordered name list
pub fn layout_entries(registry: &FormatRegistry, names: &[&str]) -> RendererResult<Vec<BindGroupLayoutEntry>> {
    check_unique("bind group", names)?;
    names
        .iter()
        .enumerate()
        .map(|(binding, name)| registry.get(name)?.layout_entry(binding as u32))
        .collect()
}

/// Builds and caches binding layouts and bind groups
pub struct BindGroupFactory {
    registry: Arc<FormatRegistry>,
    layouts: HashMap<Vec<String>, Arc<BindingLayout>>,
}

impl BindGroupFactory {
    pub fn new(registry: Arc<FormatRegistry>) -> Self {
        Self {
            registry,
            layouts: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Number of distinct layouts built so far
    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    /// Build (or fetch the cached) layout for `names`
    pub fn create_layout(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        names: &[&str],
    ) -> RendererResult<Arc<BindingLayout>> {
        let key: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        if let Some(layout) = self.layouts.get(&key) {
            return Ok(layout.clone());
        }

        let entries = layout_entries(&self.registry, names)?;
        let label = names.join(", ");
        let handle = backend.create_bind_group_layout(Some(&label), &entries)?;
        log::debug!("Created bind group layout [{}]", label);

        let layout = Arc::new(BindingLayout {
            names: key.clone(),
            entries,
            handle,
        });
        self.layouts.insert(key, layout.clone());
        Ok(layout)
    }

    /// Build a bind group over exactly the resources named in `names`
    pub fn create(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        names: &[&str],
        instances: &ResourceSet,
        existing_layout: Option<&Arc<BindingLayout>>,
    ) -> RendererResult<BindGroup> {
        check_unique("bind group", names)?;
        for name in names {
            self.registry.get(name)?;
        }
        for name in names {
            if !instances.contains(name) {
                return Err(RendererError::ResourceInstanceMissing(name.to_string()));
            }
        }
        let mut extra: Vec<&str> = instances.names().filter(|n| !names.contains(n)).collect();
        extra.sort_unstable();
        if let Some(name) = extra.first() {
            return Err(RendererError::UnexpectedResourceInstance(name.to_string()));
        }

        let layout = match existing_layout {
            Some(layout) if layout.names.iter().map(String::as_str).eq(names.iter().copied()) => layout.clone(),
            Some(layout) => {
                log::warn!(
                    "Ignoring layout [{}] supplied for [{}]",
                    layout.names.join(", "),
                    names.join(", ")
                );
                self.create_layout(backend, names)?
            }
            None => self.create_layout(backend, names)?,
        };

        let mut views = Vec::new();
        let created = self
            .entries(backend, names, instances, &mut views)
            .and_then(|entries| {
                backend
                    .create_bind_group(layout.handle, &entries)
                    .map_err(RendererError::from)
            });
        match created {
            Ok(handle) => Ok(BindGroup { layout, handle, views }),
            Err(err) => {
                for view in views {
                    backend.destroy_texture_view(view);
                }
                Err(err)
            }
        }
    }

    /// Entries in binding order, creating a view per texture into `views`
    fn entries(
        &self,
        backend: &mut dyn GraphicsBackend,
        names: &[&str],
        instances: &ResourceSet,
        views: &mut Vec<TextureViewHandle>,
    ) -> RendererResult<Vec<(u32, BindGroupEntry)>> {
        let mut entries = Vec::with_capacity(names.len());
        for (binding, name) in names.iter().enumerate() {
            let desc = self.registry.get(name)?;
            let resource = instances
                .get(name)
                .ok_or_else(|| RendererError::ResourceInstanceMissing(name.to_string()))?;

            let entry = match (&desc.format, resource) {
                (ResourceFormat::Buffer { .. }, GpuResource::Buffer { handle, .. }) => BindGroupEntry::Buffer {
                    buffer: *handle,
                    offset: 0,
                    size: None,
                },
                (ResourceFormat::Texture { access, .. }, GpuResource::Texture { handle, .. }) => {
                    let mut view_desc = TextureViewDescriptor::with_dimension(desc.kind.view_dimension());
                    view_desc.label = Some(name.to_string());
                    if matches!(access, TextureAccess::StorageWrite) {
                        view_desc.mip_level_count = Some(1);
                    }
                    let view = backend.create_texture_view(*handle, &view_desc)?;
                    views.push(view);
                    match access {
                        TextureAccess::Sampled(_) => BindGroupEntry::Texture(view),
                        TextureAccess::StorageWrite => BindGroupEntry::StorageTexture(view),
                    }
                }
                (ResourceFormat::Sampler { .. }, GpuResource::Sampler(sampler)) => BindGroupEntry::Sampler(*sampler),
                (_, _) => {
                    return Err(RendererError::ResourceKindMismatch {
                        name: name.to_string(),
                        expected: desc.kind.as_str(),
                    })
                }
            };
            entries.push((binding as u32, entry));
        }
        Ok(entries)
    }
}
