//! Deferred Renderer - a deferred PBR renderer built around a render graph
//!
//! # Features
//! - Declarative resource format registry with a resource and bind group factory
//! - Shader variant generation from WGSL templates, validated with naga
//! - Shadow, geometry, deferred lighting and tonemapping passes replaying
//!   pre-recorded render bundles
//! - Image-based lighting precompute (irradiance, specular mip chain, BRDF
//!   LUT, multi-bounce energy compensation)
//! - wgpu backend, plus a recording backend for GPU-free tests
//!
//! # Example
//!
//! ```ignore
//! use deferred_renderer::{RenderGraphController, RendererConfig, WgpuBackend};
//!
//! let mut backend = WgpuBackend::headless(1280, 720)?;
//! let mut renderer = RenderGraphController::new(RendererConfig::default());
//! renderer.prepare(&mut backend, &scene)?;
//! loop {
//!     renderer.update(&mut backend, &scene)?;
//!     renderer.draw(&mut backend)?;
//! }
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod ibl;
pub mod objects;
pub mod pipeline;
pub mod render_graph;
pub mod resources;
pub mod scene;
pub mod shader;

pub use backend::recording::RecordingBackend;
pub use backend::wgpu_backend::WgpuBackend;
pub use backend::GraphicsBackend;
pub use config::{IblConfig, RendererConfig, ShadowConfig, ToneMapping, TonemapOperator};
pub use controller::{RenderGraphController, RendererState};
pub use error::{RendererError, RendererResult};
