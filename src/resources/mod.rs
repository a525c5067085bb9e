//! Resource management
//!
//! The format registry describes logical resources, the resource factory
//! allocates them and the bind group factory exposes them to shaders.

mod bind_group;
mod factory;
pub mod formats;
mod material;
mod mesh;
pub mod names;
mod registry;
mod texture;

pub use bind_group::*;
pub use factory::*;
pub use material::*;
pub use mesh::*;
pub use registry::*;
pub use texture::*;
