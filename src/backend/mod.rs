//! Backend abstraction layer
//!
//! Provides the object-safe [`GraphicsBackend`] trait, the wgpu implementation
//! and a recording backend that captures the command stream for inspection.

pub mod recording;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;
