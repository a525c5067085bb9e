//! Render Graph System
//!
//! Passes declare which named resources they read and write; the graph is
//! sorted once so every writer runs before its readers, then replayed in that
//! order every frame into a single command submission.

pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use executor::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;
