//! Render pipelines.
//!
//! All model pipelines share `model.wgsl` and one bind group layout order:
//! material (0), camera (1), light (2).

pub mod basic;
pub mod light;
