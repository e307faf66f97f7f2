//! Viewer data structures: models, textures, instances and the loaded scene.
//!
//! - `model` contains mesh and material definitions, GPU resources for 3D models
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `instance` holds per-instance transformation data
//! - `scene` holds the centred objects of one OBJ file

pub mod instance;
pub mod model;
pub mod scene;
pub mod texture;
