//! meshscope
//!
//! An interactive viewer for OBJ/MTL models. Objects are centred around the origin,
//! labelled, highlighted under the cursor and can be measured point to point by clicking.
//!
//! High-level modules
//! - `camera`: orbit camera, projections and ray casting
//! - `config`: viewer settings
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: meshes, instances, textures and the loaded scene
//! - `flow`: flows and the event loop
//! - `geometry`: rays, triangles, bounding boxes and measurement meshes
//! - `labels`: world anchored text projected to the screen
//! - `measure`: measuring state and its render
//! - `pick`: CPU ray picking
//! - `pipelines`: render pipelines and the light uniform
//! - `render`: render composition for pipeline batching and picking
//! - `resources`: OBJ, MTL and texture loading
//! - `viewer`: the viewer flow tying it all together
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod geometry;
pub mod labels;
pub mod measure;
#[cfg(feature = "ui")]
pub mod overlay;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod viewer;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::{Point3, Vector3};
pub use winit::dpi::PhysicalPosition;
pub use winit::event::{DeviceEvent, WindowEvent};
