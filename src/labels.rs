//! Text labels anchored to world positions.
//!
//! Each frame every [`Label`] is projected to the screen. A label is visible only while its
//! anchor lies inside the view volume, and labels nearer to the camera are drawn on top of
//! farther ones.

use cgmath::{Point3, Vector3};

use crate::camera::{self, OrbitCamera, Projection};

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub text: String,
    pub anchor: Point3<f32>,
}

impl Label {
    pub fn new(text: impl Into<String>, anchor: Point3<f32>) -> Self {
        Self {
            text: text.into(),
            anchor,
        }
    }
}

/// A label placed on the screen, in pixels from the top left corner.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
    /// Larger is nearer.
    pub z_order: i32,
    pub visible: bool,
}

/// NDC to pixels. Y is flipped because window coordinates grow downwards.
pub fn to_screen(ndc: Vector3<f32>, width: u32, height: u32) -> (f32, f32) {
    let x = (ndc.x * 0.5 + 0.5) * width as f32;
    let y = (ndc.y * -0.5 + 0.5) * height as f32;
    (x, y)
}

pub fn z_order(ndc_z: f32) -> i32 {
    ((-ndc_z * 0.5 + 0.5) * 100_000.0) as i32
}

pub fn in_view(ndc: Vector3<f32>) -> bool {
    [ndc.x, ndc.y, ndc.z]
        .iter()
        .all(|v| v.is_finite() && (-1.0..=1.0).contains(v))
}

pub fn place(label: &Label, camera: &OrbitCamera, projection: &Projection, width: u32, height: u32) -> ScreenLabel {
    let ndc = camera::project(label.anchor, camera, projection);
    let (x, y) = to_screen(ndc, width, height);
    ScreenLabel {
        text: label.text.clone(),
        x,
        y,
        z_order: z_order(ndc.z),
        visible: in_view(ndc),
    }
}

/// Visible labels in draw order, farthest first.
pub fn layout(
    labels: &[Label],
    camera: &OrbitCamera,
    projection: &Projection,
    width: u32,
    height: u32,
) -> Vec<ScreenLabel> {
    let mut placed: Vec<ScreenLabel> = labels
        .iter()
        .map(|label| place(label, camera, projection, width, height))
        .filter(|label| label.visible)
        .collect();
    placed.sort_by_key(|label| label.z_order);
    placed
}
