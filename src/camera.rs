//! Orbit camera, projections and the pointer ray.
//!
//! The camera always orbits a target point. Left drag rotates, right drag pans, the wheel
//! zooms. Zooming an orthographic projection scales its view volume while a perspective
//! projection moves the eye instead.
//!
//! [`cast_ray`] turns a pointer position (in normalized device coordinates) into a world
//! space [`Ray`] for picking, and [`project`] goes the other way for labels.

use std::f32::consts::FRAC_PI_2;

use cgmath::{
    EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Transform, Vector2, Vector3,
};
use winit::{dpi::PhysicalPosition, event::MouseScrollDelta};

use crate::{
    config::{CameraKind, ViewerConfig},
    geometry::Ray,
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.001;

#[derive(Clone, Debug, PartialEq)]
pub struct OrbitCamera {
    pub target: Point3<f32>,
    pub distance: f32,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl OrbitCamera {
    pub fn new<Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        target: Point3<f32>,
        distance: f32,
        yaw: Y,
        pitch: P,
    ) -> Self {
        let mut camera = Self {
            target,
            distance,
            yaw: yaw.into(),
            pitch: pitch.into(),
        };
        camera.clamp_pitch();
        camera
    }

    /// Looking down -Z at the origin from `distance`.
    pub fn front(distance: f32) -> Self {
        Self::new(Point3::origin(), distance, Rad(0.0), Rad(0.0))
    }

    pub fn eye(&self) -> Point3<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        self.target + Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub fn forward(&self) -> Vector3<f32> {
        (self.target - self.eye()).normalize()
    }

    pub fn right(&self) -> Vector3<f32> {
        self.forward().cross(Vector3::unit_y()).normalize()
    }

    pub fn up(&self) -> Vector3<f32> {
        self.right().cross(self.forward())
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y())
    }

    fn clamp_pitch(&mut self) {
        self.pitch = Rad(self.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Orthographic {
        frustum_size: f32,
        aspect: f32,
        zoom: f32,
        znear: f32,
        zfar: f32,
    },
    Perspective {
        fovy: Rad<f32>,
        aspect: f32,
        znear: f32,
        zfar: f32,
    },
}

impl Projection {
    pub fn orthographic(width: u32, height: u32, frustum_size: f32) -> Self {
        Self::Orthographic {
            frustum_size,
            aspect: aspect(width, height),
            zoom: 1.0,
            znear: 1.0,
            zfar: 1000.0,
        }
    }

    pub fn perspective<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F) -> Self {
        Self::Perspective {
            fovy: fovy.into(),
            aspect: aspect(width, height),
            znear: 0.1,
            zfar: 3000.0,
        }
    }

    pub fn from_config(config: &ViewerConfig, width: u32, height: u32) -> Self {
        match config.camera {
            CameraKind::Orthographic => Self::orthographic(width, height, config.frustum_size),
            CameraKind::Perspective => Self::perspective(width, height, cgmath::Deg(70.0)),
        }
    }

    pub fn kind(&self) -> CameraKind {
        match self {
            Self::Orthographic { .. } => CameraKind::Orthographic,
            Self::Perspective { .. } => CameraKind::Perspective,
        }
    }

    pub fn aspect(&self) -> f32 {
        match self {
            Self::Orthographic { aspect, .. } | Self::Perspective { aspect, .. } => *aspect,
        }
    }

    /// Zero sized windows (minimized) keep the previous aspect.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        match self {
            Self::Orthographic { aspect, .. } | Self::Perspective { aspect, .. } => {
                *aspect = width as f32 / height as f32;
            }
        }
    }

    /// The other projection kind with the same aspect.
    pub fn toggled(&self, frustum_size: f32) -> Self {
        match self {
            Self::Orthographic { aspect, .. } => Self::Perspective {
                fovy: cgmath::Deg(70.0).into(),
                aspect: *aspect,
                znear: 0.1,
                zfar: 3000.0,
            },
            Self::Perspective { aspect, .. } => Self::Orthographic {
                frustum_size,
                aspect: *aspect,
                zoom: 1.0,
                znear: 1.0,
                zfar: 1000.0,
            },
        }
    }

    /// Clip matrix in the OpenGL convention (NDC z in [-1, 1]).
    pub fn calc_gl_matrix(&self) -> Matrix4<f32> {
        match *self {
            Self::Orthographic {
                frustum_size,
                aspect,
                zoom,
                znear,
                zfar,
            } => {
                let half_h = frustum_size / (2.0 * zoom);
                let half_w = half_h * aspect;
                cgmath::ortho(-half_w, half_w, -half_h, half_h, znear, zfar)
            }
            Self::Perspective {
                fovy,
                aspect,
                znear,
                zfar,
            } => cgmath::perspective(fovy, aspect, znear, zfar),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.calc_gl_matrix()
    }

    /// World units covered by one pixel at the camera target.
    pub fn world_per_pixel(&self, camera: &OrbitCamera, viewport_height: f32) -> f32 {
        let viewport_height = viewport_height.max(1.0);
        match *self {
            Self::Orthographic {
                frustum_size, zoom, ..
            } => frustum_size / (zoom * viewport_height),
            Self::Perspective { fovy, .. } => {
                2.0 * camera.distance * (fovy.0 / 2.0).tan() / viewport_height
            }
        }
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Accumulates pointer input between frames and applies it in [`update`](Self::update).
#[derive(Debug)]
pub struct CameraController {
    rotate_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    min_zoom: f32,
    max_zoom: f32,
    rotate: Vector2<f32>,
    pan: Vector2<f32>,
    scroll: f32,
}

impl CameraController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            rotate: Vector2::new(0.0, 0.0),
            pan: Vector2::new(0.0, 0.0),
            scroll: 0.0,
        }
    }

    pub fn handle_rotate(&mut self, dx: f64, dy: f64) {
        self.rotate += Vector2::new(dx as f32, dy as f32);
    }

    pub fn handle_pan(&mut self, dx: f64, dy: f64) {
        self.pan += Vector2::new(dx as f32, dy as f32);
    }

    /// Positive steps zoom in.
    pub fn handle_scroll(&mut self, delta: &MouseScrollDelta) {
        self.scroll += match delta {
            MouseScrollDelta::LineDelta(_, lines) => *lines,
            MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 50.0,
        };
    }

    pub fn update(
        &mut self,
        camera: &mut OrbitCamera,
        projection: &mut Projection,
        viewport_height: f32,
    ) {
        // 0.01 rad per pixel at speed 1.0
        let radians_per_pixel = self.rotate_speed * 0.01;
        camera.yaw -= Rad(self.rotate.x * radians_per_pixel);
        camera.pitch += Rad(self.rotate.y * radians_per_pixel);
        camera.clamp_pitch();
        self.rotate = Vector2::new(0.0, 0.0);

        if self.pan.x != 0.0 || self.pan.y != 0.0 {
            let scale = projection.world_per_pixel(camera, viewport_height);
            let shift = camera.right() * (-self.pan.x * scale) + camera.up() * (self.pan.y * scale);
            camera.target += shift;
            self.pan = Vector2::new(0.0, 0.0);
        }

        if self.scroll != 0.0 {
            let factor = 1.05f32.powf(self.zoom_speed * self.scroll);
            match projection {
                Projection::Orthographic { zoom, .. } => {
                    *zoom = (*zoom * factor).clamp(self.min_zoom, self.max_zoom);
                }
                Projection::Perspective { .. } => {
                    camera.distance =
                        (camera.distance / factor).clamp(self.min_distance, self.max_distance);
                }
            }
            self.scroll = 0.0;
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &OrbitCamera, projection: &Projection) {
        self.view_position = camera.eye().to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: OrbitCamera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Pointer position in pixels to normalized device coordinates.
///
/// Window coordinates grow downwards, NDC grow upwards, hence the flipped y.
pub fn pointer_ndc(position: PhysicalPosition<f64>, width: u32, height: u32) -> Vector2<f32> {
    let width = f64::from(width.max(1));
    let height = f64::from(height.max(1));
    Vector2::new(
        ((position.x / width) * 2.0 - 1.0) as f32,
        (-(position.y / height) * 2.0 + 1.0) as f32,
    )
}

/// World space ray through the NDC point `ndc`.
///
/// Perspective rays start at the eye, orthographic rays on the near plane so every ray of an
/// orthographic camera is parallel.
pub fn cast_ray(ndc: Vector2<f32>, camera: &OrbitCamera, projection: &Projection) -> Ray {
    let view_proj = projection.calc_gl_matrix() * camera.calc_matrix();
    let Some(inverse) = view_proj.invert() else {
        log::warn!("View projection is not invertible, falling back to the view axis");
        return Ray::new(camera.eye(), camera.forward());
    };
    let near = inverse.transform_point(Point3::new(ndc.x, ndc.y, -1.0));
    let far = inverse.transform_point(Point3::new(ndc.x, ndc.y, 1.0));
    match projection {
        Projection::Perspective { .. } => Ray::new(camera.eye(), far - near),
        Projection::Orthographic { .. } => Ray::new(near, far - near),
    }
}

/// World point to NDC (OpenGL convention, z in [-1, 1] inside the view volume).
pub fn project(point: Point3<f32>, camera: &OrbitCamera, projection: &Projection) -> Vector3<f32> {
    let view_proj = projection.calc_gl_matrix() * camera.calc_matrix();
    view_proj.transform_point(point).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn front_camera_sits_on_positive_z() {
        let camera = OrbitCamera::front(75.0);
        let eye = camera.eye();
        assert_relative_eq!(eye.x, 0.0);
        assert_relative_eq!(eye.y, 0.0);
        assert_relative_eq!(eye.z, 75.0);
        assert_relative_eq!(camera.forward().z, -1.0);
    }

    #[test]
    fn pitch_is_clamped_short_of_the_poles() {
        let camera = OrbitCamera::new(Point3::origin(), 10.0, Rad(0.0), Rad(4.0));
        assert!(camera.pitch.0 < FRAC_PI_2);
        assert!(camera.eye().y < 10.0);
    }

    #[test]
    fn pointer_ndc_maps_corners() {
        let centre = pointer_ndc(PhysicalPosition::new(400.0, 300.0), 800, 600);
        assert_relative_eq!(centre.x, 0.0);
        assert_relative_eq!(centre.y, 0.0);
        let top_left = pointer_ndc(PhysicalPosition::new(0.0, 0.0), 800, 600);
        assert_relative_eq!(top_left.x, -1.0);
        assert_relative_eq!(top_left.y, 1.0);
        let bottom_right = pointer_ndc(PhysicalPosition::new(800.0, 600.0), 800, 600);
        assert_relative_eq!(bottom_right.x, 1.0);
        assert_relative_eq!(bottom_right.y, -1.0);
    }

    #[test]
    fn orthographic_rays_are_parallel_and_start_on_near_plane() {
        let camera = OrbitCamera::front(75.0);
        let projection = Projection::orthographic(100, 100, 150.0);
        let centre = cast_ray(Vector2::new(0.0, 0.0), &camera, &projection);
        let edge = cast_ray(Vector2::new(1.0, 0.0), &camera, &projection);
        assert_relative_eq!(centre.origin.z, 74.0, epsilon = 1e-3);
        assert_relative_eq!(centre.direction.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(edge.direction.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(edge.origin.x, 75.0, epsilon = 1e-3);
    }

    #[test]
    fn perspective_rays_start_at_the_eye() {
        let camera = OrbitCamera::front(20.0);
        let projection = Projection::perspective(100, 100, cgmath::Deg(70.0));
        let ray = cast_ray(Vector2::new(0.0, 0.0), &camera, &projection);
        assert_relative_eq!(ray.origin.z, 20.0, epsilon = 1e-4);
        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-5);
        let off_axis = cast_ray(Vector2::new(0.5, 0.5), &camera, &projection);
        assert!(off_axis.direction.x > 0.0 && off_axis.direction.y > 0.0);
    }

    #[test]
    fn project_inverts_cast_ray() {
        let camera = OrbitCamera::new(Point3::new(1.0, 2.0, 3.0), 40.0, Rad(0.3), Rad(-0.2));
        let projection = Projection::perspective(800, 600, cgmath::Deg(70.0));
        let ndc = Vector2::new(0.25, -0.4);
        let ray = cast_ray(ndc, &camera, &projection);
        let projected = project(ray.at(30.0), &camera, &projection);
        assert_relative_eq!(projected.x, ndc.x, epsilon = 1e-4);
        assert_relative_eq!(projected.y, ndc.y, epsilon = 1e-4);
        assert!(projected.z > -1.0 && projected.z < 1.0);
    }

    #[test]
    fn resize_keeps_aspect_on_zero_size() {
        let mut projection = Projection::orthographic(800, 600, 150.0);
        projection.resize(0, 600);
        assert_relative_eq!(projection.aspect(), 800.0 / 600.0);
        projection.resize(1000, 500);
        assert_relative_eq!(projection.aspect(), 2.0);
    }

    #[test]
    fn toggling_switches_kind_and_keeps_aspect() {
        let projection = Projection::orthographic(1000, 500, 150.0);
        let toggled = projection.toggled(150.0);
        assert_eq!(toggled.kind(), CameraKind::Perspective);
        assert_relative_eq!(toggled.aspect(), 2.0);
        assert_eq!(toggled.toggled(150.0).kind(), CameraKind::Orthographic);
    }

    #[test]
    fn scrolling_zooms_within_limits() {
        let config = ViewerConfig::default();
        let mut controller = CameraController::new(&config);
        let mut camera = OrbitCamera::front(75.0);
        let mut ortho = Projection::orthographic(100, 100, 150.0);

        controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, 1.0));
        controller.update(&mut camera, &mut ortho, 100.0);
        match ortho {
            Projection::Orthographic { zoom, .. } => assert_relative_eq!(zoom, 1.05),
            _ => unreachable!(),
        }

        controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, 10_000.0));
        controller.update(&mut camera, &mut ortho, 100.0);
        match ortho {
            Projection::Orthographic { zoom, .. } => assert_relative_eq!(zoom, config.max_zoom),
            _ => unreachable!(),
        }

        let mut perspective = Projection::perspective(100, 100, cgmath::Deg(70.0));
        controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, -10_000.0));
        controller.update(&mut camera, &mut perspective, 100.0);
        assert_relative_eq!(camera.distance, config.max_distance);
    }

    #[test]
    fn dragging_rotates_and_pans() {
        let config = ViewerConfig::default();
        let mut controller = CameraController::new(&config);
        let mut camera = OrbitCamera::front(75.0);
        let mut projection = Projection::orthographic(100, 100, 150.0);

        controller.handle_rotate(100.0, 0.0);
        controller.update(&mut camera, &mut projection, 100.0);
        assert!(camera.yaw.0 < 0.0);
        assert_relative_eq!(camera.distance, 75.0);

        let mut camera = OrbitCamera::front(75.0);
        controller.handle_pan(10.0, 0.0);
        controller.update(&mut camera, &mut projection, 100.0);
        // 1.5 world units per pixel, dragging right moves the target left
        assert_relative_eq!(camera.target.x, -15.0, epsilon = 1e-4);
    }
}
