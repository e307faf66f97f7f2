//! Window, GPU and camera state shared by every flow.

use std::sync::Arc;

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::{dpi::PhysicalPosition, window::Window};

use crate::{
    camera::{self, CameraController, CameraResources, CameraUniform, OrbitCamera, Projection},
    config::ViewerConfig,
    data_structures::texture,
    geometry::Ray,
    pipelines::{
        basic::{mk_basic_pipeline, mk_highlight_pipeline, mk_measure_pipeline},
        light::{LightResources, LightUniform},
    },
    resources::texture::material_layout,
};

/// Anything that keeps CPU side data which has to reach the GPU before drawing.
pub trait BufferWriter {
    fn write_to_buffer(&mut self, ctx: &Context);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButtonState {
    Left,
    Right,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseState {
    pub coords: PhysicalPosition<f64>,
    pub pressed: MouseButtonState,
    pub press_origin: Option<PhysicalPosition<f64>>,
    /// Whether the cursor left the click slop since the button went down.
    pub dragged: bool,
    /// Object id under the cursor after the last hover test.
    pub hovered: Option<u32>,
    /// False until the first cursor move and again after the cursor leaves the window.
    pub inside: bool,
}

impl Default for MouseState {
    fn default() -> Self {
        Self {
            coords: PhysicalPosition::new(0.0, 0.0),
            pressed: MouseButtonState::None,
            press_origin: None,
            dragged: false,
            hovered: None,
            inside: false,
        }
    }
}

impl MouseState {
    pub fn press(&mut self, button: MouseButtonState) {
        self.pressed = button;
        self.press_origin = Some(self.coords);
        self.dragged = false;
    }

    /// Store the new cursor position and return the movement since the last one.
    pub fn moved(&mut self, position: PhysicalPosition<f64>, slop: f64) -> (f64, f64) {
        let delta = (position.x - self.coords.x, position.y - self.coords.y);
        self.coords = position;
        self.inside = true;
        if let Some(origin) = self.press_origin {
            let (dx, dy) = (position.x - origin.x, position.y - origin.y);
            if (dx * dx + dy * dy).sqrt() > slop {
                self.dragged = true;
            }
        }
        delta
    }

    /// The cursor left the window: nothing is hovered until it comes back.
    pub fn left(&mut self) {
        self.inside = false;
        self.hovered = None;
    }

    /// Returns true when the press/release pair was a click rather than a drag.
    pub fn release(&mut self) -> bool {
        let click = self.pressed == MouseButtonState::Left && !self.dragged;
        self.pressed = MouseButtonState::None;
        self.press_origin = None;
        self.dragged = false;
        click
    }
}

/// Device handles and layouts handed to flow constructors.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub material_layout: wgpu::BindGroupLayout,
    pub viewer: ViewerConfig,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            material_layout: ctx.material_layout.clone(),
            viewer: ctx.viewer.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
    pub highlight: wgpu::RenderPipeline,
    pub measure: wgpu::RenderPipeline,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub material_layout: wgpu::BindGroupLayout,
    pub clear_colour: wgpu::Color,
    pub mouse: MouseState,
    pub viewer: ViewerConfig,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await
            .context("Failed to request a device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders assume an sRGB surface, anything else comes out too dark
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface supports no texture format")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera = OrbitCamera::front(viewer.frustum_size / 2.0);
        let projection = Projection::from_config(&viewer, config.width, config.height);
        let controller = CameraController::new(&viewer);

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("camera_bind_group_layout"),
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let camera = CameraResources {
            camera,
            controller,
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group: camera_bind_group,
            bind_group_layout: camera_bind_group_layout,
        };

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let light = LightResources::new(LightUniform::default(), &device);
        let material_layout = material_layout(&device);

        let pipelines = Pipelines {
            basic: mk_basic_pipeline(
                &device,
                &config,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
            ),
            highlight: mk_highlight_pipeline(
                &device,
                &config,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
            ),
            measure: mk_measure_pipeline(
                &device,
                &config,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
            ),
        };

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            pipelines,
            material_layout,
            clear_colour: viewer.clear_colour,
            mouse: MouseState::default(),
            viewer,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Back to the start position: looking at the origin from the front.
    pub fn reset_camera(&mut self) {
        self.camera.camera = OrbitCamera::front(self.viewer.frustum_size / 2.0);
        self.projection = Projection::from_config(&self.viewer, self.config.width, self.config.height);
    }

    pub fn toggle_projection(&mut self) {
        self.projection = self.projection.toggled(self.viewer.frustum_size);
        log::info!("Switched to {:?} projection", self.projection.kind());
    }

    /// Ray under the cursor.
    pub fn pointer_ray(&self) -> Ray {
        let ndc = camera::pointer_ndc(self.mouse.coords, self.config.width, self.config.height);
        camera::cast_ray(ndc, &self.camera.camera, &self.projection)
    }

    /// Apply pending camera input and upload the camera uniform.
    pub(crate) fn update_camera(&mut self) {
        self.camera.controller.update(
            &mut self.camera.camera,
            &mut self.projection,
            self.config.height as f32,
        );
        self.camera
            .uniform
            .update_view_proj(&self.camera.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_without_movement_is_a_click() {
        let mut mouse = MouseState::default();
        mouse.moved(PhysicalPosition::new(100.0, 100.0), 4.0);
        mouse.press(MouseButtonState::Left);
        mouse.moved(PhysicalPosition::new(102.0, 101.0), 4.0);
        assert!(mouse.release());
        assert_eq!(mouse.pressed, MouseButtonState::None);
    }

    #[test]
    fn drag_beyond_slop_is_not_a_click() {
        let mut mouse = MouseState::default();
        mouse.press(MouseButtonState::Left);
        let delta = mouse.moved(PhysicalPosition::new(10.0, 0.0), 4.0);
        assert_eq!(delta, (10.0, 0.0));
        // moving back does not undo the drag
        mouse.moved(PhysicalPosition::new(0.0, 0.0), 4.0);
        assert!(!mouse.release());
    }

    #[test]
    fn right_button_never_clicks() {
        let mut mouse = MouseState::default();
        mouse.press(MouseButtonState::Right);
        assert!(!mouse.release());
    }

    #[test]
    fn leaving_the_window_clears_the_hover() {
        let mut mouse = MouseState::default();
        assert!(!mouse.inside);
        mouse.moved(PhysicalPosition::new(40.0, 30.0), 4.0);
        mouse.hovered = Some(2);
        assert!(mouse.inside);

        mouse.left();
        assert!(!mouse.inside);
        assert_eq!(mouse.hovered, None);

        mouse.moved(PhysicalPosition::new(41.0, 30.0), 4.0);
        assert!(mouse.inside);
    }
}
