//! Flow control and the application event loop.
//!
//! A "flow" is a self-contained part of the application that handles input, updates its
//! state and says what to draw each frame. The event loop owns all active flows, hands
//! them events, composes their renders into pipeline batches and drives picking.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S>`] is the trait flows implement
//! - [`Out`] lets a hook reconfigure the [`Context`] after it returns
//!
//! # Frame
//!
//! Each frame, at most [`ViewerConfig::fps`] times per second:
//! 1. apply camera input and upload the camera uniform
//! 2. cast the pointer ray and report the hovered object via `on_hover`
//! 3. call `on_update` on every flow
//! 4. collect `on_render` from every flow, batch per pipeline and draw
//! 5. project labels and draw the text overlay
//! 6. present
//!
//! A left button release that did not drag counts as a click. Clicks are picked like hovers
//! and reported via `on_click` to the flows that rendered the hit object.

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};

#[cfg(feature = "integration-tests")]
use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, MouseButton, StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::{Context, InitContext, MouseButtonState},
    data_structures::{model::DrawModel, texture::Texture},
    labels::Label,
    pick::{self, Intersection},
    render::Instanced,
};

/// Output of every lifecycle hook.
///
/// `Out::Configure` modifies the Context once the hook has returned, for instance to switch
/// the projection or change the clear colour.
///
/// `Empty` is the default when nothing has to change.
#[derive(Default)]
pub enum Out {
    Configure(Box<dyn FnOnce(&mut Context)>),
    #[default]
    Empty,
}

impl Debug for Out {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure(_) => f.write_str("Configure(|&mut Context| {...})"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

#[cfg(feature = "integration-tests")]
pub enum ImageTestResult {
    Passed,
    Waiting,
    Failed,
}

/// Trait for implementing a part of the viewer.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once after creation; configure the context here
/// 2. `on_window_events()` and `on_device_events()` are called for each winit input event
/// 3. `on_hover()` is called every frame with the object under the cursor
/// 4. `on_click()` is called when an object rendered by this flow is clicked
/// 5. `on_update()` is called every frame
/// 6. `on_render()`, `labels()` and `info_text()` describe what to draw
pub trait GraphicsFlow<S> {
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out;

    /// `hit` is the nearest object under the cursor if this flow rendered it, `None`
    /// otherwise.
    fn on_hover(&mut self, ctx: &Context, state: &mut S, hit: Option<&Intersection>) -> Out;

    /// A click on an object rendered by this flow.
    ///
    /// Only renders that carry a [`PickMesh`](crate::pick::PickMesh) can be clicked.
    fn on_click(&mut self, ctx: &Context, state: &mut S, hit: &Intersection) -> Out;

    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out;

    fn on_device_events(&mut self, ctx: &Context, state: &mut S, event: &DeviceEvent) -> Out;

    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out;

    /// Called each frame. The engine batches the renders of all flows per pipeline.
    fn on_render(&self) -> crate::render::Render<'_>;

    /// Text anchored in world space, projected each frame.
    fn labels(&self) -> Vec<Label> {
        Vec::new()
    }

    /// Text for the info panel in the top left corner.
    fn info_text(&self) -> Option<String> {
        None
    }

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut S,
        texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error>;
}

impl<State> Debug for dyn GraphicsFlow<State> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// A flow constructor takes an [`InitContext`] and asynchronously returns a boxed
/// [`GraphicsFlow`]. Constructors run concurrently during start up.
pub type FlowConstructor<S> = Box<
    dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn GraphicsFlow<S>>>>>>,
>;

/// Caps the frame rate without drifting.
///
/// After a frame the reference point moves to `now` minus the overshoot past the interval,
/// so late frames do not shift the phase of later ones.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    interval: Duration,
    prev: Instant,
}

impl FrameLimiter {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            prev: now,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.prev);
        if elapsed < self.interval {
            return false;
        }
        let interval = self.interval.as_nanos().max(1);
        let overshoot = Duration::from_nanos((elapsed.as_nanos() % interval) as u64);
        self.prev = now - overshoot;
        true
    }

    pub fn next_frame(&self) -> Instant {
        self.prev + self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

/// GPU context, app state and surface status.
pub struct AppState<State> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
    #[cfg(feature = "ui")]
    overlay: crate::overlay::TextOverlay,
}

impl<State: Default> AppState<State> {
    async fn new(window: Arc<Window>, viewer: ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, viewer)
            .await
            .map_err(|e| e.context("Cannot create the main context"))?;
        #[cfg(feature = "ui")]
        let overlay = crate::overlay::TextOverlay::new(&ctx.device, &ctx.queue, ctx.config.format);
        Ok(Self {
            ctx,
            state: State::default(),
            is_surface_configured: false,
            #[cfg(feature = "ui")]
            overlay,
        })
    }
}

impl<State> AppState<State> {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_texture(&self, extent3d: wgpu::Extent3d) -> wgpu::Texture {
        self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Golden Image Test Output Texture"),
            size: extent3d,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.ctx.config.format,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_depth_texture(&self, extent3d: wgpu::Extent3d) -> wgpu::Texture {
        self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Golden Image Test Depth Texture"),
            size: extent3d,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Texture::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    /// Readback rows must be 256 byte aligned, so the test target is padded.
    #[cfg(feature = "integration-tests")]
    fn get_with_height(&self) -> (u32, u32) {
        let width = self.ctx.config.width;
        let height = self.ctx.config.height;
        let width = width + (64 - width % 64) % 64;
        (width, height)
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_3d_extent(&self) -> wgpu::Extent3d {
        let (width, height) = self.get_with_height();
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }

    /// Pick under the cursor and tell the flows. Returns the hit object id.
    /// A cursor outside the window hovers nothing.
    fn hover(&mut self, flows: &mut [Box<dyn GraphicsFlow<State>>]) -> Option<u32> {
        let hit = if self.ctx.mouse.inside {
            pick::cast(flows, &self.ctx.pointer_ray())
        } else {
            None
        };
        let outputs: Vec<Out> = flows
            .iter_mut()
            .enumerate()
            .map(|(idx, flow)| {
                let own = hit
                    .as_ref()
                    .filter(|(_, owners)| owners.contains(&idx))
                    .map(|(intersection, _)| intersection);
                flow.on_hover(&self.ctx, &mut self.state, own)
            })
            .collect();
        outputs
            .into_iter()
            .for_each(|out| handle_flow_output(&mut self.ctx, out));
        hit.map(|(intersection, _)| intersection.object_id)
    }

    fn click(&mut self, flows: &mut [Box<dyn GraphicsFlow<State>>]) {
        let ray = self.ctx.pointer_ray();
        let Some((hit, flow_ids)) = pick::cast(flows, &ray) else {
            log::debug!("Click hit nothing");
            return;
        };
        log::info!("Clicked {} at {:?}", hit.object_name, hit.point);
        if flow_ids.len() > 1 {
            log::warn!(
                "Multiple flows (indices {:?}) want to react to object {}.",
                flow_ids,
                hit.object_id
            );
        }
        for flow_id in flow_ids {
            if let Some(flow) = flows.get_mut(flow_id) {
                let out = flow.on_click(&self.ctx, &mut self.state, &hit);
                handle_flow_output(&mut self.ctx, out);
            }
        }
    }

    fn draw_batch(
        ctx: &Context,
        render_pass: &mut wgpu::RenderPass<'_>,
        pipeline: &wgpu::RenderPipeline,
        batch: Vec<Instanced<'_>>,
    ) {
        if batch.is_empty() {
            return;
        }
        render_pass.set_pipeline(pipeline);
        for instanced in batch {
            if instanced.amount == 0 || instanced.instance.size() == 0 {
                log::warn!("Skipping {} with zero instances", instanced.name);
                continue;
            }
            let Ok(amount) = u32::try_from(instanced.amount) else {
                log::error!(
                    "Failed to render object with id {}. Maximum amount of supported instances is {}.",
                    instanced.id,
                    u32::MAX
                );
                continue;
            };
            render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
            render_pass.draw_model_instanced(
                instanced.model,
                0..amount,
                &ctx.camera.bind_group,
                &ctx.light.bind_group,
            );
        }
    }

    fn render(
        &mut self,
        graphics_flows: &mut [Box<dyn GraphicsFlow<State>>],
        #[cfg(feature = "integration-tests")] async_runtime: &Runtime,
        #[cfg(feature = "integration-tests")] event_loop: &winit::event_loop::EventLoopProxy<
            FlowEvent,
        >,
    ) -> Result<(), wgpu::SurfaceError> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        #[cfg(not(feature = "integration-tests"))]
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        #[cfg(feature = "integration-tests")]
        let (tex, depth) = {
            let extent3d = self.get_test_3d_extent();
            let tex = self.get_test_texture(extent3d);
            let depth = self.get_test_depth_texture(extent3d);
            (tex, depth)
        };
        #[cfg(feature = "integration-tests")]
        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            #[cfg(feature = "integration-tests")]
            let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
            #[cfg(not(feature = "integration-tests"))]
            let depth_view = &self.ctx.depth_texture.view;
            #[cfg(feature = "integration-tests")]
            let depth_view = &depth_view;

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            let mut basics: Vec<Instanced> = Vec::new();
            let mut highlights: Vec<Instanced> = Vec::new();
            let mut measures: Vec<Instanced> = Vec::new();
            graphics_flows.iter().for_each(|flow| {
                flow.on_render()
                    .set_pipelines(&mut basics, &mut highlights, &mut measures);
            });

            Self::draw_batch(&self.ctx, &mut render_pass, &self.ctx.pipelines.basic, basics);
            Self::draw_batch(
                &self.ctx,
                &mut render_pass,
                &self.ctx.pipelines.highlight,
                highlights,
            );
            Self::draw_batch(
                &self.ctx,
                &mut render_pass,
                &self.ctx.pipelines.measure,
                measures,
            );
        }

        #[cfg(feature = "ui")]
        {
            let world_labels: Vec<Label> =
                graphics_flows.iter().flat_map(|flow| flow.labels()).collect();
            let placed = crate::labels::layout(
                &world_labels,
                &self.ctx.camera.camera,
                &self.ctx.projection,
                self.ctx.config.width,
                self.ctx.config.height,
            );
            let info: Vec<String> = graphics_flows
                .iter()
                .filter_map(|flow| flow.info_text())
                .collect();
            let info = info.join("\n\n");
            match self.overlay.prepare(&self.ctx, placed, Some(&info)) {
                Ok(()) => {
                    let mut text_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Text Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: None,
                        occlusion_query_set: None,
                        timestamp_writes: None,
                        multiview_mask: None,
                    });
                    if let Err(e) = self.overlay.render(&mut text_pass) {
                        log::error!("Unable to draw text: {:#}", e);
                    }
                }
                Err(e) => log::error!("Unable to lay out text: {:#}", e),
            }
        }
        #[cfg(feature = "integration-tests")]
        let output_buffer = {
            let u32_size = std::mem::size_of::<u32>() as u32;
            let (width, height) = self.get_with_height();
            let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                size: (u32_size * width * height) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                label: Some("Golden Image Readback Buffer"),
                mapped_at_creation: false,
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &tex,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &output_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(u32_size * width),
                        rows_per_image: Some(height),
                    },
                },
                self.get_test_3d_extent(),
            );
            output_buffer
        };

        self.ctx.queue.submit(iter::once(encoder.finish()));
        #[cfg(feature = "ui")]
        self.overlay.trim();

        #[cfg(feature = "integration-tests")]
        {
            let (width, height) = self.get_with_height();
            let buffer_slice = output_buffer.slice(..);
            let fut_img = async {
                let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
                buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                    tx.send(result).unwrap();
                });
                self.ctx
                    .device
                    .poll(wgpu::PollType::Wait {
                        submission_index: None,
                        timeout: Some(Duration::from_secs(3)),
                    })
                    .unwrap();
                rx.receive().await.unwrap().unwrap();
                let data = buffer_slice.get_mapped_range();
                image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(width, height, data).unwrap()
            };
            let mut img: image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView> =
                async_runtime.block_on(fut_img);
            let state = &mut self.state;
            let all_passed = graphics_flows
                .iter_mut()
                .map(|flow| flow.render_to_texture(&self.ctx, state, &mut img))
                .map(|res| match res {
                    Err(e) => panic!("{}", e),
                    Ok(ImageTestResult::Passed) => true,
                    Ok(ImageTestResult::Failed) => panic!("Assertion failed"),
                    Ok(ImageTestResult::Waiting) => false,
                })
                .fold(true, |all, passed| all && passed);
            if all_passed {
                event_loop
                    .send_event(FlowEvent::Exit)
                    .expect("All assertions passed but the winit event-loop could not safely exit")
            }
        }

        output.present();
        Ok(())
    }

    fn frame(
        &mut self,
        flows: &mut [Box<dyn GraphicsFlow<State>>],
        dt: Duration,
    ) {
        self.ctx.update_camera();
        self.ctx.mouse.hovered = self.hover(flows);
        let outputs: Vec<Out> = flows
            .iter_mut()
            .map(|flow| flow.on_update(&self.ctx, &mut self.state, dt))
            .collect();
        outputs
            .into_iter()
            .for_each(|out| handle_flow_output(&mut self.ctx, out));
    }
}

pub struct App<State: 'static> {
    async_runtime: tokio::runtime::Runtime,
    #[cfg_attr(not(feature = "integration-tests"), allow(dead_code))]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    viewer: ViewerConfig,
    state: Option<AppState<State>>,
    graphics_flows: Vec<Box<dyn GraphicsFlow<State>>>,
    // Taken once the window exists
    constructors: Option<Vec<FlowConstructor<State>>>,
    limiter: FrameLimiter,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl<State: 'static> App<State> {
    fn new(
        event_loop: &EventLoop<FlowEvent>,
        viewer: ViewerConfig,
        constructors: Vec<FlowConstructor<State>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        let async_runtime = tokio::runtime::Runtime::new()?;
        let now = Instant::now();
        Ok(Self {
            async_runtime,
            proxy,
            limiter: FrameLimiter::new(viewer.frame_interval(), now),
            viewer,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: now,
            error: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

#[derive(Debug)]
pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Exit,
}

impl<State: 'static + Default> ApplicationHandler<FlowEvent> for App<State> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            return;
        };
        let title = format!("meshscope - {}", self.viewer.model_path.display());
        let window_attributes = Window::default_attributes().with_title(title);
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let viewer = self.viewer.clone();
        let init_future = async move {
            let app_state: AppState<State> = AppState::new(window, viewer).await?;
            let flow_futures: Vec<_> = constructors
                .into_iter()
                // Device and Queue are reference counted, this only clones handles
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows = futures::future::join_all(flow_futures)
                .await
                .into_iter()
                .collect::<anyhow::Result<Vec<_>>>()?;
            anyhow::Ok((app_state, flows))
        };

        match self.async_runtime.block_on(init_future) {
            Ok((mut app_state, flows)) => {
                self.graphics_flows = flows;
                let size = app_state.ctx.window.inner_size();
                app_state.resize(size.width, size.height);
                for flow in self.graphics_flows.iter_mut() {
                    let out = flow.on_init(&mut app_state.ctx, &mut app_state.state);
                    handle_flow_output(&mut app_state.ctx, out);
                }
                self.limiter.set_interval(app_state.ctx.viewer.frame_interval());
                app_state.ctx.window.request_redraw();
                self.state = Some(app_state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Exit => event_loop.exit(),
        }
    }

    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if let StartCause::ResumeTimeReached { .. } = cause {
            if let Some(state) = &self.state {
                state.ctx.window.request_redraw();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            event_loop.set_control_flow(ControlFlow::WaitUntil(self.limiter.next_frame()));
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_device_events(&state.ctx, &mut state.state, &event);
            handle_flow_output(&mut state.ctx, out);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_window_events(&state.ctx, &mut state.state, &event);
            handle_flow_output(&mut state.ctx, out);
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                let slop = state.ctx.viewer.click_slop;
                let (dx, dy) = state.ctx.mouse.moved(position, slop);
                match state.ctx.mouse.pressed {
                    MouseButtonState::Left => state.ctx.camera.controller.handle_rotate(dx, dy),
                    MouseButtonState::Right => state.ctx.camera.controller.handle_pan(dx, dy),
                    MouseButtonState::None => (),
                }
            }
            WindowEvent::CursorLeft { .. } => state.ctx.mouse.left(),
            WindowEvent::MouseWheel { delta, .. } => {
                state.ctx.camera.controller.handle_scroll(&delta);
            }
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => match (button, button_state.is_pressed()) {
                (MouseButton::Left, true) => state.ctx.mouse.press(MouseButtonState::Left),
                (MouseButton::Right, true) => state.ctx.mouse.press(MouseButtonState::Right),
                (MouseButton::Left | MouseButton::Right, false) => {
                    if state.ctx.mouse.release() {
                        state.click(&mut self.graphics_flows);
                    }
                }
                _ => (),
            },
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                if !self.limiter.ready(now) {
                    return;
                }
                let dt = now.saturating_duration_since(self.last_time);
                self.last_time = now;

                state.frame(&mut self.graphics_flows, dt);
                match state.render(
                    &mut self.graphics_flows,
                    #[cfg(feature = "integration-tests")]
                    &self.async_runtime,
                    #[cfg(feature = "integration-tests")]
                    &self.proxy,
                ) {
                    Ok(()) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => log::error!("Unable to render {}", e),
                }
                self.limiter.set_interval(state.ctx.viewer.frame_interval());
            }
            _ => {}
        }
    }
}

fn handle_flow_output(ctx: &mut Context, out: Out) {
    match out {
        Out::Configure(f) => f(ctx),
        Out::Empty => (),
    }
}

/// Open a window and run `constructors` until it is closed.
pub fn run<State: 'static + Default>(
    viewer: ViewerConfig,
    constructors: Vec<FlowConstructor<State>>,
) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        eprintln!("Warning: Could not initialize logger: {}", e);
    };

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<FlowEvent> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<FlowEvent> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(not(all(
        feature = "integration-tests",
        any(target_os = "linux", target_os = "windows")
    )))]
    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app: App<State> = App::new(&event_loop, viewer, constructors)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn limiter_skips_frames_inside_the_interval() {
        let start = Instant::now();
        let mut limiter = FrameLimiter::new(ms(25), start);
        assert!(!limiter.ready(start + ms(10)));
        assert!(!limiter.ready(start + ms(24)));
        assert!(limiter.ready(start + ms(25)));
        assert!(!limiter.ready(start + ms(30)));
    }

    #[test]
    fn limiter_keeps_phase_after_late_frames() {
        let start = Instant::now();
        let mut limiter = FrameLimiter::new(ms(25), start);
        // 5 ms late: the next frame is still due at 50 ms, not 55 ms
        assert!(limiter.ready(start + ms(30)));
        assert_eq!(limiter.next_frame(), start + ms(50));
        assert!(!limiter.ready(start + ms(45)));
        assert!(limiter.ready(start + ms(50)));
        // a long stall skips whole intervals but keeps the phase
        assert!(limiter.ready(start + ms(137)));
        assert_eq!(limiter.next_frame(), start + ms(150));
    }

    #[test]
    fn default_output_is_empty() {
        assert!(matches!(Out::default(), Out::Empty));
    }
}
