#[cfg(feature = "integration-tests")]
use meshscope::{
    context::Context,
    flow::{GraphicsFlow, ImageTestResult, Out},
    pick::Intersection,
    render::Render,
};

pub(crate) struct FrameCounter(pub(crate) u32);
impl Default for FrameCounter {
    fn default() -> Self {
        Self(0)
    }
}
impl FrameCounter {
    pub(crate) fn frame(&self) -> u32 {
        self.0
    }

    pub(crate) fn progress(&mut self) {
        self.0 += 1;
    }
}

#[cfg(feature = "integration-tests")]
pub(crate) type Texture = image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>;

#[cfg(feature = "integration-tests")]
pub(crate) type Validate =
    Box<dyn Fn(&Context, &mut FrameCounter, &mut Texture) -> Result<ImageTestResult, anyhow::Error>>;

/// Renders `inner` (if any) and checks every read back frame with `validate`.
#[cfg(feature = "integration-tests")]
pub(crate) struct TestRender {
    pub(crate) inner: Option<Box<dyn GraphicsFlow<FrameCounter>>>,
    pub(crate) setup: Box<dyn Fn(&mut Context)>,
    pub(crate) validate: Validate,
}

#[cfg(feature = "integration-tests")]
impl TestRender {
    pub(crate) fn new(
        inner: Option<Box<dyn GraphicsFlow<FrameCounter>>>,
        setup: impl Fn(&mut Context) + 'static,
        validate: impl Fn(&Context, &mut FrameCounter, &mut Texture) -> Result<ImageTestResult, anyhow::Error>
        + 'static,
    ) -> Self {
        Self {
            inner,
            setup: Box::new(setup),
            validate: Box::new(validate),
        }
    }
}

#[cfg(feature = "integration-tests")]
impl GraphicsFlow<FrameCounter> for TestRender {
    fn on_init(&mut self, ctx: &mut Context, state: &mut FrameCounter) -> Out {
        (self.setup)(ctx);
        match &mut self.inner {
            Some(inner) => inner.on_init(ctx, state),
            None => Out::Empty,
        }
    }

    fn on_hover(&mut self, _: &Context, _: &mut FrameCounter, _: Option<&Intersection>) -> Out {
        Out::Empty
    }

    fn on_click(&mut self, _: &Context, _: &mut FrameCounter, _: &Intersection) -> Out {
        Out::Empty
    }

    fn on_update(&mut self, ctx: &Context, state: &mut FrameCounter, dt: instant::Duration) -> Out {
        state.progress();
        match &mut self.inner {
            Some(inner) => inner.on_update(ctx, state, dt),
            None => Out::Empty,
        }
    }

    fn on_device_events(&mut self, _: &Context, _: &mut FrameCounter, _: &meshscope::DeviceEvent) -> Out {
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut FrameCounter, _: &meshscope::WindowEvent) -> Out {
        Out::Empty
    }

    fn on_render(&self) -> Render<'_> {
        match &self.inner {
            Some(inner) => inner.on_render(),
            None => Render::None,
        }
    }

    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut FrameCounter,
        texture: &mut Texture,
    ) -> Result<ImageTestResult, anyhow::Error> {
        (self.validate)(ctx, state, texture)
    }
}

pub(crate) fn f_to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[macro_export]
macro_rules! golden_image_test {
    ($config:expr, $test_render:expr) => {{
        use crate::common::test_utils::FrameCounter;
        use meshscope::flow::{FlowConstructor, GraphicsFlow};
        let constructor: FlowConstructor<FrameCounter> = Box::new(move |init| {
            Box::pin(async move {
                let g_flow: Box<dyn GraphicsFlow<FrameCounter>> =
                    Box::new(($test_render)(init).await?);
                Ok(g_flow)
            })
        });

        meshscope::flow::run($config, vec![constructor])
            .expect("Failed to run flow for integration test.");
    }};
}
