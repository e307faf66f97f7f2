//! The model viewer flow: scene, hover highlight, info panel and measurement.

use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::{Key, NamedKey},
};

use crate::{
    context::{BufferWriter, Context, InitContext},
    flow::{FlowConstructor, GraphicsFlow, Out},
    data_structures::scene::Scene,
    labels::Label,
    measure::{MeasureEvent, MeasureRenderer, MeasureTool},
    pick::Intersection,
    render::Render,
    resources,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleMeasure,
    Cancel,
    Undo,
    Clear,
    ToggleProjection,
    ResetCamera,
}

impl Command {
    pub fn from_key(key: &Key) -> Option<Self> {
        match key {
            Key::Named(NamedKey::Escape) => Some(Self::Cancel),
            Key::Named(NamedKey::Backspace) => Some(Self::Undo),
            Key::Character(c) => match c.to_ascii_lowercase().as_str() {
                "m" => Some(Self::ToggleMeasure),
                "c" => Some(Self::Clear),
                "p" => Some(Self::ToggleProjection),
                "r" => Some(Self::ResetCamera),
                _ => None,
            },
            _ => None,
        }
    }
}

pub struct ViewerFlow {
    scene: Scene,
    tool: MeasureTool,
    measure: MeasureRenderer,
    hovered: Option<Intersection>,
}

impl ViewerFlow {
    pub async fn new(init: InitContext) -> anyhow::Result<Self> {
        let scene = resources::load_scene(
            &init.viewer.model_path,
            &init.device,
            &init.queue,
            &init.material_layout,
        )
        .await?;
        if let Some(bounds) = scene.bounds() {
            log::info!("Scene size {:?} around {:?}", bounds.size(), bounds.center());
        }
        let measure = MeasureRenderer::new(
            &init.device,
            &init.queue,
            &init.material_layout,
            init.viewer.measure_radius,
            init.viewer.measure_segments,
        );
        Ok(Self {
            scene,
            tool: MeasureTool::new(init.viewer.chain_measurements),
            measure,
            hovered: None,
        })
    }

    pub fn constructor<S: 'static>() -> FlowConstructor<S> {
        Box::new(|init| {
            Box::pin(async move {
                let flow: Box<dyn GraphicsFlow<S>> = Box::new(Self::new(init).await?);
                Ok(flow)
            })
        })
    }

    pub fn tool(&self) -> &MeasureTool {
        &self.tool
    }

    fn apply(&mut self, command: Command) -> Out {
        match command {
            Command::ToggleMeasure => {
                let enabled = self.tool.toggle();
                log::info!("Measuring {}", if enabled { "on" } else { "off" });
            }
            Command::Cancel => {
                if self.tool.cancel() {
                    log::info!("Measurement cancelled");
                }
            }
            Command::Undo => {
                if let Some(segment) = self.tool.undo() {
                    log::info!("Removed segment of length {:.2}", segment.length());
                }
            }
            Command::Clear => self.tool.clear(),
            Command::ToggleProjection => {
                return Out::Configure(Box::new(Context::toggle_projection));
            }
            Command::ResetCamera => return Out::Configure(Box::new(Context::reset_camera)),
        }
        self.measure.update(&self.tool);
        Out::Empty
    }
}

impl<S> GraphicsFlow<S> for ViewerFlow {
    fn on_init(&mut self, _: &mut Context, _: &mut S) -> Out {
        Out::Empty
    }

    fn on_hover(&mut self, _: &Context, _: &mut S, hit: Option<&Intersection>) -> Out {
        self.hovered = hit.cloned();
        Out::Empty
    }

    fn on_click(&mut self, _: &Context, _: &mut S, hit: &Intersection) -> Out {
        match self.tool.add_point(hit.point) {
            MeasureEvent::Started(point) => log::info!("Measuring from {:?}", point),
            MeasureEvent::Completed(segment) => log::info!(
                "Distance {:.2}, total {:.2}",
                segment.length(),
                self.tool.total_length()
            ),
            MeasureEvent::Rejected => log::warn!("Both points coincide, pick another one"),
            MeasureEvent::Ignored => (),
        }
        self.measure.update(&self.tool);
        Out::Empty
    }

    fn on_update(&mut self, ctx: &Context, _: &mut S, _: instant::Duration) -> Out {
        self.measure.write_to_buffer(ctx);
        Out::Empty
    }

    fn on_device_events(&mut self, _: &Context, _: &mut S, _: &winit::event::DeviceEvent) -> Out {
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut S, event: &WindowEvent) -> Out {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match Command::from_key(logical_key) {
                Some(command) => self.apply(command),
                None => Out::Empty,
            },
            _ => Out::Empty,
        }
    }

    fn on_render(&self) -> Render<'_> {
        let hovered = self.hovered.as_ref().map(|hit| hit.object_id);
        Render::Composed(vec![self.scene.render(hovered), self.measure.render()])
    }

    fn labels(&self) -> Vec<Label> {
        let mut labels = self.scene.labels();
        labels.extend(self.tool.labels());
        labels
    }

    fn info_text(&self) -> Option<String> {
        self.hovered.as_ref().map(ToString::to_string)
    }

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        _: &Context,
        _: &mut S,
        _: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<crate::flow::ImageTestResult, anyhow::Error> {
        Ok(crate::flow::ImageTestResult::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_to_commands_in_either_case() {
        assert_eq!(
            Command::from_key(&Key::Character("m".into())),
            Some(Command::ToggleMeasure)
        );
        assert_eq!(
            Command::from_key(&Key::Character("P".into())),
            Some(Command::ToggleProjection)
        );
        assert_eq!(
            Command::from_key(&Key::Character("r".into())),
            Some(Command::ResetCamera)
        );
        assert_eq!(Command::from_key(&Key::Character("C".into())), Some(Command::Clear));
    }

    #[test]
    fn named_keys_edit_the_measurement() {
        assert_eq!(
            Command::from_key(&Key::Named(NamedKey::Escape)),
            Some(Command::Cancel)
        );
        assert_eq!(
            Command::from_key(&Key::Named(NamedKey::Backspace)),
            Some(Command::Undo)
        );
        assert_eq!(Command::from_key(&Key::Named(NamedKey::Enter)), None);
        assert_eq!(Command::from_key(&Key::Character("x".into())), None);
    }
}
