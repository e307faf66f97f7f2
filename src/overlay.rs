//! Text drawn over the 3D view: floating labels and the info panel.
//!
//! Text is rendered with glyphon in its own pass after the scene pass so it never takes
//! part in depth testing.

use glyphon::{
    Attrs, Buffer, Cache, Color, Family, FontSystem, Metrics, Resolution, Shaping, SwashCache,
    TextArea, TextAtlas, TextBounds, TextRenderer, Viewport,
};

use crate::{context::Context, labels::ScreenLabel};

const LABEL_SIZE: f32 = 14.0;
const INFO_SIZE: f32 = 13.0;
const INFO_MARGIN: f32 = 10.0;
const INFO_WIDTH: f32 = 360.0;

pub struct TextOverlay {
    font_system: FontSystem,
    swash_cache: SwashCache,
    viewport: Viewport,
    atlas: TextAtlas,
    renderer: TextRenderer,
    labels: Vec<(Buffer, ScreenLabel)>,
    info: Buffer,
    has_info: bool,
}

impl TextOverlay {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let mut font_system = FontSystem::new();
        let swash_cache = SwashCache::new();
        let cache = Cache::new(device);
        let viewport = Viewport::new(device, &cache);
        let mut atlas = TextAtlas::new(device, queue, &cache, format);
        let renderer =
            TextRenderer::new(&mut atlas, device, wgpu::MultisampleState::default(), None);
        let info = Buffer::new(&mut font_system, Metrics::new(INFO_SIZE, INFO_SIZE * 1.3));
        Self {
            font_system,
            swash_cache,
            viewport,
            atlas,
            renderer,
            labels: Vec::new(),
            info,
            has_info: false,
        }
    }

    /// Pixel width and height of the shaped text in `buffer`.
    fn extent(buffer: &Buffer) -> (f32, f32) {
        buffer
            .layout_runs()
            .fold((0.0, 0.0), |(w, h), run| (w.max(run.line_w), h + run.line_height))
    }

    fn shape(font_system: &mut FontSystem, buffer: &mut Buffer, text: &str, width: Option<f32>) {
        buffer.set_size(font_system, width, None);
        buffer.set_text(
            font_system,
            text,
            &Attrs::new().family(Family::SansSerif),
            Shaping::Advanced,
            None,
        );
        buffer.shape_until_scroll(font_system, false);
    }

    /// Lay out this frame's text. `labels` must already be in draw order.
    pub fn prepare(
        &mut self,
        ctx: &Context,
        labels: Vec<ScreenLabel>,
        info: Option<&str>,
    ) -> anyhow::Result<()> {
        self.viewport.update(
            &ctx.queue,
            Resolution {
                width: ctx.config.width,
                height: ctx.config.height,
            },
        );

        let font_system = &mut self.font_system;
        self.labels.truncate(labels.len());
        for (i, label) in labels.into_iter().enumerate() {
            if i == self.labels.len() {
                let buffer = Buffer::new(font_system, Metrics::new(LABEL_SIZE, LABEL_SIZE * 1.2));
                self.labels.push((buffer, label.clone()));
            }
            let (buffer, slot) = &mut self.labels[i];
            Self::shape(font_system, buffer, &label.text, None);
            *slot = label;
        }

        self.has_info = info.is_some_and(|text| !text.is_empty());
        if let Some(text) = info {
            Self::shape(font_system, &mut self.info, text, Some(INFO_WIDTH));
        }

        let width = ctx.config.width as i32;
        let height = ctx.config.height as i32;
        let screen = TextBounds {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        };
        let label_colour = Color::rgb(20, 20, 20);
        let mut areas: Vec<TextArea> = self
            .labels
            .iter()
            .map(|(buffer, label)| {
                let (w, h) = Self::extent(buffer);
                let (left, top) = centred(label.x, label.y, w, h);
                TextArea {
                    buffer,
                    left,
                    top,
                    scale: 1.0,
                    bounds: screen,
                    default_color: label_colour,
                    custom_glyphs: &[],
                }
            })
            .collect();
        if self.has_info {
            areas.push(TextArea {
                buffer: &self.info,
                left: INFO_MARGIN,
                top: INFO_MARGIN,
                scale: 1.0,
                bounds: screen,
                default_color: Color::rgb(0, 0, 0),
                custom_glyphs: &[],
            });
        }

        self.renderer.prepare(
            &ctx.device,
            &ctx.queue,
            &mut self.font_system,
            &mut self.atlas,
            &self.viewport,
            areas,
            &mut self.swash_cache,
        )?;
        Ok(())
    }

    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>) -> anyhow::Result<()> {
        self.renderer
            .render(&self.atlas, &self.viewport, render_pass)?;
        Ok(())
    }

    /// Drop glyphs that were not used this frame.
    pub fn trim(&mut self) {
        self.atlas.trim();
    }
}

/// Top-left corner of a `width` x `height` box centred on the anchor `(x, y)`.
pub fn centred(x: f32, y: f32, width: f32, height: f32) -> (f32, f32) {
    (x - width / 2.0, y - height / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_centred_on_their_anchor() {
        let (left, top) = centred(400.0, 300.0, 48.0, 16.8);
        assert_eq!(left, 376.0);
        assert!((top - 291.6).abs() < 1e-4);
        assert_eq!(left + 48.0 / 2.0, 400.0);
    }

    #[test]
    fn empty_text_sits_on_the_anchor() {
        assert_eq!(centred(12.0, 7.0, 0.0, 0.0), (12.0, 7.0));
    }
}
