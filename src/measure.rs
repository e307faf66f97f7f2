//! Point to point distance measurement.
//!
//! [`MeasureTool`] holds the measuring state: the clicked point waiting for its partner and
//! the finished segments. [`MeasureRenderer`] turns that state into instances of a unit
//! cylinder, one per segment plus a small marker for the pending point.

use cgmath::{EuclideanSpace, InnerSpace, Point3};
use wgpu::util::DeviceExt;

use crate::{
    context::{BufferWriter, Context},
    data_structures::{
        instance::{Instance, InstanceRaw},
        model::{Material, Mesh, Model},
        texture::Texture,
    },
    geometry::{self, EPSILON},
    labels::Label,
    render::{Instanced, Render},
};

pub const MEASURE_COLOUR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: Point3<f32>,
    pub end: Point3<f32>,
}

impl Segment {
    pub fn length(&self) -> f32 {
        (self.end - self.start).magnitude()
    }

    pub fn midpoint(&self) -> Point3<f32> {
        self.start.midpoint(self.end)
    }

    pub fn label(&self) -> Label {
        Label::new(format!("{:.2}", self.length()), self.midpoint())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeasureEvent {
    Started(Point3<f32>),
    Completed(Segment),
    /// The point coincides with the pending one.
    Rejected,
    /// Measuring is switched off.
    Ignored,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeasureTool {
    pub pending: Option<Point3<f32>>,
    pub segments: Vec<Segment>,
    pub chain: bool,
    pub enabled: bool,
}

impl MeasureTool {
    pub fn new(chain: bool) -> Self {
        Self {
            pending: None,
            segments: Vec::new(),
            chain,
            enabled: true,
        }
    }

    pub fn add_point(&mut self, point: Point3<f32>) -> MeasureEvent {
        if !self.enabled {
            return MeasureEvent::Ignored;
        }
        let Some(start) = self.pending else {
            self.pending = Some(point);
            return MeasureEvent::Started(point);
        };
        let segment = Segment { start, end: point };
        if segment.length() < EPSILON {
            return MeasureEvent::Rejected;
        }
        self.segments.push(segment);
        self.pending = self.chain.then_some(point);
        MeasureEvent::Completed(segment)
    }

    /// Drop the pending point. Returns whether there was one.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Cancel the pending point or, without one, remove the last segment.
    pub fn undo(&mut self) -> Option<Segment> {
        if self.cancel() {
            return None;
        }
        self.segments.pop()
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.segments.clear();
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        if !self.enabled {
            self.pending = None;
        }
        self.enabled
    }

    pub fn total_length(&self) -> f32 {
        self.segments.iter().map(Segment::length).sum()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.segments.iter().map(Segment::label).collect()
    }

    /// One cylinder per segment, then the pending marker if there is one.
    pub fn instances(&self, radius: f32) -> Vec<Instance> {
        self.segments
            .iter()
            .filter_map(|segment| geometry::segment_transform(segment.start, segment.end, radius))
            .chain(
                self.pending
                    .map(|point| geometry::marker_transform(point, radius)),
            )
            .collect()
    }
}

pub struct MeasureRenderer {
    model: Model,
    radius: f32,
    instances: Vec<Instance>,
    instance_buffer: wgpu::Buffer,
    capacity: usize,
    buffer_size_needs_change: bool,
    dirty: bool,
}

impl MeasureRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        radius: f32,
        segments: u32,
    ) -> Self {
        let (vertices, indices) = geometry::cylinder_mesh(segments);
        let texture = Texture::create_solid([255; 4], device, queue, "measurement");
        let material = Material::new(device, "measurement", MEASURE_COLOUR, texture, layout);
        let mesh = Mesh::new(device, "measurement cylinder", &vertices, &indices, 0);
        let capacity = 8;
        Self {
            model: Model {
                meshes: vec![mesh],
                materials: vec![material],
            },
            radius,
            instances: Vec::new(),
            instance_buffer: Self::mk_buffer(device, &vec![Instance::default().to_raw(); capacity]),
            capacity,
            buffer_size_needs_change: false,
            dirty: false,
        }
    }

    fn mk_buffer(device: &wgpu::Device, raw: &[InstanceRaw]) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Measurement Instance Buffer"),
            contents: bytemuck::cast_slice(raw),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        })
    }

    /// Rebuild the instances from `tool`. Takes effect on the next buffer write.
    pub fn update(&mut self, tool: &MeasureTool) {
        self.instances = tool.instances(self.radius);
        if self.instances.len() > self.capacity {
            self.capacity = self.instances.len().next_power_of_two();
            self.buffer_size_needs_change = true;
        }
        self.dirty = true;
    }

    pub fn render(&self) -> Render<'_> {
        if self.instances.is_empty() {
            return Render::None;
        }
        Render::Measure(Instanced {
            instance: &self.instance_buffer,
            model: &self.model,
            amount: self.instances.len(),
            id: 0,
            name: "measurement",
            pick: None,
        })
    }
}

impl BufferWriter for MeasureRenderer {
    fn write_to_buffer(&mut self, ctx: &Context) {
        if !self.dirty {
            return;
        }
        let mut raw: Vec<InstanceRaw> = self.instances.iter().map(Instance::to_raw).collect();
        if self.buffer_size_needs_change {
            raw.resize(self.capacity, Instance::default().to_raw());
            self.instance_buffer = Self::mk_buffer(&ctx.device, &raw);
            self.buffer_size_needs_change = false;
        } else if !raw.is_empty() {
            ctx.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        }
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f32, y: f32, z: f32) -> Point3<f32> {
        Point3::new(x, y, z)
    }

    #[test]
    fn two_points_make_one_segment() {
        let mut tool = MeasureTool::new(false);
        assert_eq!(tool.add_point(p(0.0, 0.0, 0.0)), MeasureEvent::Started(p(0.0, 0.0, 0.0)));
        let MeasureEvent::Completed(segment) = tool.add_point(p(3.0, 4.0, 0.0)) else {
            panic!("expected a segment");
        };
        assert_relative_eq!(segment.length(), 5.0);
        assert_relative_eq!(segment.midpoint().x, 1.5);
        assert_eq!(tool.pending, None);
        assert_eq!(tool.segments.len(), 1);
    }

    #[test]
    fn chain_mode_continues_from_the_last_point() {
        let mut tool = MeasureTool::new(true);
        for x in 0..4 {
            tool.add_point(p(x as f32, 0.0, 0.0));
        }
        assert_eq!(tool.segments.len(), 3);
        assert_eq!(tool.pending, Some(p(3.0, 0.0, 0.0)));
        assert_relative_eq!(tool.total_length(), 3.0);
    }

    #[test]
    fn coincident_points_are_rejected() {
        let mut tool = MeasureTool::new(false);
        tool.add_point(p(1.0, 1.0, 1.0));
        assert_eq!(tool.add_point(p(1.0, 1.0, 1.0)), MeasureEvent::Rejected);
        assert_eq!(tool.pending, Some(p(1.0, 1.0, 1.0)));
        assert!(tool.segments.is_empty());
    }

    #[test]
    fn undo_cancels_pending_before_removing_segments() {
        let mut tool = MeasureTool::new(false);
        tool.add_point(p(0.0, 0.0, 0.0));
        tool.add_point(p(1.0, 0.0, 0.0));
        tool.add_point(p(5.0, 0.0, 0.0));
        assert_eq!(tool.undo(), None);
        assert_eq!(tool.pending, None);
        assert_eq!(tool.segments.len(), 1);
        assert!(tool.undo().is_some());
        assert!(tool.segments.is_empty());
        assert_eq!(tool.undo(), None);
    }

    #[test]
    fn clear_and_cancel_reset_state() {
        let mut tool = MeasureTool::new(true);
        tool.add_point(p(0.0, 0.0, 0.0));
        tool.add_point(p(0.0, 2.0, 0.0));
        assert!(tool.cancel());
        assert!(!tool.cancel());
        tool.add_point(p(0.0, 0.0, 0.0));
        tool.clear();
        assert_eq!(tool.pending, None);
        assert!(tool.segments.is_empty());
        assert_relative_eq!(tool.total_length(), 0.0);
    }

    #[test]
    fn disabled_tool_ignores_points() {
        let mut tool = MeasureTool::new(false);
        tool.add_point(p(0.0, 0.0, 0.0));
        assert!(!tool.toggle());
        assert_eq!(tool.pending, None);
        assert_eq!(tool.add_point(p(1.0, 0.0, 0.0)), MeasureEvent::Ignored);
        assert!(tool.toggle());
    }

    #[test]
    fn labels_show_lengths_at_midpoints() {
        let mut tool = MeasureTool::new(false);
        tool.add_point(p(0.0, 0.0, 0.0));
        tool.add_point(p(0.0, 0.0, 2.5));
        let labels = tool.labels();
        assert_eq!(labels[0].text, "2.50");
        assert_relative_eq!(labels[0].anchor.z, 1.25);
    }

    #[test]
    fn instances_cover_segments_and_pending_marker() {
        let mut tool = MeasureTool::new(true);
        tool.add_point(p(0.0, 0.0, 0.0));
        assert_eq!(tool.instances(0.3).len(), 1);
        tool.add_point(p(0.0, 4.0, 0.0));
        let instances = tool.instances(0.3);
        // one segment, the chained end is pending again
        assert_eq!(instances.len(), 2);
        assert_relative_eq!(instances[0].scale.y, 4.0);
        assert_relative_eq!(instances[0].position.y, 2.0);
    }
}
