//! Viewer configuration.
//!
//! [`ViewerConfig`] gathers every tunable of the viewer in one place. The binary fills it
//! from the command line; flows can change the live copy stored in the
//! [`Context`](crate::context::Context) at runtime via [`Out::Configure`](crate::flow::Out).

use std::path::PathBuf;

/// Which projection the camera starts with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CameraKind {
    #[default]
    Orthographic,
    Perspective,
}

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    /// OBJ file to open. Its `mtllib` and texture paths resolve relative to its directory.
    pub model_path: PathBuf,
    pub camera: CameraKind,
    /// Height of the orthographic view volume in world units.
    pub frustum_size: f32,
    /// Upper bound for rendered frames per second.
    pub fps: u32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_speed: f32,
    pub rotate_speed: f32,
    pub clear_colour: wgpu::Color,
    /// Radius of the cylinders drawn for measurement segments.
    pub measure_radius: f32,
    /// Number of sides of a measurement cylinder.
    pub measure_segments: u32,
    /// Chain mode: the end of a segment starts the next one.
    pub chain_measurements: bool,
    /// Cursor travel in pixels below which a press/release pair still counts as a click.
    pub click_slop: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets").join("demo.obj"),
            camera: CameraKind::Orthographic,
            frustum_size: 150.0,
            fps: 40,
            min_distance: 0.1,
            max_distance: 1000.0,
            min_zoom: 0.05,
            max_zoom: 50.0,
            zoom_speed: 1.0,
            rotate_speed: 0.4,
            clear_colour: wgpu::Color::WHITE,
            measure_radius: 0.3,
            measure_segments: 16,
            chain_measurements: false,
            click_slop: 4.0,
        }
    }
}

impl ViewerConfig {
    pub fn with_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_camera(mut self, camera: CameraKind) -> Self {
        self.camera = camera;
        self
    }

    /// A cap of zero would stall the render loop, so it is raised to one.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_frustum_size(mut self, frustum_size: f32) -> Self {
        if frustum_size > 0.0 {
            self.frustum_size = frustum_size;
        } else {
            log::warn!(
                "Ignoring non-positive frustum size {}, keeping {}",
                frustum_size,
                self.frustum_size
            );
        }
        self
    }

    pub fn with_measure_radius(mut self, radius: f32) -> Self {
        if radius > 0.0 {
            self.measure_radius = radius;
        } else {
            log::warn!("Ignoring non-positive measurement radius {}", radius);
        }
        self
    }

    pub fn with_chain_measurements(mut self, chain: bool) -> Self {
        self.chain_measurements = chain;
        self
    }

    /// Minimum time between two rendered frames.
    pub fn frame_interval(&self) -> instant::Duration {
        instant::Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_viewer() {
        let config = ViewerConfig::default();
        assert_eq!(config.camera, CameraKind::Orthographic);
        assert_eq!(config.frustum_size, 150.0);
        assert_eq!(config.fps, 40);
        assert_eq!(config.min_distance, 0.1);
        assert_eq!(config.max_distance, 1000.0);
        assert_eq!(config.clear_colour, wgpu::Color::WHITE);
    }

    #[test]
    fn frame_interval_follows_fps() {
        let config = ViewerConfig::default().with_fps(40);
        assert_eq!(config.frame_interval(), instant::Duration::from_millis(25));
        let config = config.with_fps(0);
        assert_eq!(config.fps, 1);
        assert_eq!(config.frame_interval(), instant::Duration::from_secs(1));
    }

    #[test]
    fn invalid_sizes_are_ignored() {
        let config = ViewerConfig::default()
            .with_frustum_size(-3.0)
            .with_measure_radius(0.0);
        assert_eq!(config.frustum_size, 150.0);
        assert_eq!(config.measure_radius, 0.3);
    }
}
