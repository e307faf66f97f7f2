//! meshscope: open an OBJ model, hover objects to inspect them and click to measure.
//!
//! Controls:
//! - left drag rotates, right drag pans, the wheel zooms
//! - left click measures between two points
//! - `M` measuring on/off, `Escape` cancel, `Backspace` undo, `C` clear
//! - `P` orthographic/perspective, `R` reset the camera

use std::path::PathBuf;

use clap::Parser;
use meshscope::{
    config::{CameraKind, ViewerConfig},
    flow::run,
    viewer::ViewerFlow,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OBJ file to open
    #[arg(value_name = "FILE", default_value = "assets/demo.obj")]
    file: PathBuf,

    /// Start with a perspective instead of an orthographic camera
    #[arg(long)]
    perspective: bool,

    /// Frame rate cap
    #[arg(long, default_value_t = 40)]
    fps: u32,

    /// Height of the orthographic view volume in world units
    #[arg(long, default_value_t = 150.0)]
    frustum_size: f32,

    /// Continue each measurement from the end of the previous one
    #[arg(long)]
    chain: bool,

    /// Radius of the measurement cylinders
    #[arg(long, default_value_t = 0.3)]
    measure_radius: f32,
}

impl From<Args> for ViewerConfig {
    fn from(args: Args) -> Self {
        let camera = if args.perspective {
            CameraKind::Perspective
        } else {
            CameraKind::Orthographic
        };
        ViewerConfig::default()
            .with_model(args.file)
            .with_camera(camera)
            .with_fps(args.fps)
            .with_frustum_size(args.frustum_size)
            .with_chain_measurements(args.chain)
            .with_measure_radius(args.measure_radius)
    }
}

fn main() -> anyhow::Result<()> {
    let config: ViewerConfig = Args::parse().into();
    run::<()>(config, vec![ViewerFlow::constructor()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_open_the_demo_orthographically() {
        let config: ViewerConfig = Args::parse_from(["meshscope"]).into();
        assert_eq!(config.model_path, PathBuf::from("assets/demo.obj"));
        assert_eq!(config.camera, CameraKind::Orthographic);
        assert_eq!(config.fps, 40);
        assert!(!config.chain_measurements);
    }

    #[test]
    fn flags_reach_the_config() {
        let config: ViewerConfig = Args::parse_from([
            "meshscope",
            "part.obj",
            "--perspective",
            "--fps",
            "60",
            "--chain",
            "--measure-radius",
            "0.5",
        ])
        .into();
        assert_eq!(config.model_path, PathBuf::from("part.obj"));
        assert_eq!(config.camera, CameraKind::Perspective);
        assert_eq!(config.fps, 60);
        assert!(config.chain_measurements);
        assert_eq!(config.measure_radius, 0.5);
    }
}
