#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_clear_colour() {
    use crate::common::test_utils::{TestRender, f_to_u8};
    use meshscope::{config::ViewerConfig, context::InitContext, flow::ImageTestResult};
    use wgpu::Color;

    let colour = Color {
        r: 0.2,
        g: 0.4,
        b: 0.6,
        a: 1.0,
    };
    golden_image_test!(
        ViewerConfig::default(),
        async move |_: InitContext| -> anyhow::Result<TestRender> {
            Ok(TestRender::new(
                None,
                move |ctx| ctx.clear_colour = colour,
                move |ctx, state: &mut FrameCounter, texture| {
                    if state.frame() == 0 {
                        return Ok(ImageTestResult::Waiting);
                    }
                    // the surface may be BGRA, compare the channels that do not move
                    let is_bgra = matches!(
                        ctx.config.format,
                        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
                    );
                    let (r, b) = if is_bgra { (2, 0) } else { (0, 2) };
                    let first = *texture.get_pixel(0, 0);
                    for pixel in texture.pixels() {
                        assert_eq!(*pixel, first, "clear colour is not uniform");
                    }
                    assert_eq!(first[3], f_to_u8(colour.a));
                    assert!(first[b] > first[1] && first[1] > first[r]);
                    Ok(ImageTestResult::Passed)
                },
            ))
        }
    );
}
