#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_draw_the_centred_demo_scene() {
    use crate::common::test_utils::TestRender;
    use meshscope::{
        config::ViewerConfig, context::InitContext, flow::ImageTestResult, viewer::ViewerFlow,
    };

    let config = ViewerConfig::default().with_model("assets/demo.obj");
    golden_image_test!(
        config,
        async move |init: InitContext| -> anyhow::Result<TestRender> {
            let viewer = ViewerFlow::new(init).await?;
            Ok(TestRender::new(
                Some(Box::new(viewer)),
                |ctx| ctx.clear_colour = wgpu::Color::WHITE,
                |_, state: &mut FrameCounter, texture| {
                    if state.frame() < 2 {
                        return Ok(ImageTestResult::Waiting);
                    }
                    // the green cube ends up in the middle, labels are drawn up and right of it
                    let (w, h) = texture.dimensions();
                    let pixel = *texture.get_pixel(w / 2 - 8, h / 2 + 8);
                    assert_ne!(pixel.0, [255, 255, 255, 255], "nothing drawn at the centre");
                    assert!(pixel[1] > pixel[0] && pixel[1] > pixel[2], "{:?}", pixel);
                    // corners stay clear
                    assert_eq!(texture.get_pixel(0, h - 1).0, [255, 255, 255, 255]);
                    Ok(ImageTestResult::Passed)
                },
            ))
        }
    );
}
