//! Presents a few frames to a real window.
//!
//! Needs a display and a Vulkan driver, run with `cargo test -- --ignored`.
#![cfg(target_os = "linux")]

use gridblit::backend::VulkanLoader;
use gridblit::{FramePresenter, PresentError, PresenterSettings};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::x11::EventLoopBuilderExtX11;
use winit::window::{Window, WindowAttributes, WindowId};

const FRAMES: usize = 8;

#[derive(Default)]
struct Smoke {
    window: Option<Window>,
    indices: Vec<u32>,
    image_count: usize,
    error: Option<PresentError>,
}

impl Smoke {
    fn run(&mut self, window: &Window) -> Result<(), PresentError> {
        let loader = VulkanLoader::load(None)?;
        let mut presenter =
            FramePresenter::init(loader, window, (640, 480), &PresenterSettings::default())?;
        self.image_count = presenter.image_count();

        for _ in 0..FRAMES {
            self.indices.push(presenter.draw_frame()?.image_index);
        }
        assert_eq!(presenter.frames_presented(), FRAMES as u64);
        Ok(())
    }
}

impl ApplicationHandler for Smoke {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title("gridblit smoke test")
                    .with_inner_size(PhysicalSize::new(640, 480)),
            )
            .expect("window");

        if let Err(e) = self.run(&window) {
            self.error = Some(e);
        }
        self.window = Some(window);
        event_loop.exit();
    }

    fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, _: WindowEvent) {}
}

#[test]
#[ignore = "needs a display and a Vulkan driver"]
fn init_then_draw_frames() {
    let mut builder = EventLoop::builder();
    builder.with_any_thread(true);
    let event_loop = builder.build().expect("event loop");

    let mut smoke = Smoke::default();
    event_loop.run_app(&mut smoke).expect("run");

    if let Some(e) = smoke.error {
        panic!("presenter failed: {e}");
    }
    assert_eq!(smoke.indices.len(), FRAMES);
    assert!(smoke.image_count > 0);
    assert!(smoke.indices.iter().all(|&i| (i as usize) < smoke.image_count));
}
