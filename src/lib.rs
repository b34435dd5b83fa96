// =============================================================================
// GRIDBLIT - minimal Vulkan presenter
// =============================================================================
//
// Opens a window, draws a 100 pixel grid on the CPU into a host-visible
// image and copies that image into the swapchain every frame.
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (winit event loop: desktop binary or Android activity)     │
// │    └── FramePresenter                                            │
// │          ├── VulkanLoader / VulkanInstance / WindowSurface       │
// │          ├── VulkanDevice + Swapchain                            │
// │          └── Canvas + CommandContext + FrameSemaphores           │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod pattern;
pub mod presenter;

pub use error::{FrameError, PresentError, SetupError};
pub use presenter::{FramePresenter, PresentedFrame, PresenterSettings};

/// Android NativeActivity entry point
#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(android_app: winit::platform::android::activity::AndroidApp) {
    use winit::event_loop::EventLoop;
    use winit::platform::android::activity::WindowManagerFlags;
    use winit::platform::android::EventLoopBuilderExtAndroid;

    // Without a fullscreen window some devices hand out a swapchain that
    // never matches the surface
    android_app.set_window_flags(WindowManagerFlags::FULLSCREEN, WindowManagerFlags::empty());

    let config = config::Config::load();
    app::init_logging(&config);
    log::info!("Starting gridblit (android)");

    let mut builder = EventLoop::builder();
    builder.with_android_app(android_app);
    let event_loop = match builder.build() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            return;
        }
    };

    let mut app = app::App::new(config);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop failed: {}", e);
    }
    if let Some(e) = app.take_failure() {
        log::error!("{:#}", e);
    }
}
