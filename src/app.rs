// =============================================================================
// APPLICATION - winit event loop around the frame presenter
// =============================================================================
//
// EVENT FLOW:
// 1. resumed         -> create window (once), init presenter
// 2. about_to_wait   -> request redraw
// 3. RedrawRequested -> draw_frame
// 4. suspended       -> drop presenter (Android window went away)
// 5. CloseRequested / Escape -> drop presenter, exit
//
// =============================================================================

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::backend::VulkanLoader;
use crate::config::Config;
use crate::presenter::FramePresenter;

/// Initialize logging, optionally writing to the configured log file
pub fn init_logging(config: &Config) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();

    if config.debug.log_to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "=== gridblit log ===");
                let _ = writeln!(file, "Started: {:?}", std::time::SystemTime::now());
                let _ = writeln!(file);
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", config.debug.log_file, e),
        }
    }

    // A second init (Android activity restart) keeps the first logger
    let _ = builder.try_init();
}

/// Field order matters for Drop: the presenter must go before the window
/// its surface was created from.
pub struct App {
    presenter: Option<FramePresenter>,
    window: Option<Arc<Window>>,
    config: Config,

    /// Frames in a row that failed
    consecutive_failures: u32,
    warned_suboptimal: bool,
    warned_resize: bool,
    /// Why the loop stopped, if it was not a normal quit
    failure: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            presenter: None,
            window: None,
            config,
            consecutive_failures: 0,
            warned_suboptimal: false,
            warned_resize: false,
            failure: None,
        }
    }

    /// Error that ended the event loop, if any
    pub fn take_failure(&mut self) -> Option<anyhow::Error> {
        self.failure.take()
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            // The swapchain never follows the window size
            .with_resizable(false);

        if self.config.window.fullscreen {
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;
        Ok(Arc::new(window))
    }

    fn init_presenter(&self, window: &Window) -> Result<FramePresenter> {
        let loader = VulkanLoader::load(self.config.vulkan.library_path.as_deref())?;
        let size = window.inner_size();

        let presenter = FramePresenter::init(
            loader,
            window,
            (size.width, size.height),
            &self.config.presenter_settings(),
        )?;

        let extent = presenter.extent();
        log::info!(
            "Presenting {}x{} over {} swapchain images",
            extent.width,
            extent.height,
            presenter.image_count()
        );
        Ok(presenter)
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };

        match presenter.draw_frame() {
            Ok(frame) => {
                self.consecutive_failures = 0;
                if frame.suboptimal && !self.warned_suboptimal {
                    log::warn!("Swapchain is suboptimal for the surface, continuing");
                    self.warned_suboptimal = true;
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                let limit = self.config.presenter.max_consecutive_frame_errors.max(1);
                log::error!(
                    "Frame skipped ({}/{}): {}",
                    self.consecutive_failures,
                    limit,
                    e
                );

                if self.consecutive_failures >= limit {
                    log::error!("Too many failed frames, shutting down");
                    self.failure = Some(anyhow::Error::new(e).context("Present loop failed"));
                    self.shutdown(event_loop);
                }
            }
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        // Dropping the presenter waits for the GPU and frees everything
        self.presenter = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.presenter.is_some() {
            return;
        }

        let window = match self.window.clone() {
            Some(window) => window,
            None => match self.create_window(event_loop) {
                Ok(window) => window,
                Err(e) => {
                    log::error!("{:#}", e);
                    self.failure = Some(e);
                    event_loop.exit();
                    return;
                }
            },
        };

        match self.init_presenter(&window) {
            Ok(presenter) => self.presenter = Some(presenter),
            Err(e) => {
                log::error!("Failed to initialize presenter: {:#}", e);
                self.failure = Some(e);
                event_loop.exit();
            }
        }

        self.window = Some(window);
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if self.presenter.take().is_some() {
            log::info!("Window lost, presenter released");
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                let Some(presenter) = self.presenter.as_ref() else {
                    return;
                };
                let extent = presenter.extent();
                if (size.width, size.height) != (extent.width, extent.height) && !self.warned_resize {
                    log::warn!(
                        "Window resized to {}x{}, still presenting at {}x{}",
                        size.width,
                        size.height,
                        extent.width,
                        extent.height
                    );
                    self.warned_resize = true;
                }
            }

            WindowEvent::RedrawRequested => self.draw(event_loop),

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }

    /// Present continuously
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let (Some(window), Some(_)) = (&self.window, &self.presenter) {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.presenter = None;
    }
}
