use anyhow::Result;
use gridblit::app::{init_logging, App};
use gridblit::config::Config;
use winit::event_loop::EventLoop;

fn main() -> Result<()> {
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting gridblit");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.take_failure() {
        Some(e) => Err(e),
        None => {
            log::info!("Clean exit");
            Ok(())
        }
    }
}
