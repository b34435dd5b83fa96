// =============================================================================
// FRAME PRESENTER
// =============================================================================
//
// Owns every Vulkan object the demo needs and runs the present cycle:
//
//   queue idle -> paint canvas -> record (canvas barrier, acquire,
//   swapchain barrier, copy, present barrier) -> submit -> present ->
//   queue idle -> destroy frame semaphores
//
// Everything is synchronous. There is only ever one frame in flight.
//
// =============================================================================

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

use crate::backend::{
    Canvas, CommandContext, FrameSemaphores, ImageTransition, Swapchain, VulkanDevice,
    VulkanInstance, VulkanLoader, WindowSurface,
};
use crate::error::{FrameError, SetupError, VkResultExt};
use crate::pattern::DEFAULT_GRID_SPACING;

/// Knobs for [`FramePresenter::init`]
#[derive(Debug, Clone)]
pub struct PresenterSettings {
    pub app_name: String,
    pub enable_validation: bool,
    /// `None` takes the first mode the surface reports
    pub present_mode: Option<vk::PresentModeKHR>,
    pub grid_spacing: u32,
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self {
            app_name: "gridblit".to_string(),
            enable_validation: false,
            present_mode: None,
            grid_spacing: DEFAULT_GRID_SPACING,
        }
    }
}

/// Outcome of one successful [`FramePresenter::draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedFrame {
    pub image_index: u32,
    /// Acquire or present reported SUBOPTIMAL_KHR
    pub suboptimal: bool,
}

/// The graphics context.
///
/// Field order is drop order: command pool, canvas and swapchain go before
/// the surface, the device goes last (it is also kept alive by the Arcs
/// inside the other fields).
pub struct FramePresenter {
    commands: CommandContext,
    canvas: Canvas,
    swapchain: Swapchain,
    _surface: WindowSurface,
    device: Arc<VulkanDevice>,
    grid_spacing: u32,
    frames_presented: u64,
}

impl FramePresenter {
    /// Build the whole context for `window`.
    ///
    /// `window_size` is the window's inner size in pixels, used only when the
    /// surface does not dictate its own extent.
    pub fn init<W>(
        loader: VulkanLoader,
        window: &W,
        window_size: (u32, u32),
        settings: &PresenterSettings,
    ) -> Result<Self, SetupError>
    where
        W: HasWindowHandle + HasDisplayHandle + ?Sized,
    {
        log::info!("Initializing frame presenter...");

        let display = window
            .display_handle()
            .map_err(|e| SetupError::UnsupportedWindow(e.to_string()))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| SetupError::UnsupportedWindow(e.to_string()))?
            .as_raw();

        let instance = VulkanInstance::new(
            loader,
            &settings.app_name,
            display,
            settings.enable_validation,
        )?;
        let surface = WindowSurface::new(instance.clone(), display, window_handle)?;
        let device = VulkanDevice::new(instance, &surface)?;
        let swapchain = Swapchain::new(
            device.clone(),
            &surface,
            window_size,
            settings.present_mode,
        )?;
        let canvas = Canvas::new(device.clone(), swapchain.format, swapchain.extent)?;
        let commands = CommandContext::new(device.clone())?;

        log::info!("Frame presenter ready");

        Ok(Self {
            commands,
            canvas,
            swapchain,
            _surface: surface,
            device,
            grid_spacing: settings.grid_spacing,
            frames_presented: 0,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Run one full present cycle.
    ///
    /// Blocks until the presented frame's GPU work has finished.
    pub fn draw_frame(&mut self) -> Result<PresentedFrame, FrameError> {
        self.device.queue_wait_idle().frame("vkQueueWaitIdle")?;

        self.canvas.paint_grid(self.grid_spacing)?;

        let semaphores = FrameSemaphores::new(&self.device.device)?;
        let presented = self.record_and_submit(&semaphores);

        // Semaphores may only go once nothing on the queue still uses them
        let idle = self.device.queue_wait_idle().frame("vkQueueWaitIdle");
        semaphores.destroy(&self.device.device);

        let presented = presented?;
        idle?;

        self.frames_presented += 1;
        log::trace!(
            "Presented frame {} on image {}",
            self.frames_presented,
            presented.image_index
        );
        Ok(presented)
    }

    fn record_and_submit(
        &mut self,
        semaphores: &FrameSemaphores,
    ) -> Result<PresentedFrame, FrameError> {
        let cmd = &self.commands;
        cmd.begin()?;

        cmd.transition(
            self.canvas.image,
            ImageTransition::canvas_to_copy_source(self.canvas.layout),
        );

        let (image_index, acquire_suboptimal) = self
            .swapchain
            .acquire_next_image(u64::MAX, semaphores.image_acquired)?;
        let target = self.swapchain.images[image_index as usize];

        cmd.transition(target, ImageTransition::swapchain_to_copy_dest());
        cmd.copy_image(self.canvas.image, target, self.canvas.extent);
        cmd.transition(target, ImageTransition::swapchain_to_present());

        cmd.end()?;

        let wait_semaphores = [semaphores.image_acquired];
        let wait_stages = [vk::PipelineStageFlags::TRANSFER];
        let command_buffers = [cmd.cmd];
        let signal_semaphores = [semaphores.copy_complete];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.queue,
                &[submit_info.build()],
                vk::Fence::null(),
            )
        }
        .frame("vkQueueSubmit")?;

        self.canvas.layout = vk::ImageLayout::GENERAL;

        let present_suboptimal =
            self.swapchain
                .present(self.device.queue, image_index, &signal_semaphores)?;

        Ok(PresentedFrame {
            image_index,
            suboptimal: acquire_suboptimal || present_suboptimal,
        })
    }
}

impl Drop for FramePresenter {
    fn drop(&mut self) {
        log::info!(
            "Shutting down frame presenter after {} frames",
            self.frames_presented
        );
        // Nothing may be destroyed while the GPU still uses it
        if let Err(e) = self.device.wait_idle() {
            log::warn!("vkDeviceWaitIdle failed during shutdown: {}", e);
        }
    }
}
