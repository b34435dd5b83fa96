// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash, one type per Vulkan object family,
// each destroying its handles on drop.

pub mod canvas;
pub mod commands;
pub mod device;
pub mod instance;
pub mod loader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use canvas::Canvas;
pub use commands::{CommandContext, ImageTransition};
pub use device::VulkanDevice;
pub use instance::VulkanInstance;
pub use loader::VulkanLoader;
pub use surface::WindowSurface;
pub use swapchain::Swapchain;
pub use sync::FrameSemaphores;
