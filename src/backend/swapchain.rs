// Swapchain - Window presentation
//
// Images are only ever written by transfer (canvas copy), so no image
// views are created. Format and present mode default to whatever the
// surface lists first.

use ash::vk;
use std::sync::Arc;

use super::surface::WindowSurface;
use super::VulkanDevice;
use crate::error::{FrameError, SetupError, VkResultExt};

/// Image count requested before clamping to the surface limits
pub const PREFERRED_IMAGE_COUNT: u32 = 3;

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    /// `window_size` is only used when the surface leaves the extent to us
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: &WindowSurface,
        window_size: (u32, u32),
        preferred_present_mode: Option<vk::PresentModeKHR>,
    ) -> Result<Self, SetupError> {
        let surface_loader = &device.instance.surface_loader;

        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(device.physical_device, surface.surface)
        }
        .setup("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface.surface)
        }
        .setup("vkGetPhysicalDeviceSurfaceFormatsKHR")?;

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, surface.surface)
        }
        .setup("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        let surface_format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes, preferred_present_mode)?;
        let extent = choose_extent(&surface_caps, window_size);
        let image_count = choose_image_count(&surface_caps);

        log::info!(
            "Creating swapchain: {}x{} {:?} {:?}, {} images requested",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            image_count
        );

        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(&device.instance.instance, &device.device);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(choose_transform(&surface_caps))
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .setup("vkCreateSwapchainKHR")?;

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(result) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(SetupError::Vulkan {
                    call: "vkGetSwapchainImagesKHR",
                    result,
                });
            }
        };

        log::info!("Created swapchain with {} images", images.len());

        Ok(Self {
            swapchain,
            swapchain_loader,
            images,
            format: surface_format.format,
            extent,
            present_mode,
            device,
        })
    }

    /// Acquire next image, signalling `semaphore` once it is usable.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(
        &self,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), FrameError> {
        let (index, suboptimal) = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        }
        .frame("vkAcquireNextImageKHR")?;

        validate_image_index(index, self.images.len())?;
        Ok((index, suboptimal))
    }

    /// Present image `image_index` once `wait_semaphores` signal
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool, FrameError> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
            .frame("vkQueuePresentKHR")
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, SetupError> {
    formats.first().copied().ok_or(SetupError::NoSurfaceFormat)
}

/// First reported mode, unless `preferred` is also reported
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: Option<vk::PresentModeKHR>,
) -> Result<vk::PresentModeKHR, SetupError> {
    let first = *modes.first().ok_or(SetupError::NoPresentMode)?;

    match preferred {
        Some(mode) if modes.contains(&mode) => Ok(mode),
        Some(mode) => {
            log::warn!("Present mode {:?} not supported, using {:?}", mode, first);
            Ok(first)
        }
        None => Ok(first),
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_size: (u32, u32)) -> vk::Extent2D {
    // u32::MAX means the surface size follows whatever the swapchain picks
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: window_size
            .0
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window_size
            .1
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = PREFERRED_IMAGE_COUNT.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count = count.min(caps.max_image_count);
    }
    count
}

fn choose_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

pub fn validate_image_index(index: u32, count: usize) -> Result<(), FrameError> {
    if (index as usize) < count {
        Ok(())
    } else {
        Err(FrameError::ImageIndexOutOfRange { index, count })
    }
}
