// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device selection (first enumerated device)
// - Queue family 0 must do graphics and present to our surface
// - Logical device + single queue creation

use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

use super::instance::VulkanInstance;
use super::surface::WindowSurface;
use crate::error::{SetupError, VkResultExt};

/// The presenter always runs on queue family 0
pub const QUEUE_FAMILY_INDEX: u32 = 0;

pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub instance: Arc<VulkanInstance>,
}

impl VulkanDevice {
    pub fn new(
        instance: Arc<VulkanInstance>,
        surface: &WindowSurface,
    ) -> Result<Arc<Self>, SetupError> {
        let physical_device = Self::pick_physical_device(&instance.instance)?;

        let queue_families = unsafe {
            instance
                .instance
                .get_physical_device_queue_family_properties(physical_device)
        };
        let queue_family = select_queue_family(&queue_families)?;

        let present_support = unsafe {
            instance.surface_loader.get_physical_device_surface_support(
                physical_device,
                queue_family,
                surface.surface,
            )
        }
        .setup("vkGetPhysicalDeviceSurfaceSupportKHR")?;

        if !present_support {
            return Err(SetupError::PresentUnsupported);
        }

        let device = Self::create_logical_device(&instance.instance, physical_device, queue_family)?;

        if let Err(e) = instance
            .loader()
            .check_device_commands(&instance.instance, device.handle())
        {
            unsafe { device.destroy_device(None) };
            return Err(e);
        }

        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let properties = unsafe {
            instance
                .instance
                .get_physical_device_properties(physical_device)
        };
        let memory_properties = unsafe {
            instance
                .instance
                .get_physical_device_memory_properties(physical_device)
        };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        Ok(Arc::new(Self {
            device,
            physical_device,
            queue,
            queue_family,
            properties,
            memory_properties,
            instance,
        }))
    }

    fn pick_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice, SetupError> {
        let devices =
            unsafe { instance.enumerate_physical_devices() }.setup("vkEnumeratePhysicalDevices")?;

        log::debug!("Found {} physical device(s)", devices.len());

        devices.first().copied().ok_or(SetupError::NoPhysicalDevice)
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<ash::Device, SetupError> {
        let queue_priorities = [0.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        unsafe { instance.create_device(physical_device, &create_info, None) }
            .setup("vkCreateDevice")
    }

    /// Block until the single queue has drained
    pub fn queue_wait_idle(&self) -> Result<(), vk::Result> {
        unsafe { self.device.queue_wait_idle(self.queue) }
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        unsafe { self.device.device_wait_idle() }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

/// Queue family 0 must exist and support graphics
pub fn select_queue_family(families: &[vk::QueueFamilyProperties]) -> Result<u32, SetupError> {
    let family = families
        .get(QUEUE_FAMILY_INDEX as usize)
        .ok_or(SetupError::NoQueueFamily)?;

    if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
        return Err(SetupError::GraphicsUnsupported);
    }

    Ok(QUEUE_FAMILY_INDEX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn graphics_family_zero_is_selected() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        assert_eq!(select_queue_family(&families).unwrap(), 0);
    }

    #[test]
    fn family_zero_without_graphics_fails() {
        // A later graphics family does not help, the presenter only uses family 0
        let families = [
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert!(matches!(
            select_queue_family(&families),
            Err(SetupError::GraphicsUnsupported)
        ));
    }

    #[test]
    fn no_families_fails() {
        assert!(matches!(
            select_queue_family(&[]),
            Err(SetupError::NoQueueFamily)
        ));
    }
}
