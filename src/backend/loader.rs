// Vulkan loader - runtime entry point resolution
//
// The Vulkan library is opened at runtime (no import library). Every command
// the presenter calls is resolved up front so a missing symbol is reported
// as a setup error instead of surfacing on first use.

use ash::{vk, Entry};
use std::ffi::CStr;
use std::path::{Path, PathBuf};

use crate::error::SetupError;

/// Commands resolvable without an instance
pub const GLOBAL_COMMANDS: &[&CStr] = &[
    c"vkCreateInstance",
    c"vkEnumerateInstanceExtensionProperties",
    c"vkEnumerateInstanceLayerProperties",
];

/// Instance-level commands used during setup
pub const INSTANCE_COMMANDS: &[&CStr] = &[
    c"vkDestroyInstance",
    c"vkEnumeratePhysicalDevices",
    c"vkGetPhysicalDeviceProperties",
    c"vkGetPhysicalDeviceQueueFamilyProperties",
    c"vkGetPhysicalDeviceMemoryProperties",
    c"vkCreateDevice",
    c"vkGetDeviceProcAddr",
    c"vkDestroySurfaceKHR",
    c"vkGetPhysicalDeviceSurfaceSupportKHR",
    c"vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
    c"vkGetPhysicalDeviceSurfaceFormatsKHR",
    c"vkGetPhysicalDeviceSurfacePresentModesKHR",
];

/// Device-level commands used by setup and the present cycle
pub const DEVICE_COMMANDS: &[&CStr] = &[
    c"vkDestroyDevice",
    c"vkGetDeviceQueue",
    c"vkDeviceWaitIdle",
    c"vkQueueWaitIdle",
    c"vkQueueSubmit",
    c"vkCreateSwapchainKHR",
    c"vkDestroySwapchainKHR",
    c"vkGetSwapchainImagesKHR",
    c"vkAcquireNextImageKHR",
    c"vkQueuePresentKHR",
    c"vkCreateImage",
    c"vkDestroyImage",
    c"vkGetImageMemoryRequirements",
    c"vkGetImageSubresourceLayout",
    c"vkAllocateMemory",
    c"vkFreeMemory",
    c"vkBindImageMemory",
    c"vkMapMemory",
    c"vkUnmapMemory",
    c"vkFlushMappedMemoryRanges",
    c"vkCreateCommandPool",
    c"vkDestroyCommandPool",
    c"vkAllocateCommandBuffers",
    c"vkResetCommandBuffer",
    c"vkBeginCommandBuffer",
    c"vkEndCommandBuffer",
    c"vkCmdPipelineBarrier",
    c"vkCmdCopyImage",
    c"vkCreateSemaphore",
    c"vkDestroySemaphore",
];

/// Handle to a loaded Vulkan library.
///
/// Owned by whoever builds the presenter and handed to it at construction.
pub struct VulkanLoader {
    entry: Entry,
    library: Option<PathBuf>,
}

impl VulkanLoader {
    /// Open the system Vulkan library, or `library` when given
    pub fn load(library: Option<&Path>) -> Result<Self, SetupError> {
        let entry = match library {
            Some(path) => unsafe { Entry::load_from(path) },
            None => unsafe { Entry::load() },
        }
        .map_err(|e| SetupError::LoaderUnavailable(e.to_string()))?;

        let loader = Self {
            entry,
            library: library.map(Path::to_path_buf),
        };

        loader.check_global_commands()?;

        log::info!(
            "Loaded Vulkan library {}",
            loader
                .library
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(system default)".to_string())
        );

        Ok(loader)
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    fn check_global_commands(&self) -> Result<(), SetupError> {
        require(GLOBAL_COMMANDS, |name| unsafe {
            self.entry
                .get_instance_proc_addr(vk::Instance::null(), name.as_ptr())
                .is_some()
        })
    }

    /// Verify instance-level commands, plus any platform `extra` commands
    pub fn check_instance_commands(
        &self,
        instance: vk::Instance,
        extra: &[&CStr],
    ) -> Result<(), SetupError> {
        let names: Vec<&CStr> = INSTANCE_COMMANDS.iter().chain(extra).copied().collect();
        require(&names, |name| unsafe {
            self.entry
                .get_instance_proc_addr(instance, name.as_ptr())
                .is_some()
        })
    }

    pub fn check_device_commands(
        &self,
        instance: &ash::Instance,
        device: vk::Device,
    ) -> Result<(), SetupError> {
        let get_device_proc_addr = instance.fp_v1_0().get_device_proc_addr;
        require(DEVICE_COMMANDS, |name| unsafe {
            get_device_proc_addr(device, name.as_ptr()).is_some()
        })
    }
}

/// Resolve each name, failing with the complete list of names that did not resolve
fn require(names: &[&CStr], resolves: impl FnMut(&CStr) -> bool) -> Result<(), SetupError> {
    let missing = missing_commands(names, resolves);
    if missing.is_empty() {
        Ok(())
    } else {
        for name in &missing {
            log::error!("Vulkan command '{}' is not available", name);
        }
        Err(SetupError::MissingCommands(missing))
    }
}

pub(crate) fn missing_commands(
    names: &[&CStr],
    mut resolves: impl FnMut(&CStr) -> bool,
) -> Vec<String> {
    names
        .iter()
        .filter(|name| !resolves(name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_unresolved_command() {
        let missing = missing_commands(DEVICE_COMMANDS, |name| {
            !name.to_bytes().ends_with(b"KHR")
        });
        assert_eq!(
            missing,
            [
                "vkCreateSwapchainKHR",
                "vkDestroySwapchainKHR",
                "vkGetSwapchainImagesKHR",
                "vkAcquireNextImageKHR",
                "vkQueuePresentKHR",
            ]
        );
    }

    #[test]
    fn all_resolved_is_ok() {
        assert!(require(INSTANCE_COMMANDS, |_| true).is_ok());
    }

    #[test]
    fn none_resolved_lists_all() {
        match require(GLOBAL_COMMANDS, |_| false) {
            Err(SetupError::MissingCommands(names)) => assert_eq!(names.len(), GLOBAL_COMMANDS.len()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn command_tables_have_no_duplicates() {
        let mut all: Vec<&CStr> = GLOBAL_COMMANDS
            .iter()
            .chain(INSTANCE_COMMANDS)
            .chain(DEVICE_COMMANDS)
            .copied()
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
