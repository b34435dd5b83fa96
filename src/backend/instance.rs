// Vulkan Instance - API entry with surface extensions
//
// Responsibilities:
// - Instance creation with the platform surface extension
// - Optional validation layer + debug messenger routed into `log`
// - Owns the loader so the library stays mapped while handles exist

use ash::extensions::{ext::DebugUtils, khr::Surface};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use super::loader::VulkanLoader;
use super::surface;
use crate::error::{SetupError, VkResultExt};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct VulkanInstance {
    pub instance: ash::Instance,
    pub surface_loader: Surface,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    loader: VulkanLoader,
}

impl VulkanInstance {
    /// Create an instance able to present to windows on `display`
    pub fn new(
        loader: VulkanLoader,
        app_name: &str,
        display: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<Arc<Self>, SetupError> {
        log::info!("Creating Vulkan instance: {}", app_name);

        let platform_extension = surface::platform_extension(display)?;
        let create_command = surface::platform_create_command(display)?;
        let enable_validation = enable_validation && Self::validation_available(&loader);

        let app_name_cstr = CString::new(app_name).unwrap_or_else(|_| CString::from(c"gridblit"));
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = vec![Surface::name().as_ptr(), platform_extension.as_ptr()];
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { loader.entry().create_instance(&create_info, None) }
            .setup("vkCreateInstance")?;

        if let Err(e) = loader.check_instance_commands(instance.handle(), &[create_command]) {
            unsafe { instance.destroy_instance(None) };
            return Err(e);
        }

        let debug_utils = if enable_validation {
            match Self::setup_debug_messenger(&loader, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    log::warn!("Debug messenger unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = Surface::new(loader.entry(), &instance);

        Ok(Arc::new(Self {
            instance,
            surface_loader,
            debug_utils,
            loader,
        }))
    }

    pub fn loader(&self) -> &VulkanLoader {
        &self.loader
    }

    fn validation_available(loader: &VulkanLoader) -> bool {
        let layers = match loader.entry().enumerate_instance_layer_properties() {
            Ok(layers) => layers,
            Err(e) => {
                log::warn!("Could not enumerate instance layers: {}", e);
                return false;
            }
        };

        let found = layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER
        });

        if !found {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        found
    }

    fn setup_debug_messenger(
        loader: &VulkanLoader,
        instance: &ash::Instance,
    ) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT), SetupError> {
        let debug_utils = DebugUtils::new(loader.entry(), instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .setup("vkCreateDebugUtilsMessengerEXT")?;

        Ok((debug_utils, messenger))
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
