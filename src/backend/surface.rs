// Window surface - the only platform-specific step
//
// Maps raw window/display handles onto the matching VK_KHR_*_surface
// extension. Everything after surface creation is shared.

use ash::extensions::khr;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;

use super::instance::VulkanInstance;
use crate::error::{SetupError, VkResultExt};

/// Surface extension required for windows on `display`
pub fn platform_extension(display: RawDisplayHandle) -> Result<&'static CStr, SetupError> {
    match display {
        RawDisplayHandle::Xlib(_) => Ok(khr::XlibSurface::name()),
        RawDisplayHandle::Xcb(_) => Ok(khr::XcbSurface::name()),
        RawDisplayHandle::Wayland(_) => Ok(khr::WaylandSurface::name()),
        RawDisplayHandle::Windows(_) => Ok(khr::Win32Surface::name()),
        RawDisplayHandle::Android(_) => Ok(khr::AndroidSurface::name()),
        other => Err(SetupError::UnsupportedWindow(format!("{other:?}"))),
    }
}

/// Surface creation command provided by [`platform_extension`]
pub fn platform_create_command(display: RawDisplayHandle) -> Result<&'static CStr, SetupError> {
    match display {
        RawDisplayHandle::Xlib(_) => Ok(c"vkCreateXlibSurfaceKHR"),
        RawDisplayHandle::Xcb(_) => Ok(c"vkCreateXcbSurfaceKHR"),
        RawDisplayHandle::Wayland(_) => Ok(c"vkCreateWaylandSurfaceKHR"),
        RawDisplayHandle::Windows(_) => Ok(c"vkCreateWin32SurfaceKHR"),
        RawDisplayHandle::Android(_) => Ok(c"vkCreateAndroidSurfaceKHR"),
        other => Err(SetupError::UnsupportedWindow(format!("{other:?}"))),
    }
}

/// Presentable surface, destroyed with its owning instance still alive
pub struct WindowSurface {
    pub surface: vk::SurfaceKHR,
    instance: Arc<VulkanInstance>,
}

impl WindowSurface {
    pub fn new(
        instance: Arc<VulkanInstance>,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Self, SetupError> {
        let surface = unsafe { create_surface(&instance, display, window)? };
        log::info!("Created window surface");
        Ok(Self { surface, instance })
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        unsafe {
            self.instance
                .surface_loader
                .destroy_surface(self.surface, None);
        }
    }
}

/// # Safety
/// The handles must describe a live window that outlives the surface.
unsafe fn create_surface(
    instance: &VulkanInstance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> Result<vk::SurfaceKHR, SetupError> {
    let entry = instance.loader().entry();
    let ash_instance = &instance.instance;

    match (display, window) {
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => {
            let dpy = display
                .display
                .ok_or_else(|| SetupError::UnsupportedWindow("Xlib display is null".into()))?;
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy.as_ptr().cast())
                .window(window.window as vk::Window);
            khr::XlibSurface::new(entry, ash_instance)
                .create_xlib_surface(&create_info, None)
                .setup("vkCreateXlibSurfaceKHR")
        }
        (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window)) => {
            let connection = display
                .connection
                .ok_or_else(|| SetupError::UnsupportedWindow("XCB connection is null".into()))?;
            let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                .connection(connection.as_ptr().cast())
                .window(window.window.get());
            khr::XcbSurface::new(entry, ash_instance)
                .create_xcb_surface(&create_info, None)
                .setup("vkCreateXcbSurfaceKHR")
        }
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr().cast())
                .surface(window.surface.as_ptr().cast());
            khr::WaylandSurface::new(entry, ash_instance)
                .create_wayland_surface(&create_info, None)
                .setup("vkCreateWaylandSurfaceKHR")
        }
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(window)) => {
            let hinstance = window.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
            let hwnd = window.hwnd.get() as *const std::ffi::c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            khr::Win32Surface::new(entry, ash_instance)
                .create_win32_surface(&create_info, None)
                .setup("vkCreateWin32SurfaceKHR")
        }
        (RawDisplayHandle::Android(_), RawWindowHandle::AndroidNdk(window)) => {
            let create_info = vk::AndroidSurfaceCreateInfoKHR::builder()
                .window(window.a_native_window.as_ptr().cast());
            khr::AndroidSurface::new(entry, ash_instance)
                .create_android_surface(&create_info, None)
                .setup("vkCreateAndroidSurfaceKHR")
        }
        (display, window) => Err(SetupError::UnsupportedWindow(format!(
            "{display:?} / {window:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, XlibDisplayHandle};
    use std::ptr::NonNull;

    #[test]
    fn extension_follows_display_kind() {
        let xlib = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        assert_eq!(platform_extension(xlib).unwrap(), c"VK_KHR_xlib_surface");
        assert_eq!(platform_create_command(xlib).unwrap(), c"vkCreateXlibSurfaceKHR");

        let mut dummy = 0u8;
        let wayland = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(
            NonNull::from(&mut dummy).cast(),
        ));
        assert_eq!(platform_extension(wayland).unwrap(), c"VK_KHR_wayland_surface");
    }

    #[test]
    fn web_displays_are_rejected() {
        let web = RawDisplayHandle::Web(raw_window_handle::WebDisplayHandle::new());
        assert!(matches!(
            platform_extension(web),
            Err(SetupError::UnsupportedWindow(_))
        ));
    }
}
