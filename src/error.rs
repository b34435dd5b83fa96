// Presenter error taxonomy
//
// Setup errors happen before the first frame and end the program cleanly.
// Frame errors happen inside the present cycle and may be skipped.

use ash::vk;
use thiserror::Error;

use crate::pattern::PatternError;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Vulkan library could not be loaded: {0}")]
    LoaderUnavailable(String),

    #[error("Vulkan commands did not resolve: {}", .0.join(", "))]
    MissingCommands(Vec<String>),

    #[error("no Vulkan physical device found")]
    NoPhysicalDevice,

    #[error("physical device reports no queue families")]
    NoQueueFamily,

    #[error("queue family 0 does not support graphics")]
    GraphicsUnsupported,

    #[error("queue family 0 cannot present to the window surface")]
    PresentUnsupported,

    #[error("surface reports no formats")]
    NoSurfaceFormat,

    #[error("surface reports no present modes")]
    NoPresentMode,

    #[error("surface format {0:?} is not a 4-byte-per-pixel format")]
    UnsupportedCanvasFormat(vk::Format),

    #[error("no host-visible memory type fits the canvas image")]
    NoHostVisibleMemory,

    #[error("unsupported window: {0}")]
    UnsupportedWindow(String),

    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },

    #[error("acquired image index {index} outside swapchain of {count} images")]
    ImageIndexOutOfRange { index: u32, count: usize },

    #[error("canvas fill failed: {0}")]
    Pattern(#[from] PatternError),
}

/// Any error the presenter can report
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("frame failed: {0}")]
    Frame(#[from] FrameError),
}

/// Attach the failing Vulkan call name to a raw `vk::Result`
pub(crate) trait VkResultExt<T> {
    fn setup(self, call: &'static str) -> Result<T, SetupError>;
    fn frame(self, call: &'static str) -> Result<T, FrameError>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn setup(self, call: &'static str) -> Result<T, SetupError> {
        self.map_err(|result| SetupError::Vulkan { call, result })
    }

    fn frame(self, call: &'static str) -> Result<T, FrameError> {
        self.map_err(|result| FrameError::Vulkan { call, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulkan_errors_name_the_call() {
        let err: Result<(), _> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = err.frame("vkQueueSubmit").unwrap_err();
        assert!(err.to_string().starts_with("vkQueueSubmit failed"));
    }

    #[test]
    fn missing_commands_are_listed() {
        let err = SetupError::MissingCommands(vec![
            "vkCreateSwapchainKHR".into(),
            "vkQueuePresentKHR".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Vulkan commands did not resolve: vkCreateSwapchainKHR, vkQueuePresentKHR"
        );
    }

    #[test]
    fn umbrella_keeps_the_phase() {
        let err: PresentError = SetupError::NoPhysicalDevice.into();
        assert!(matches!(err, PresentError::Setup(_)));

        let err: PresentError = FrameError::ImageIndexOutOfRange { index: 4, count: 3 }.into();
        assert!(matches!(err, PresentError::Frame(_)));
    }
}
