// Synchronization primitives
//
// GPU-GPU ordering only: the host already blocks on queue idle.

use ash::vk;

use crate::error::{FrameError, VkResultExt};

/// Per-frame semaphore pair, created and destroyed around every present
pub struct FrameSemaphores {
    /// Signalled by acquire, waited on by the copy submission
    pub image_acquired: vk::Semaphore,
    /// Signalled by the copy submission, waited on by present
    pub copy_complete: vk::Semaphore,
}

impl FrameSemaphores {
    pub fn new(device: &ash::Device) -> Result<Self, FrameError> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();

        unsafe {
            let image_acquired = device
                .create_semaphore(&semaphore_info, None)
                .frame("vkCreateSemaphore")?;
            let copy_complete = match device.create_semaphore(&semaphore_info, None) {
                Ok(semaphore) => semaphore,
                Err(result) => {
                    device.destroy_semaphore(image_acquired, None);
                    return Err(FrameError::Vulkan {
                        call: "vkCreateSemaphore",
                        result,
                    });
                }
            };
            Ok(Self {
                image_acquired,
                copy_complete,
            })
        }
    }

    /// The queue must be idle so neither semaphore is still pending
    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_acquired, None);
            device.destroy_semaphore(self.copy_complete, None);
        }
    }
}
