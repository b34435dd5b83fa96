// Command recording
//
// One pool, one primary command buffer, reset and re-recorded every frame.

use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;
use crate::error::{FrameError, SetupError, VkResultExt};

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

const COLOR_LAYERS: vk::ImageSubresourceLayers = vk::ImageSubresourceLayers {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    mip_level: 0,
    base_array_layer: 0,
    layer_count: 1,
};

/// A single image layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransition {
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

impl ImageTransition {
    /// Make host writes to the canvas visible to the copy.
    ///
    /// `old_layout` is PREINITIALIZED on the first frame and GENERAL after.
    pub fn canvas_to_copy_source(old_layout: vk::ImageLayout) -> Self {
        Self {
            src_stage: vk::PipelineStageFlags::HOST,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
            src_access: vk::AccessFlags::HOST_WRITE,
            dst_access: vk::AccessFlags::TRANSFER_READ,
            old_layout,
            new_layout: vk::ImageLayout::GENERAL,
        }
    }

    /// Swapchain contents are discarded, the copy overwrites the whole image
    pub fn swapchain_to_copy_dest() -> Self {
        Self {
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::GENERAL,
        }
    }

    pub fn swapchain_to_present() -> Self {
        Self {
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::empty(),
            old_layout: vk::ImageLayout::GENERAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }
}

pub struct CommandContext {
    pub pool: vk::CommandPool,
    pub cmd: vk::CommandBuffer,
    device: Arc<VulkanDevice>,
}

impl CommandContext {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self, SetupError> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .setup("vkCreateCommandPool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = match unsafe { device.device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(result) => {
                unsafe { device.device.destroy_command_pool(pool, None) };
                return Err(SetupError::Vulkan {
                    call: "vkAllocateCommandBuffers",
                    result,
                });
            }
        };

        Ok(Self { pool, cmd, device })
    }

    /// Reset the command buffer and start recording
    pub fn begin(&self) -> Result<(), FrameError> {
        let device = &self.device.device;
        unsafe {
            device
                .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())
                .frame("vkResetCommandBuffer")?;

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(self.cmd, &begin_info)
                .frame("vkBeginCommandBuffer")
        }
    }

    pub fn end(&self) -> Result<(), FrameError> {
        unsafe { self.device.device.end_command_buffer(self.cmd) }.frame("vkEndCommandBuffer")
    }

    pub fn transition(&self, image: vk::Image, t: ImageTransition) {
        let barrier = vk::ImageMemoryBarrier::builder()
            .src_access_mask(t.src_access)
            .dst_access_mask(t.dst_access)
            .old_layout(t.old_layout)
            .new_layout(t.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(COLOR_RANGE)
            .build();

        unsafe {
            self.device.device.cmd_pipeline_barrier(
                self.cmd,
                t.src_stage,
                t.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    /// Copy the full `extent` of `src` into `dst`, both in GENERAL layout
    pub fn copy_image(&self, src: vk::Image, dst: vk::Image, extent: vk::Extent2D) {
        let region = vk::ImageCopy::builder()
            .src_subresource(COLOR_LAYERS)
            .dst_subresource(COLOR_LAYERS)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .build();

        unsafe {
            self.device.device.cmd_copy_image(
                self.cmd,
                src,
                vk::ImageLayout::GENERAL,
                dst,
                vk::ImageLayout::GENERAL,
                &[region],
            );
        }
    }
}

impl Drop for CommandContext {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer too
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_leaves_preinitialized_once() {
        let first = ImageTransition::canvas_to_copy_source(vk::ImageLayout::PREINITIALIZED);
        assert_eq!(first.old_layout, vk::ImageLayout::PREINITIALIZED);
        assert_eq!(first.new_layout, vk::ImageLayout::GENERAL);

        let later = ImageTransition::canvas_to_copy_source(first.new_layout);
        assert_eq!(later.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(later.new_layout, vk::ImageLayout::GENERAL);
        assert!(later.src_stage.contains(vk::PipelineStageFlags::HOST));
        assert!(later.dst_access.contains(vk::AccessFlags::TRANSFER_READ));
    }

    #[test]
    fn swapchain_layouts_chain_into_present() {
        let to_copy = ImageTransition::swapchain_to_copy_dest();
        let to_present = ImageTransition::swapchain_to_present();

        assert_eq!(to_copy.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(to_copy.new_layout, to_present.old_layout);
        assert_eq!(to_present.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(to_copy.dst_access, to_present.src_access);
    }

    #[test]
    fn copy_dest_waits_on_acquire_stage() {
        // The submit waits on the acquire semaphore at TRANSFER, so the
        // layout change must not start earlier than that stage.
        let t = ImageTransition::swapchain_to_copy_dest();
        assert_eq!(t.src_stage, vk::PipelineStageFlags::TRANSFER);
    }
}
