// Canvas - host-writable staging image
//
// A linearly tiled image in host-visible memory. The CPU writes the test
// pattern straight into it and the GPU copies it into the swapchain image.

use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;
use crate::error::{FrameError, SetupError, VkResultExt};
use crate::pattern;

const COLOR_SUBRESOURCE: vk::ImageSubresource = vk::ImageSubresource {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    mip_level: 0,
    array_layer: 0,
};

pub struct Canvas {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    /// Allocation size in bytes
    pub size: vk::DeviceSize,
    pub extent: vk::Extent2D,
    /// Layout the image is in once previously submitted work has finished
    pub layout: vk::ImageLayout,
    coherent: bool,
    device: Arc<VulkanDevice>,
}

impl Canvas {
    pub fn new(
        device: Arc<VulkanDevice>,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self, SetupError> {
        if bytes_per_pixel(format) != Some(pattern::BYTES_PER_PIXEL) {
            return Err(SetupError::UnsupportedCanvasFormat(format));
        }

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::LINEAR)
            .usage(vk::ImageUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::PREINITIALIZED);

        let image = unsafe { device.device.create_image(&image_info, None) }
            .setup("vkCreateImage")?;

        match Self::bind_memory(&device, image) {
            Ok((memory, size, coherent)) => {
                log::info!(
                    "Created {}x{} canvas ({} bytes, {})",
                    extent.width,
                    extent.height,
                    size,
                    if coherent { "coherent" } else { "non-coherent" }
                );
                Ok(Self {
                    image,
                    memory,
                    size,
                    extent,
                    layout: vk::ImageLayout::PREINITIALIZED,
                    coherent,
                    device,
                })
            }
            Err(e) => {
                unsafe { device.device.destroy_image(image, None) };
                Err(e)
            }
        }
    }

    fn bind_memory(
        device: &VulkanDevice,
        image: vk::Image,
    ) -> Result<(vk::DeviceMemory, vk::DeviceSize, bool), SetupError> {
        let mem_requirements = unsafe { device.device.get_image_memory_requirements(image) };

        let (memory_type_index, flags) = find_memory_type(
            &device.memory_properties,
            mem_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .ok_or(SetupError::NoHostVisibleMemory)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.device.allocate_memory(&alloc_info, None) }
            .setup("vkAllocateMemory")?;

        if let Err(e) = unsafe { device.device.bind_image_memory(image, memory, 0) } {
            unsafe { device.device.free_memory(memory, None) };
            return Err(SetupError::Vulkan {
                call: "vkBindImageMemory",
                result: e,
            });
        }

        Ok((
            memory,
            mem_requirements.size,
            flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT),
        ))
    }

    /// Map the canvas, draw the grid into it and unmap again.
    ///
    /// The caller must make sure no submitted work still reads the canvas.
    pub fn paint_grid(&mut self, spacing: u32) -> Result<(), FrameError> {
        let layout = unsafe {
            self.device
                .device
                .get_image_subresource_layout(self.image, COLOR_SUBRESOURCE)
        };

        let ptr = unsafe {
            self.device
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
        }
        .frame("vkMapMemory")?;

        let drawn = {
            let offset = layout.offset.min(self.size) as usize;
            let len = self.size as usize - offset;
            // Mapped range covers the whole allocation and stays valid until unmap
            let pixels =
                unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>().add(offset), len) };
            pattern::draw_grid(
                pixels,
                self.extent.width,
                self.extent.height,
                layout.row_pitch as usize,
                spacing,
            )
        };

        let flushed = if drawn.is_ok() && !self.coherent {
            let range = vk::MappedMemoryRange::builder()
                .memory(self.memory)
                .offset(0)
                .size(vk::WHOLE_SIZE)
                .build();
            unsafe { self.device.device.flush_mapped_memory_ranges(&[range]) }
                .frame("vkFlushMappedMemoryRanges")
        } else {
            Ok(())
        };

        unsafe { self.device.device.unmap_memory(self.memory) };

        drawn?;
        flushed
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_image(self.image, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

/// Find the first memory type allowed by `type_bits` that has `required`.
///
/// Types that also carry `preferred` win over earlier types that don't.
/// Returns the index and the full property flags of the chosen type.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
    preferred: vk::MemoryPropertyFlags,
) -> Option<(u32, vk::MemoryPropertyFlags)> {
    let candidates = || {
        (0..memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32)).filter_map(
            move |i| {
                let flags = memory_properties.memory_types[i as usize].property_flags;
                let allowed = type_bits & (1 << i) != 0;
                (allowed && flags.contains(required)).then_some((i, flags))
            },
        )
    };

    candidates()
        .find(|(_, flags)| flags.contains(preferred))
        .or_else(|| candidates().next())
}

/// Size of one texel for the uncompressed color formats a surface may report
pub fn bytes_per_pixel(format: vk::Format) -> Option<usize> {
    match format {
        vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB
        | vk::Format::B8G8R8A8_SNORM
        | vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::R8G8B8A8_SNORM
        | vk::Format::A8B8G8R8_UNORM_PACK32
        | vk::Format::A8B8G8R8_SRGB_PACK32
        | vk::Format::A2R10G10B10_UNORM_PACK32
        | vk::Format::A2B10G10R10_UNORM_PACK32 => Some(4),
        vk::Format::R5G6B5_UNORM_PACK16
        | vk::Format::B5G6R5_UNORM_PACK16
        | vk::Format::A1R5G5B5_UNORM_PACK16 => Some(2),
        vk::Format::R16G16B16A16_SFLOAT => Some(8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    const DEVICE_LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST_VISIBLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_COHERENT;

    #[test]
    fn prefers_coherent_host_memory() {
        let props = memory(&[DEVICE_LOCAL, HOST_VISIBLE, HOST_VISIBLE | HOST_COHERENT]);
        let (index, flags) =
            find_memory_type(&props, 0b111, HOST_VISIBLE, HOST_COHERENT).unwrap();
        assert_eq!(index, 2);
        assert!(flags.contains(HOST_COHERENT));
    }

    #[test]
    fn falls_back_to_first_host_visible() {
        let props = memory(&[DEVICE_LOCAL, HOST_VISIBLE, HOST_VISIBLE | HOST_COHERENT]);
        // type 2 is not allowed for this resource
        let (index, flags) =
            find_memory_type(&props, 0b011, HOST_VISIBLE, HOST_COHERENT).unwrap();
        assert_eq!(index, 1);
        assert!(!flags.contains(HOST_COHERENT));
    }

    #[test]
    fn no_host_visible_memory() {
        let props = memory(&[DEVICE_LOCAL, DEVICE_LOCAL]);
        assert!(find_memory_type(&props, 0b11, HOST_VISIBLE, HOST_COHERENT).is_none());
    }

    #[test]
    fn type_bits_are_respected() {
        let props = memory(&[HOST_VISIBLE | HOST_COHERENT]);
        assert!(find_memory_type(&props, 0b10, HOST_VISIBLE, HOST_COHERENT).is_none());
    }

    #[test]
    fn swapchain_formats_are_four_bytes() {
        assert_eq!(bytes_per_pixel(vk::Format::B8G8R8A8_SRGB), Some(4));
        assert_eq!(bytes_per_pixel(vk::Format::R8G8B8A8_UNORM), Some(4));
        assert_eq!(bytes_per_pixel(vk::Format::R5G6B5_UNORM_PACK16), Some(2));
        assert_eq!(bytes_per_pixel(vk::Format::UNDEFINED), None);
    }
}
