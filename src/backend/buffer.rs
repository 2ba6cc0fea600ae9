// Buffer utilities for vertex and index buffers
//
// Device-local buffers are filled through a host-visible staging buffer and
// a one-shot transfer command.

use anyhow::{Context, Result};
use ash::vk;
use super::command;
use super::VulkanDevice;

/// A buffer with its own dedicated memory allocation
pub struct DeviceBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl DeviceBuffer {
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// Helper to create a GPU buffer with specified usage and memory properties
pub fn create_buffer(
    device: &VulkanDevice,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_properties: vk::MemoryPropertyFlags,
) -> Result<DeviceBuffer> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe {
        device.device.create_buffer(&buffer_info, None)
            .context("Failed to create buffer")?
    };

    let mem_requirements = unsafe {
        device.device.get_buffer_memory_requirements(buffer)
    };

    let memory_type_index = match find_memory_type(
        &device.memory_properties,
        mem_requirements.memory_type_bits,
        memory_properties,
    ) {
        Ok(index) => index,
        Err(e) => {
            unsafe { device.device.destroy_buffer(buffer, None) };
            return Err(e);
        }
    };

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(mem_requirements.size)
        .memory_type_index(memory_type_index);

    let memory = match unsafe { device.device.allocate_memory(&alloc_info, None) } {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.device.destroy_buffer(buffer, None) };
            return Err(e).context("Failed to allocate buffer memory");
        }
    };

    let buffer = DeviceBuffer { buffer, memory, size };

    if let Err(e) = unsafe { device.device.bind_buffer_memory(buffer.buffer, buffer.memory, 0) } {
        buffer.destroy(&device.device);
        return Err(e).context("Failed to bind buffer memory");
    }

    Ok(buffer)
}

/// Create a device-local buffer holding `data`, uploaded via a staging buffer
pub fn create_device_local_buffer(
    device: &VulkanDevice,
    command_pool: vk::CommandPool,
    usage: vk::BufferUsageFlags,
    data: &[u8],
) -> Result<DeviceBuffer> {
    let size = data.len() as vk::DeviceSize;

    let staging = create_buffer(
        device,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    // The staging buffer goes away on every path out of here
    let result = fill_and_copy(device, command_pool, &staging, usage, data);
    staging.destroy(&device.device);
    result
}

fn fill_and_copy(
    device: &VulkanDevice,
    command_pool: vk::CommandPool,
    staging: &DeviceBuffer,
    usage: vk::BufferUsageFlags,
    data: &[u8],
) -> Result<DeviceBuffer> {
    write_mapped(&device.device, staging, data)?;

    let buffer = create_buffer(
        device,
        staging.size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let copied = command::submit_one_time(device, command_pool, |cmd| {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: staging.size,
        };
        unsafe {
            device.device.cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[region]);
        }
    });

    if let Err(e) = copied {
        buffer.destroy(&device.device);
        return Err(e).context("Failed to copy staging buffer");
    }

    log::debug!("Uploaded {} bytes ({:?})", staging.size, usage);
    Ok(buffer)
}

/// Copy `data` into host-visible memory
fn write_mapped(device: &ash::Device, buffer: &DeviceBuffer, data: &[u8]) -> Result<()> {
    unsafe {
        let ptr = device
            .map_memory(buffer.memory, 0, buffer.size, vk::MemoryMapFlags::empty())
            .context("Failed to map staging memory")? as *mut u8;

        ptr.copy_from_nonoverlapping(data.as_ptr(), data.len());
        device.unmap_memory(buffer.memory);
    }
    Ok(())
}

/// Find a suitable memory type index
///
/// Returns the lowest index allowed by `type_filter` whose flags contain
/// every bit of `properties`.
pub fn find_memory_type(
    mem_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    for i in 0..mem_properties.memory_type_count {
        let has_type = (type_filter & (1 << i)) != 0;
        let has_properties = mem_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);

        if has_type && has_properties {
            return Ok(i);
        }
    }

    anyhow::bail!("Failed to find suitable memory type")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn picks_lowest_matching_index() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type(&props, 0b111, HOST).unwrap(), 1);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn respects_the_type_filter() {
        let props = memory_properties(&[HOST, HOST]);
        assert_eq!(find_memory_type(&props, 0b10, HOST).unwrap(), 1);
    }

    #[test]
    fn partial_flag_match_is_not_enough() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        let err = find_memory_type(&props, 0b1, HOST).unwrap_err();
        assert!(err.to_string().contains("suitable memory type"));
    }

    #[test]
    fn types_past_the_count_are_ignored() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = HOST;
        assert!(find_memory_type(&props, 0b11, HOST).is_err());
    }
}
