// Command pool and command buffer helpers

use anyhow::{Context, Result};
use ash::vk;
use super::VulkanDevice;

/// Command pool on the graphics queue family
pub fn create_command_pool(device: &VulkanDevice) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(device.queue_families.graphics);

    unsafe {
        device.device.create_command_pool(&pool_info, None)
            .context("Failed to create command pool")
    }
}

pub fn allocate_primary(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    unsafe {
        device.allocate_command_buffers(&alloc_info)
            .context("Failed to allocate command buffers")
    }
}

/// Record commands into a transient buffer, submit them to the graphics
/// queue and block until the queue is idle again.
pub fn submit_one_time<F>(device: &VulkanDevice, pool: vk::CommandPool, record: F) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let cmd = allocate_primary(&device.device, pool, 1)?[0];

    let result = (|| -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            device.device.begin_command_buffer(cmd, &begin_info)?;
            record(cmd);
            device.device.end_command_buffer(cmd)?;

            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

            device.device.queue_submit(
                device.graphics_queue,
                &[submit_info.build()],
                vk::Fence::null(),
            )?;
            device.device.queue_wait_idle(device.graphics_queue)?;
        }
        Ok(())
    })();

    unsafe { device.device.free_command_buffers(pool, &[cmd]) };
    result
}
