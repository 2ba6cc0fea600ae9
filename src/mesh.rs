// GPU-resident geometry for the buffers sample

use anyhow::Result;
use ash::vk;

use crate::backend::buffer::{self, DeviceBuffer};
use crate::backend::VulkanDevice;
use crate::geometry::Vertex;

/// Vertex and index buffers in device-local memory
pub struct Mesh {
    pub vertex_buffer: DeviceBuffer,
    pub index_buffer: DeviceBuffer,
}

impl Mesh {
    /// Upload vertices and 16-bit indices through staging buffers
    pub fn upload(
        device: &VulkanDevice,
        command_pool: vk::CommandPool,
        vertices: &[Vertex],
        indices: &[u16],
    ) -> Result<Self> {
        let vertex_buffer = buffer::create_device_local_buffer(
            device,
            command_pool,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(vertices),
        )?;

        let index_buffer = match buffer::create_device_local_buffer(
            device,
            command_pool,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(indices),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                vertex_buffer.destroy(&device.device);
                return Err(e);
            }
        };

        log::info!("Uploaded mesh: {} vertices, {} indices", vertices.len(), indices.len());

        Ok(Self {
            vertex_buffer,
            index_buffer,
        })
    }

    pub fn bind(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT16);
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        self.index_buffer.destroy(device);
        self.vertex_buffer.destroy(device);
    }
}
