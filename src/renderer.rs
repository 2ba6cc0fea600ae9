// =============================================================================
// RENDERER - per-sample Vulkan resources and the frame loop
// =============================================================================
//
// Lifetime tiers:
// - device-wide:    command pool, sync objects, shaders, layout, mesh
// - per-swapchain:  swapchain, pipeline, framebuffers, command buffers
//
// The per-swapchain tier is torn down and rebuilt on resize and on shader
// hot reload.

use anyhow::{Context, Result};
use ash::vk;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::pipeline::{self, PipelineDesc};
use crate::backend::sync::{FrameCounter, FrameSync};
use crate::backend::{command, shader, Swapchain, VulkanDevice};
use crate::config::Config;
use crate::geometry::{DrawCall, Sample, QUAD_INDICES, QUAD_VERTICES};
use crate::mesh::Mesh;

struct ShaderModules {
    vert: vk::ShaderModule,
    frag: vk::ShaderModule,
}

impl ShaderModules {
    fn load(device: &VulkanDevice, directory: &Path, sample: Sample) -> Result<Self> {
        let vert = shader::load_shader_module(device, &directory.join(sample.vertex_shader()))?;
        let frag = match shader::load_shader_module(device, &directory.join(sample.fragment_shader())) {
            Ok(frag) => frag,
            Err(e) => {
                unsafe { device.device.destroy_shader_module(vert, None) };
                return Err(e);
            }
        };
        Ok(Self { vert, frag })
    }

    fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_shader_module(self.frag, None);
            device.destroy_shader_module(self.vert, None);
        }
    }
}

/// Result of [`swap_or_keep`]
struct Swap<T> {
    /// The value no longer in use, ready to be destroyed
    retired: Option<T>,
    /// Why the candidate was rejected
    error: Option<anyhow::Error>,
}

/// Put `candidate` into `slot` and `activate` it. If activation fails the
/// previous value goes back into the slot and is activated again; the
/// candidate is then the one retired. Only a failed rollback is an error.
fn swap_or_keep<C, T>(
    ctx: &mut C,
    slot: impl Fn(&mut C) -> &mut Option<T>,
    candidate: T,
    mut activate: impl FnMut(&mut C) -> Result<()>,
) -> Result<Swap<T>> {
    let previous = slot(ctx).replace(candidate);

    match activate(ctx) {
        Ok(()) => Ok(Swap {
            retired: previous,
            error: None,
        }),
        Err(e) => {
            let rejected = std::mem::replace(slot(ctx), previous);
            activate(ctx).context("Failed to restore previous resources")?;
            Ok(Swap {
                retired: rejected,
                error: Some(e),
            })
        }
    }
}

/// Window framebuffer size and the pending-resize flag
#[derive(Debug)]
struct SurfaceState {
    size: (u32, u32),
    /// Set by the window on resize, consumed after the next present
    resized: bool,
}

impl SurfaceState {
    fn new(size: (u32, u32)) -> Self {
        Self { size, resized: false }
    }

    fn is_minimized(&self) -> bool {
        self.size.0 == 0 || self.size.1 == 0
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.resized = true;
    }

    /// Whether the swapchain must be rebuilt after presenting; clears the flag
    fn take_recreate(&mut self, present_stale: bool) -> bool {
        let recreate = present_stale || self.resized;
        self.resized = false;
        recreate
    }
}

pub struct Renderer {
    sample: Sample,
    clear_color: [f32; 4],
    present_mode: Option<vk::PresentModeKHR>,
    shader_dir: PathBuf,

    // ─────────────────────────────────────────────────────────────────────────
    // PER-SWAPCHAIN
    // ─────────────────────────────────────────────────────────────────────────
    swapchain: Option<Swapchain>,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
    /// One per swapchain image, recorded once per swapchain
    command_buffers: Vec<vk::CommandBuffer>,

    // ─────────────────────────────────────────────────────────────────────────
    // DEVICE-WIDE
    // ─────────────────────────────────────────────────────────────────────────
    render_pass: vk::RenderPass,
    render_pass_format: vk::Format,
    pipeline_layout: vk::PipelineLayout,
    shaders: Option<ShaderModules>,
    mesh: Option<Mesh>,
    command_pool: vk::CommandPool,
    frame_sync: Vec<FrameSync>,
    frame: FrameCounter,

    // ─────────────────────────────────────────────────────────────────────────
    // STATE FLAGS
    // ─────────────────────────────────────────────────────────────────────────
    surface_state: SurfaceState,

    wait_stages: [vk::PipelineStageFlags; 1],

    device: Arc<VulkanDevice>,
}

impl Renderer {
    pub fn new(
        device: Arc<VulkanDevice>,
        config: &Config,
        sample: Sample,
        framebuffer_size: (u32, u32),
    ) -> Result<Self> {
        let frames_in_flight = config.max_frames_in_flight();

        // Every handle starts out null so Drop can clean up a half-built renderer
        let mut renderer = Self {
            sample,
            clear_color: config.graphics.clear_color,
            present_mode: config.present_mode(),
            shader_dir: config.shaders.directory.clone(),
            swapchain: None,
            pipeline: vk::Pipeline::null(),
            framebuffers: Vec::new(),
            command_buffers: Vec::new(),
            render_pass: vk::RenderPass::null(),
            render_pass_format: vk::Format::UNDEFINED,
            pipeline_layout: vk::PipelineLayout::null(),
            shaders: None,
            mesh: None,
            command_pool: vk::CommandPool::null(),
            frame_sync: Vec::with_capacity(frames_in_flight),
            frame: FrameCounter::new(frames_in_flight),
            surface_state: SurfaceState::new(framebuffer_size),
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            device,
        };

        renderer.init(frames_in_flight)?;
        Ok(renderer)
    }

    fn init(&mut self, frames_in_flight: usize) -> Result<()> {
        let device = Arc::clone(&self.device);

        self.command_pool = command::create_command_pool(&device)?;
        for _ in 0..frames_in_flight {
            self.frame_sync.push(FrameSync::new(&device.device)?);
        }

        self.shaders = Some(ShaderModules::load(&device, &self.shader_dir, self.sample)?);
        self.pipeline_layout = pipeline::create_pipeline_layout(&device)?;

        if self.sample.uses_buffers() {
            self.mesh = Some(Mesh::upload(&device, self.command_pool, &QUAD_VERTICES, &QUAD_INDICES)?);
        }

        self.create_swapchain()?;

        log::info!("Renderer ready ({:?}, {} frames in flight)", self.sample, frames_in_flight);
        Ok(())
    }

    // =========================================================================
    // SWAPCHAIN LIFECYCLE
    // =========================================================================

    pub fn is_minimized(&self) -> bool {
        self.surface_state.is_minimized()
    }

    /// Record a new framebuffer size from the window
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_state.resize(width, height);
    }

    fn create_swapchain(&mut self) -> Result<()> {
        if self.is_minimized() {
            return Ok(());
        }

        let (width, height) = self.surface_state.size;
        let swapchain = Swapchain::new(Arc::clone(&self.device), width, height, self.present_mode)?;

        if swapchain.format != self.render_pass_format {
            unsafe { self.device.device.destroy_render_pass(self.render_pass, None) };
            self.render_pass = vk::RenderPass::null();
            self.render_pass = pipeline::create_render_pass(&self.device, swapchain.format)?;
            self.render_pass_format = swapchain.format;
        }

        self.swapchain = Some(swapchain);
        self.create_swapchain_resources()
    }

    /// Pipeline, framebuffers and pre-recorded command buffers for the
    /// current swapchain
    fn create_swapchain_resources(&mut self) -> Result<()> {
        let swapchain = self.swapchain.as_ref().context("Swapchain not initialized")?;
        let shaders = self.shaders.as_ref().context("Shaders not loaded")?;
        let (bindings, attributes) = self.sample.vertex_input();

        self.pipeline = pipeline::create_graphics_pipeline(
            &self.device,
            &PipelineDesc {
                render_pass: self.render_pass,
                layout: self.pipeline_layout,
                extent: swapchain.extent,
                vert_shader: shaders.vert,
                frag_shader: shaders.frag,
                vertex_bindings: &bindings,
                vertex_attributes: &attributes,
            },
        )?;

        self.framebuffers = pipeline::create_framebuffers(
            &self.device,
            &swapchain.image_views,
            self.render_pass,
            swapchain.extent,
        )?;

        self.command_buffers = command::allocate_primary(
            &self.device.device,
            self.command_pool,
            self.framebuffers.len() as u32,
        )?;

        self.record_command_buffers()?;

        log::info!("Created {} pre-recorded command buffers", self.command_buffers.len());
        Ok(())
    }

    fn destroy_swapchain_resources(&mut self) {
        let device = &self.device.device;

        pipeline::destroy_framebuffers(device, &self.framebuffers);
        self.framebuffers.clear();

        unsafe {
            if !self.command_buffers.is_empty() {
                device.free_command_buffers(self.command_pool, &self.command_buffers);
            }
            device.destroy_pipeline(self.pipeline, None);
        }
        self.command_buffers.clear();
        self.pipeline = vk::Pipeline::null();
    }

    /// Rebuild everything that depends on the surface size
    fn recreate_swapchain(&mut self) -> Result<()> {
        if self.is_minimized() {
            log::debug!("Window minimized, postponing swapchain recreation");
            return Ok(());
        }

        self.device.wait_idle()?;

        self.destroy_swapchain_resources();
        // The surface can only have one swapchain at a time
        self.swapchain = None;

        self.create_swapchain()
    }

    /// Swap in freshly compiled shaders; on failure the old ones stay active
    pub fn reload_shaders(&mut self, changed: &[PathBuf]) -> Result<()> {
        log::info!("Shader change detected: {:?}", changed);

        self.device.wait_idle()?;

        let shaders = match ShaderModules::load(&self.device, &self.shader_dir, self.sample) {
            Ok(shaders) => shaders,
            Err(e) => {
                log::error!("Shader reload failed, keeping previous shaders: {:#}", e);
                return Ok(());
            }
        };

        let swap = swap_or_keep(
            self,
            |renderer| &mut renderer.shaders,
            shaders,
            Self::rebuild_swapchain_resources,
        )?;

        if let Some(retired) = swap.retired {
            retired.destroy(&self.device.device);
        }
        match swap.error {
            Some(e) => log::error!("Shader reload failed, keeping previous shaders: {:#}", e),
            None => log::info!("Shaders reloaded"),
        }
        Ok(())
    }

    /// Rebuild pipeline, framebuffers and command buffers from the current shaders
    fn rebuild_swapchain_resources(&mut self) -> Result<()> {
        self.destroy_swapchain_resources();
        if self.swapchain.is_some() {
            self.create_swapchain_resources()?;
        }
        Ok(())
    }

    // =========================================================================
    // COMMAND RECORDING
    // =========================================================================

    fn record_command_buffers(&self) -> Result<()> {
        let device = &self.device.device;
        let swapchain = self.swapchain.as_ref().context("Swapchain not initialized")?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];

        for (&cmd, &framebuffer) in self.command_buffers.iter().zip(&self.framebuffers) {
            // Resubmitted every time its image comes around
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: swapchain.extent,
                })
                .clear_values(&clear_values);

            unsafe {
                device.begin_command_buffer(cmd, &begin_info)?;
                device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);

                match self.sample.draw_call() {
                    DrawCall::Vertices { count } => {
                        device.cmd_draw(cmd, count, 1, 0, 0);
                    }
                    DrawCall::Indexed { count } => {
                        let mesh = self.mesh.as_ref().context("Mesh not uploaded")?;
                        mesh.bind(device, cmd);
                        device.cmd_draw_indexed(cmd, count, 1, 0, 0, 0);
                    }
                }

                device.cmd_end_render_pass(cmd);
                device.end_command_buffer(cmd)?;
            }
        }

        Ok(())
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Render a single frame. Returns `false` when nothing was presented.
    ///
    /// FRAME TIMELINE:
    /// wait_fence -> acquire_image -> reset_fence -> submit -> present -> next_frame
    pub fn draw_frame(&mut self) -> Result<bool> {
        if self.is_minimized() {
            return Ok(false);
        }
        if self.swapchain.is_none() {
            self.recreate_swapchain()?;
        }

        let device = Arc::clone(&self.device);
        let sync = &self.frame_sync[self.frame.current()];
        let swapchain = self.swapchain.as_ref().context("Swapchain not initialized")?;

        // Wait until the GPU is done with the frame that last used this slot
        unsafe {
            device.device.wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)?;
        }

        let Some((image_index, _suboptimal)) =
            swapchain.acquire_next_image(u64::MAX, sync.image_available)?
        else {
            self.recreate_swapchain()?;
            return Ok(false);
        };

        // Only reset once work is guaranteed to be submitted, or the next wait deadlocks
        unsafe {
            device.device.reset_fences(&[sync.in_flight_fence])?;
        }

        let wait_semaphores = [sync.image_available];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [self.command_buffers[image_index as usize]];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device.device.queue_submit(
                device.graphics_queue,
                &[submit_info.build()],
                sync.in_flight_fence,
            )
            .context("Failed to submit draw command buffer")?;
        }

        let stale = swapchain.present(device.present_queue, image_index, &signal_semaphores)?;

        if self.surface_state.take_recreate(stale) {
            self.recreate_swapchain()?;
        }

        self.frame.advance();
        Ok(true)
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up renderer resources...");

        let _ = self.device.wait_idle();

        self.destroy_swapchain_resources();

        let device = Arc::clone(&self.device);
        let device = &device.device;
        unsafe {
            if let Some(mesh) = self.mesh.take() {
                mesh.destroy(device);
            }
            device.destroy_render_pass(self.render_pass, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            if let Some(shaders) = self.shaders.take() {
                shaders.destroy(device);
            }
        }

        self.swapchain = None;

        unsafe {
            // Also frees any command buffers still allocated from it
            device.destroy_command_pool(self.command_pool, None);

            for sync in &self.frame_sync {
                sync.destroy(device);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_framebuffer_is_minimized() {
        assert!(SurfaceState::new((0, 600)).is_minimized());
        assert!(SurfaceState::new((800, 0)).is_minimized());
        assert!(!SurfaceState::new((800, 600)).is_minimized());
    }

    #[test]
    fn resize_forces_one_recreation() {
        let mut state = SurfaceState::new((800, 600));
        assert!(!state.take_recreate(false));

        state.resize(1024, 768);
        assert_eq!(state.size, (1024, 768));
        assert!(state.take_recreate(false));
        assert!(!state.take_recreate(false));
    }

    #[derive(Default)]
    struct Slot {
        value: Option<&'static str>,
        active: Vec<&'static str>,
    }

    fn activate(slot: &mut Slot) -> Result<()> {
        match slot.value {
            Some("broken") => anyhow::bail!("pipeline rejected"),
            Some(value) => {
                slot.active.push(value);
                Ok(())
            }
            None => Ok(()),
        }
    }

    #[test]
    fn accepted_candidate_retires_previous() {
        let mut slot = Slot {
            value: Some("old"),
            ..Default::default()
        };
        let swap = swap_or_keep(&mut slot, |s| &mut s.value, "new", activate).unwrap();

        assert_eq!(swap.retired, Some("old"));
        assert!(swap.error.is_none());
        assert_eq!(slot.value, Some("new"));
        assert_eq!(slot.active, vec!["new"]);
    }

    #[test]
    fn rejected_candidate_restores_previous() {
        let mut slot = Slot {
            value: Some("old"),
            ..Default::default()
        };
        let swap = swap_or_keep(&mut slot, |s| &mut s.value, "broken", activate).unwrap();

        assert_eq!(swap.retired, Some("broken"));
        assert!(swap.error.is_some());
        assert_eq!(slot.value, Some("old"));
        assert_eq!(slot.active, vec!["old"]);
    }

    #[test]
    fn failed_rollback_is_an_error() {
        let mut slot = Slot {
            value: Some("broken"),
            ..Default::default()
        };
        assert!(swap_or_keep(&mut slot, |s| &mut s.value, "broken", activate).is_err());
    }

    #[test]
    fn stale_present_recreates_without_resize() {
        let mut state = SurfaceState::new((800, 600));
        assert!(state.take_recreate(true));
        assert!(!state.resized);
    }
}
