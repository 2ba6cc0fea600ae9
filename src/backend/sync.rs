// Synchronization primitives
//
// Fences pace the CPU against the GPU, semaphores order acquire -> render ->
// present on the GPU. One set per frame in flight.

use ash::vk;
use anyhow::{Context, Result};

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Start signaled so the first wait on each slot returns immediately
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED);

        unsafe {
            let image_available = device.create_semaphore(&semaphore_info, None)
                .context("Failed to create semaphore")?;
            let render_finished = device.create_semaphore(&semaphore_info, None)
                .context("Failed to create semaphore")?;
            let in_flight_fence = device.create_fence(&fence_info, None)
                .context("Failed to create fence")?;

            Ok(Self {
                image_available,
                render_finished,
                in_flight_fence,
            })
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// Round-robin index over the frames in flight
#[derive(Clone, Copy, Debug)]
pub struct FrameCounter {
    current: usize,
    frames_in_flight: usize,
}

impl FrameCounter {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames_in_flight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_buffering_alternates() {
        let mut frames = FrameCounter::new(2);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(frames.current());
            frames.advance();
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn single_frame_stays_on_zero() {
        let mut frames = FrameCounter::new(0);
        frames.advance();
        frames.advance();
        assert_eq!(frames.current(), 0);
    }
}
