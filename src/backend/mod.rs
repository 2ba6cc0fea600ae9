// Backend module - thin wrappers around ash
//
// Free functions for one-shot object creation, small RAII types where an
// object has to outlive a single call.

pub mod buffer;
pub mod command;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use swapchain::Swapchain;
