// =============================================================================
// VULKAN SAMPLES - hello triangle and vertex/index buffers
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (winit event loop, window)                                 │
// │    └── Renderer (pipeline, framebuffers, command buffers)       │
// │          └── Swapchain + VulkanDevice (instance, surface, GPU)  │
// │                └── Synchronization (fences, semaphores)         │
// └─────────────────────────────────────────────────────────────────┘
//
// Each binary picks a `Sample` and hands it to `run`.

pub mod app;
pub mod backend;
pub mod config;
pub mod geometry;
pub mod hot_reload;
pub mod mesh;
pub mod renderer;

use anyhow::Result;
use std::fs::File;

pub use config::Config;
pub use geometry::Sample;

/// Load configuration, set up logging and run `sample` until its window closes
pub fn run(sample: Sample) -> Result<()> {
    let config = Config::load();

    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    log::info!("Starting {:?} sample", sample);
    log::info!(
        "Window: {}x{}, present mode: {}",
        config.window.width,
        config.window.height,
        config.graphics.present_mode
    );

    app::run(sample, config)
}

/// `RUST_LOG` wins over the configured level; optionally log to a file
fn init_logging(config: &Config) -> Result<(), log::SetLoggerError> {
    use env_logger::{Builder, Target};

    let mut builder = Builder::new();
    builder.filter_level(config.log_level());
    builder.parse_default_env();

    if config.debug.log_to_file {
        match File::create(&config.debug.log_file) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!(
                "Failed to open log file {}: {}, logging to stderr",
                config.debug.log_file.display(),
                e
            ),
        }
    }

    builder.try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_logger_init_is_reported() {
        let config = Config::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
