// =============================================================================
// APPLICATION - window, event handling, and the renderer's lifetime
// =============================================================================
//
// FRAME FLOW:
// 1. winit delivers window events (resize, close, keys)
// 2. about_to_wait requests a redraw
// 3. RedrawRequested: apply shader changes, then draw_frame()

use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

use crate::backend::surface::centered_position;
use crate::backend::VulkanDevice;
use crate::config::Config;
use crate::geometry::Sample;
use crate::hot_reload::ShaderWatcher;
use crate::renderer::Renderer;

/// Run a sample until its window is closed
pub fn run(sample: Sample, config: Config) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(sample, config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// IMPORTANT: Field order matters for Drop! The renderer (and with it the
/// surface) must be gone before the window it presents to.
pub struct App {
    renderer: Option<Renderer>,
    shader_watcher: Option<ShaderWatcher>,
    window: Option<Arc<Window>>,

    sample: Sample,
    config: Config,
    /// First fatal error; ends the event loop and is returned from `run`
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(sample: Sample, config: Config) -> Self {
        Self {
            renderer: None,
            shader_watcher: None,
            window: None,
            sample,
            config,
            error: None,
        }
    }

    fn title(&self) -> &str {
        self.config.window.title.as_deref().unwrap_or(self.sample.title())
    }

    fn window_attributes(&self, event_loop: &ActiveEventLoop) -> WindowAttributes {
        let size = (self.config.window.width, self.config.window.height);

        let mut attributes = WindowAttributes::default()
            .with_title(self.title())
            .with_inner_size(PhysicalSize::new(size.0, size.1))
            .with_resizable(self.config.window.resizable);

        if let Some(monitor) = event_loop.primary_monitor() {
            let origin = monitor.position();
            let monitor_size = monitor.size();
            let (x, y) = centered_position(
                (origin.x, origin.y),
                (monitor_size.width, monitor_size.height),
                size,
            );
            attributes = attributes.with_position(PhysicalPosition::new(x, y));
        }

        attributes
    }

    /// Create device, renderer and (optionally) the shader watcher
    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        log::info!("Initializing Vulkan...");

        let display = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let window_handle = window
            .window_handle()
            .context("Failed to get window handle")?
            .as_raw();

        let device = VulkanDevice::new(
            self.title(),
            self.config.validation_enabled(),
            display,
            window_handle,
        )?;

        let size = window.inner_size();
        self.renderer = Some(Renderer::new(
            device,
            &self.config,
            self.sample,
            (size.width, size.height),
        )?);

        if self.config.shaders.hot_reload {
            match ShaderWatcher::new(&self.config.shaders.directory) {
                Ok(watcher) => self.shader_watcher = Some(watcher),
                Err(e) => log::warn!("Shader hot reload disabled: {:#}", e),
            }
        }

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        if let Some(watcher) = &self.shader_watcher {
            let changed = watcher.take_changes();
            if !changed.is_empty() {
                renderer.reload_shaders(&changed)?;
            }
        }

        renderer.draw_frame()?;
        Ok(())
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(self.window_attributes(event_loop)) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::anyhow!("Failed to create window: {e}"));
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            self.fail(event_loop, e.context("Failed to initialize Vulkan"));
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e.context("Render error"));
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Keep rendering continuously
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    /// Tear down GPU resources while the window still exists
    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shader_watcher = None;
        self.renderer = None;
        self.window = None;
        log::info!("Cleanup complete");
    }
}
