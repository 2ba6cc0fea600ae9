// Presentation surface - the link between a native window and Vulkan
//
// Matches on the raw window/display handles and calls the platform's
// VK_KHR_*_surface extension.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

/// Instance extensions needed to present to windows on this display
pub fn required_instance_extensions(display: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let platform = match display {
        RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
        RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
        RawDisplayHandle::Xcb(_) => khr::XcbSurface::name(),
        RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
        other => anyhow::bail!("Unsupported display handle: {:?}", other),
    };

    Ok(vec![khr::Surface::name(), platform])
}

/// Create a `VkSurfaceKHR` for the given window
///
/// # Safety
/// The handles must stay valid for the whole lifetime of the surface, and
/// `instance` must have been created with [`required_instance_extensions`].
pub unsafe fn create_surface(
    entry: &Entry,
    instance: &ash::Instance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> Result<vk::SurfaceKHR> {
    let surface = match (display, window) {
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance = handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
            let hwnd = handle.hwnd.get() as *const std::ffi::c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            khr::Win32Surface::new(entry, instance).create_win32_surface(&create_info, None)?
        }
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
            let dpy = display.display.context("Xlib display handle is null")?;
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy.as_ptr().cast())
                .window(handle.window);
            khr::XlibSurface::new(entry, instance).create_xlib_surface(&create_info, None)?
        }
        (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(handle)) => {
            let connection = display.connection.context("XCB connection handle is null")?;
            let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                .connection(connection.as_ptr().cast())
                .window(handle.window.get());
            khr::XcbSurface::new(entry, instance).create_xcb_surface(&create_info, None)?
        }
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr().cast())
                .surface(handle.surface.as_ptr().cast());
            khr::WaylandSurface::new(entry, instance).create_wayland_surface(&create_info, None)?
        }
        (display, window) => anyhow::bail!(
            "Unsupported window handle type: {:?} / {:?}",
            display,
            window
        ),
    };

    Ok(surface)
}

/// Position that centers a window of `window` size on a monitor
pub fn centered_position(
    monitor_origin: (i32, i32),
    monitor_size: (u32, u32),
    window_size: (u32, u32),
) -> (i32, i32) {
    let x = (monitor_size.0 as i32 - window_size.0 as i32) / 2;
    let y = (monitor_size.1 as i32 - window_size.1 as i32) / 2;
    (monitor_origin.0 + x, monitor_origin.1 + y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, WebDisplayHandle, XlibDisplayHandle};
    use std::ptr::NonNull;

    #[test]
    fn xlib_needs_surface_and_xlib_extensions() {
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let extensions = required_instance_extensions(display).unwrap();
        assert_eq!(extensions, vec![khr::Surface::name(), khr::XlibSurface::name()]);
    }

    #[test]
    fn wayland_needs_wayland_extension() {
        let mut dummy = 0u8;
        let ptr = NonNull::from(&mut dummy).cast();
        let display = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(ptr));
        let extensions = required_instance_extensions(display).unwrap();
        assert!(extensions.contains(&khr::WaylandSurface::name()));
    }

    #[test]
    fn web_display_is_rejected() {
        let display = RawDisplayHandle::Web(WebDisplayHandle::new());
        assert!(required_instance_extensions(display).is_err());
    }

    #[test]
    fn window_is_centered_on_the_monitor() {
        assert_eq!(centered_position((0, 0), (1920, 1080), (800, 600)), (560, 240));
        // second monitor to the right
        assert_eq!(centered_position((1920, 0), (1920, 1080), (800, 600)), (2480, 240));
    }

    #[test]
    fn oversized_window_is_pushed_up_and_left() {
        assert_eq!(centered_position((0, 0), (640, 480), (800, 600)), (-80, -60));
    }
}
