// SPDX-License-Identifier: CEPL-1.0
use ash::{khr::surface, vk, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::info;
use vkhost_render::{DriverCode, InitErrorKind};

use crate::extensions::Extensions;

/// Presentation surface bound to one (instance, window) pair.
pub struct Surface {
    loader: surface::Instance,
    handle: vk::SurfaceKHR,
}

impl Surface {
    pub(crate) unsafe fn create(
        entry: &Entry,
        instance: &Instance,
        extensions: &Extensions,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Self, InitErrorKind> {
        let loader = extensions.surface()?.clone();
        let handle = unsafe { ash_window::create_surface(entry, instance, display, window, None) }
            .map_err(|e| InitErrorKind::SurfaceCreateFailed {
                driver_code: DriverCode(e.as_raw()),
            })?;
        info!("surface up");
        Ok(Self { loader, handle })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn loader(&self) -> &surface::Instance {
        &self.loader
    }

    pub(crate) fn destroyer(&self) -> impl FnOnce() + 'static {
        let loader = self.loader.clone();
        let handle = self.handle;
        // SAFETY: the logical device and swap chain are released first.
        move || unsafe { loader.destroy_surface(handle, None) }
    }
}
