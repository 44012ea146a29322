// SPDX-License-Identifier: CEPL-1.0
//! Instance Builder.
use std::ffi::{c_char, CStr, CString};

use ash::{ext::debug_utils, vk, Entry};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, info};
use vkhost_render::{DriverCode, InitErrorKind};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn to_raw(self) -> u32 {
        vk::make_api_version(0, self.major, self.minor, self.patch)
    }
}

/// Application metadata handed to the driver.
#[derive(Clone, Debug)]
pub struct AppInfo {
    pub name: String,
    pub version: Version,
    pub engine_name: String,
    pub engine_version: Version,
    pub api_version: Version,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "Hello Triangle".to_owned(),
            version: Version::new(1, 0, 0),
            engine_name: "No Engine".to_owned(),
            engine_version: Version::new(1, 0, 0),
            api_version: Version::new(1, 0, 0),
        }
    }
}

/// Layers to enable on the instance.
pub fn required_layers(validation: bool) -> Vec<&'static CStr> {
    if validation {
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    }
}

/// Window-system extensions plus debug utils when validating. Device-level
/// extensions never belong here.
pub fn required_extensions(window: &[&'static CStr], validation: bool) -> Vec<&'static CStr> {
    let mut exts: Vec<&'static CStr> = Vec::with_capacity(window.len() + 1);
    for &name in window {
        if !exts.contains(&name) {
            exts.push(name);
        }
    }
    if validation && !exts.contains(&debug_utils::NAME) {
        exts.push(debug_utils::NAME);
    }
    exts
}

/// Extensions the window system needs for a surface on `display`.
pub(crate) fn window_extensions(
    display: RawDisplayHandle,
) -> Result<Vec<&'static CStr>, InitErrorKind> {
    let names = ash_window::enumerate_required_extensions(display).map_err(|e| {
        InitErrorKind::QueryFailed {
            call: "enumerate_required_extensions",
            driver_code: DriverCode(e.as_raw()),
        }
    })?;
    // SAFETY: ash-window hands out pointers into static extension-name tables.
    Ok(names
        .iter()
        .map(|&p| -> &'static CStr { unsafe { CStr::from_ptr(p) } })
        .collect())
}

/// True when every layer in `wanted` appears in `available`.
pub fn layers_present(available: &[vk::LayerProperties], wanted: &[&CStr]) -> bool {
    wanted.iter().all(|&want| {
        // SAFETY: layer names are NUL-terminated within their fixed array.
        available
            .iter()
            .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == want)
    })
}

/// Fails with `ValidationLayersMissing` unless every required layer is
/// advertised by the loader.
pub(crate) unsafe fn check_layer_support(
    entry: &Entry,
    layers: &[&CStr],
) -> Result<(), InitErrorKind> {
    let available = unsafe { entry.enumerate_instance_layer_properties() }.map_err(|e| {
        InitErrorKind::QueryFailed {
            call: "enumerate_instance_layer_properties",
            driver_code: DriverCode(e.as_raw()),
        }
    })?;
    if layers_present(&available, layers) {
        Ok(())
    } else {
        Err(InitErrorKind::ValidationLayersMissing)
    }
}

fn c_string(s: &str) -> Result<CString, InitErrorKind> {
    CString::new(s).map_err(|_| InitErrorKind::InvalidAppInfo(s.to_owned()))
}

pub(crate) unsafe fn create_instance(
    entry: &Entry,
    app: &AppInfo,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<ash::Instance, InitErrorKind> {
    let layers = required_layers(validation);
    if validation {
        unsafe { check_layer_support(entry, &layers) }?;
    }

    let extensions = required_extensions(&window_extensions(display)?, validation);
    for ext in &extensions {
        debug!("instance extension {}", ext.to_string_lossy());
    }

    let app_name = c_string(&app.name)?;
    let engine_name = c_string(&app.engine_name)?;
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(app.version.to_raw())
        .engine_name(&engine_name)
        .engine_version(app.engine_version.to_raw())
        .api_version(app.api_version.to_raw());

    let ext_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
    let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    // Chained so that vkCreateInstance/vkDestroyInstance themselves are covered.
    let mut messenger_info = crate::debug::messenger_create_info();
    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&ext_ptrs)
        .enabled_layer_names(&layer_ptrs);
    if validation {
        create_info = create_info.push_next(&mut messenger_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        InitErrorKind::InstanceCreateFailed {
            driver_code: DriverCode(e.as_raw()),
        }
    })?;
    info!(
        "instance up ({} extensions, validation {})",
        extensions.len(),
        if validation { "on" } else { "off" }
    );
    Ok(instance)
}

/// Release action for the instance; must run after every child is gone.
pub(crate) fn destroyer(instance: &ash::Instance) -> impl FnOnce() + 'static {
    let instance = instance.clone();
    // SAFETY: runs last on the release stack, after every object created
    // from this instance has been destroyed.
    move || unsafe { instance.destroy_instance(None) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: &CStr = c"VK_KHR_surface";
    const XLIB: &CStr = c"VK_KHR_xlib_surface";

    #[test]
    fn debug_utils_only_with_validation() {
        let on = required_extensions(&[SURFACE, XLIB], true);
        assert_eq!(on, [SURFACE, XLIB, debug_utils::NAME]);

        let off = required_extensions(&[SURFACE, XLIB], false);
        assert_eq!(off, [SURFACE, XLIB]);
    }

    #[test]
    fn instance_extensions_exclude_device_extensions() {
        let exts = required_extensions(&[SURFACE], true);
        assert!(!exts.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn duplicate_window_extensions_are_merged() {
        let exts = required_extensions(&[SURFACE, SURFACE, debug_utils::NAME], true);
        assert_eq!(exts, [SURFACE, debug_utils::NAME]);
    }

    #[test]
    fn validation_layer_follows_flag() {
        assert_eq!(required_layers(true), [VALIDATION_LAYER]);
        assert!(required_layers(false).is_empty());
    }

    #[test]
    fn default_app_info_targets_vulkan_1_0() {
        let app = AppInfo::default();
        assert_eq!(app.api_version.to_raw(), vk::API_VERSION_1_0);
        assert_eq!(app.version.to_raw(), vk::make_api_version(0, 1, 0, 0));
    }

    fn layer(name: &CStr) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (dst, &src) in props.layer_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn validation_layer_found_among_advertised() {
        let available = [layer(c"VK_LAYER_MESA_overlay"), layer(VALIDATION_LAYER)];
        assert!(layers_present(&available, &required_layers(true)));
    }

    #[test]
    fn missing_validation_layer_is_detected() {
        let available = [layer(c"VK_LAYER_MESA_overlay")];
        assert!(!layers_present(&available, &required_layers(true)));
        assert!(!layers_present(&[], &[VALIDATION_LAYER]));
    }

    #[test]
    fn no_layers_wanted_always_passes() {
        assert!(layers_present(&[], &required_layers(false)));
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert_eq!(
            c_string("bad\0name"),
            Err(InitErrorKind::InvalidAppInfo("bad\0name".to_owned()))
        );
    }
}
