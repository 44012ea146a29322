// SPDX-License-Identifier: CEPL-1.0
//! Instance-level extension entrypoints, resolved by name once the instance
//! exists. Missing tables surface as `ExtensionNotPresent` when first used.
use std::ffi::CStr;

use ash::{ext::debug_utils, khr::surface, Entry, Instance};
use tracing::debug;
use vkhost_render::InitErrorKind;

const SURFACE_FNS: &[&CStr] = &[
    c"vkDestroySurfaceKHR",
    c"vkGetPhysicalDeviceSurfaceSupportKHR",
    c"vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
    c"vkGetPhysicalDeviceSurfaceFormatsKHR",
    c"vkGetPhysicalDeviceSurfacePresentModesKHR",
];

const DEBUG_UTILS_FNS: &[&CStr] = &[
    c"vkCreateDebugUtilsMessengerEXT",
    c"vkDestroyDebugUtilsMessengerEXT",
];

pub struct Extensions {
    surface: Option<surface::Instance>,
    debug_utils: Option<debug_utils::Instance>,
}

impl Extensions {
    pub(crate) fn resolve(entry: &Entry, instance: &Instance) -> Self {
        let present = |names: &[&CStr]| {
            names.iter().all(|name| {
                // SAFETY: `instance` is a live handle created from `entry`.
                let pfn = unsafe { entry.get_instance_proc_addr(instance.handle(), name.as_ptr()) };
                if pfn.is_none() {
                    debug!("entrypoint {} unresolved", name.to_string_lossy());
                }
                pfn.is_some()
            })
        };

        Self {
            surface: present(SURFACE_FNS).then(|| surface::Instance::new(entry, instance)),
            debug_utils: present(DEBUG_UTILS_FNS)
                .then(|| debug_utils::Instance::new(entry, instance)),
        }
    }

    pub fn surface(&self) -> Result<&surface::Instance, InitErrorKind> {
        self.surface
            .as_ref()
            .ok_or_else(|| missing(surface::NAME))
    }

    pub fn debug_utils(&self) -> Result<&debug_utils::Instance, InitErrorKind> {
        self.debug_utils
            .as_ref()
            .ok_or_else(|| missing(debug_utils::NAME))
    }
}

fn missing(name: &CStr) -> InitErrorKind {
    InitErrorKind::ExtensionNotPresent(name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_tables_report_extension_not_present() {
        let table = Extensions {
            surface: None,
            debug_utils: None,
        };
        assert_eq!(
            table.debug_utils().err(),
            Some(InitErrorKind::ExtensionNotPresent("VK_EXT_debug_utils".to_owned()))
        );
        assert_eq!(
            table.surface().err(),
            Some(InitErrorKind::ExtensionNotPresent("VK_KHR_surface".to_owned()))
        );
    }
}
