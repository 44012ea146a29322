// SPDX-License-Identifier: CEPL-1.0
//! Debug Messenger: forwards validation output to stderr.
use std::ffi::{c_void, CStr};

use ash::{ext::debug_utils, vk};
use tracing::info;
use vkhost_render::{DriverCode, InitErrorKind};

use crate::extensions::Extensions;

unsafe extern "system" fn forward_to_stderr(
    _severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the driver passes either null or a valid callback record whose
    // message, when set, is NUL-terminated.
    if let Some(data) = unsafe { data.as_ref() } {
        if !data.p_message.is_null() {
            let msg = unsafe { CStr::from_ptr(data.p_message) };
            eprintln!("validation layer: {}", msg.to_string_lossy());
        }
    }
    vk::FALSE
}

/// Shared by the standalone messenger and the record chained onto instance
/// creation.
pub(crate) fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(forward_to_stderr))
}

pub struct DebugMessenger {
    loader: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub(crate) unsafe fn create(extensions: &Extensions) -> Result<Self, InitErrorKind> {
        let loader = extensions.debug_utils()?.clone();
        let handle = unsafe { loader.create_debug_utils_messenger(&messenger_create_info(), None) }
            .map_err(|e| InitErrorKind::DebugMessengerFailed {
                driver_code: DriverCode(e.as_raw()),
            })?;
        info!("debug messenger up");
        Ok(Self { loader, handle })
    }

    pub fn handle(&self) -> vk::DebugUtilsMessengerEXT {
        self.handle
    }

    pub(crate) fn destroyer(&self) -> impl FnOnce() + 'static {
        let loader = self.loader.clone();
        let handle = self.handle;
        // SAFETY: popped before the instance's own release action.
        move || unsafe { loader.destroy_debug_utils_messenger(handle, None) }
    }
}
