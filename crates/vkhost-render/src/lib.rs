// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic pieces shared by the window host and the Vulkan bring-up:
//! pixel sizes, the presentation-target seam, the init error taxonomy and the
//! lifecycle that owns release actions.
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

pub mod error;
pub mod lifecycle;

pub use error::{DriverCode, InitError, InitErrorKind, InitStage};
pub use lifecycle::{Lifecycle, LifecycleState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A platform window the graphics API can present into.
///
/// `framebuffer_size` reports physical pixels, which may differ from the
/// logical size the window was opened with on high-DPI displays.
pub trait PresentTarget: HasWindowHandle + HasDisplayHandle {
    fn framebuffer_size(&self) -> RenderSize;
}
