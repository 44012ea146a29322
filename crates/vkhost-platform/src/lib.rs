// SPDX-License-Identifier: CEPL-1.0
//! Window Host: one fixed-size, non-resizable winit window driven by
//! non-blocking event pumping.
//!
//! winit never creates a rendering context of its own, so the window is
//! ready for a client-managed graphics API as soon as it exists.
pub use winit;

use std::time::Duration;

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tracing::{debug, info};
use vkhost_render::{InitError, InitErrorKind, InitStage, PresentTarget, RenderSize};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

/// Pumps allowed for the platform to deliver `resumed` while opening.
const OPEN_PUMP_ATTEMPTS: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

impl WindowSpec {
    fn attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_resizable(false)
    }
}

struct HostState {
    pending: Option<WindowAttributes>,
    window: Option<Window>,
    close_requested: bool,
    create_error: Option<String>,
}

impl ApplicationHandler for HostState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.pending.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => {
                let size = window.inner_size();
                info!("window up ({}x{} px)", size.width, size.height);
                self.window = Some(window);
            }
            Err(e) => {
                self.create_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(Window::id) != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Destroyed => self.close_requested = true,
            _ => {}
        }
    }
}

pub struct WindowHost {
    // Field order is drop order: the window goes before the toolkit.
    state: HostState,
    event_loop: EventLoop<()>,
}

impl WindowHost {
    pub fn open(spec: &WindowSpec) -> Result<Self, InitError> {
        let fail = |msg: String| InitErrorKind::WindowInitFailed(msg).at(InitStage::Window);

        let event_loop = EventLoop::new().map_err(|e| fail(e.to_string()))?;
        let mut host = Self {
            state: HostState {
                pending: Some(spec.attributes()),
                window: None,
                close_requested: false,
                create_error: None,
            },
            event_loop,
        };

        for _ in 0..OPEN_PUMP_ATTEMPTS {
            let status = host
                .event_loop
                .pump_app_events(Some(Duration::ZERO), &mut host.state);
            if host.state.window.is_some() || host.state.create_error.is_some() {
                break;
            }
            if let PumpStatus::Exit(code) = status {
                return Err(fail(format!("event loop exited ({code}) before resuming")));
            }
        }

        if let Some(msg) = host.state.create_error.take() {
            return Err(fail(msg));
        }
        if host.state.window.is_none() {
            return Err(fail("platform never resumed the event loop".to_owned()));
        }
        Ok(host)
    }

    /// Services pending OS events without blocking.
    pub fn pump_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            debug!(code, "event loop exited");
            self.state.close_requested = true;
        }
    }

    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    pub fn framebuffer_size(&self) -> RenderSize {
        self.state
            .window
            .as_ref()
            .map(|w| {
                let size = w.inner_size();
                RenderSize::new(size.width, size.height)
            })
            .unwrap_or(RenderSize::new(0, 0))
    }

    fn window(&self) -> Result<&Window, HandleError> {
        self.state.window.as_ref().ok_or(HandleError::Unavailable)
    }
}

impl Drop for WindowHost {
    fn drop(&mut self) {
        if self.state.window.take().is_some() {
            debug!("window destroyed");
        }
    }
}

impl HasWindowHandle for WindowHost {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window()?.window_handle()
    }
}

impl HasDisplayHandle for WindowHost {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window()?.display_handle()
    }
}

impl PresentTarget for WindowHost {
    fn framebuffer_size(&self) -> RenderSize {
        WindowHost::framebuffer_size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_is_fixed_800_by_600() {
        let spec = WindowSpec::default();
        assert_eq!(spec.title, "Vulkan");
        assert_eq!((spec.width, spec.height), (800, 600));
    }
}
