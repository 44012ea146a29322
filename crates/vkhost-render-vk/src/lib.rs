// SPDX-License-Identifier: CEPL-1.0
//! Vulkan bring-up over ash: instance, debug messenger, surface, adapter,
//! logical device and swap chain, in that order.
//!
//! Every owning handle is registered with a [`Lifecycle`] as it is acquired,
//! so teardown (normal or after a failed stage) runs in reverse order.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod debug;
pub mod device;
pub mod extensions;
pub mod instance;
pub mod surface;
pub mod swapchain;

use ash::{vk, Entry};
use raw_window_handle::HandleError;
use tracing::{debug, info};
use vkhost_render::{
    DriverCode, InitError, InitErrorKind, InitStage, Lifecycle, LifecycleState, PresentTarget,
};

pub use debug::DebugMessenger;
pub use device::{Adapter, LogicalDevice, QueueFamilies, QueueFamilyIndices, DEVICE_EXTENSIONS};
pub use extensions::Extensions;
pub use instance::{AppInfo, Version, VALIDATION_LAYER};
pub use surface::Surface;
pub use swapchain::{PresentPreference, SharingPlan, Swapchain, SwapchainConfig, SwapchainSupport};

/// Validation is compiled in for debug builds only.
pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);

#[derive(Clone, Debug)]
pub struct HostSettings {
    pub app: AppInfo,
    pub present: PresentPreference,
    pub validation: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            app: AppInfo::default(),
            present: PresentPreference::default(),
            validation: VALIDATION_ENABLED,
        }
    }
}

/// A window-bound Vulkan device with a presentable swap chain.
pub struct VkHost {
    lifecycle: Lifecycle,
    _entry: Entry,
    instance: ash::Instance,
    _extensions: Extensions,
    messenger: Option<DebugMessenger>,
    surface: Surface,
    adapter: Adapter,
    device: LogicalDevice,
    swapchain: Swapchain,
}

fn handle_error(e: HandleError) -> InitErrorKind {
    InitErrorKind::WindowInitFailed(e.to_string())
}

impl VkHost {
    /// Brings Vulkan up against `target`. The window must outlive the host.
    pub fn new(target: &dyn PresentTarget, settings: &HostSettings) -> Result<Self, InitError> {
        let mut lifecycle = Lifecycle::new();
        // Owned and released by the caller, after this host is gone.
        lifecycle.note_acquired(InitStage::Window);

        let display = lifecycle.step(InitStage::Instance, || {
            target
                .display_handle()
                .map(|h| h.as_raw())
                .map_err(handle_error)
        })?;

        let entry = Entry::linked();
        let instance = lifecycle.acquire(
            InitStage::Instance,
            || unsafe {
                instance::create_instance(&entry, &settings.app, display, settings.validation)
            },
            instance::destroyer,
        )?;
        let extensions = Extensions::resolve(&entry, &instance);

        let messenger = if settings.validation {
            Some(lifecycle.acquire(
                InitStage::DebugMessenger,
                || unsafe { DebugMessenger::create(&extensions) },
                DebugMessenger::destroyer,
            )?)
        } else {
            None
        };

        let window = lifecycle.step(InitStage::Surface, || {
            target
                .window_handle()
                .map(|h| h.as_raw())
                .map_err(handle_error)
        })?;
        let surface = lifecycle.acquire(
            InitStage::Surface,
            || unsafe { Surface::create(&entry, &instance, &extensions, display, window) },
            Surface::destroyer,
        )?;

        let adapter = lifecycle.step(InitStage::PhysicalDevice, || unsafe {
            device::select_adapter(&instance, &surface)
        })?;

        let device = lifecycle.acquire(
            InitStage::Device,
            || unsafe { LogicalDevice::create(&instance, &adapter) },
            LogicalDevice::destroyer,
        )?;

        let config = lifecycle.step(InitStage::SwapChain, || {
            let support = unsafe { SwapchainSupport::query(&surface, adapter.handle) }.map_err(
                |e| InitErrorKind::QueryFailed {
                    call: "query_swapchain_support",
                    driver_code: DriverCode(e.as_raw()),
                },
            )?;
            SwapchainConfig::negotiate(&support, &adapter.families, settings.present, || {
                target.framebuffer_size()
            })
            .ok_or(InitErrorKind::SwapChainCreateFailed {
                driver_code: DriverCode(vk::Result::ERROR_FORMAT_NOT_SUPPORTED.as_raw()),
            })
        })?;
        let mut swapchain = lifecycle.acquire(
            InitStage::SwapChain,
            || unsafe { Swapchain::create(&instance, device.raw(), &surface, config) },
            Swapchain::destroyer,
        )?;
        lifecycle.step(InitStage::SwapChain, || unsafe { swapchain.load_images() })?;

        info!("vulkan ready on `{}`", adapter.name);
        Ok(Self {
            lifecycle,
            _entry: entry,
            instance,
            _extensions: extensions,
            messenger,
            surface,
            adapter,
            device,
            swapchain,
        })
    }

    /// Marks the transition into the main loop.
    pub fn enter_main_loop(&mut self) {
        self.lifecycle.enter_running();
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Parent of every other handle here.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Whether validation output is being forwarded.
    pub fn has_debug_messenger(&self) -> bool {
        self.messenger.is_some()
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.handle()
    }

    /// The selected GPU and its resolved queue families.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Logical device and its graphics/present queues.
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }
}

impl Drop for VkHost {
    fn drop(&mut self) {
        debug!("tearing down vulkan");
        self.lifecycle.teardown();
    }
}
