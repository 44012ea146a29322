// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection, queue family resolution and the logical device.
use std::ffi::{c_char, CStr, CString};

use ash::{khr::swapchain, vk, Instance};
use thiserror::Error;
use tracing::{info, warn};
use vkhost_render::{DriverCode, InitErrorKind};

use crate::{surface::Surface, swapchain::SwapchainSupport};

/// Device extensions every candidate must expose.
pub const DEVICE_EXTENSIONS: &[&CStr] = &[swapchain::NAME];

static QUEUE_PRIORITY: [f32; 1] = [1.0];

/// Queue family roles as discovered; possibly incomplete.
///
/// Indices are only reachable through [`complete`](Self::complete).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    graphics: Option<u32>,
    present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Both roles assigned. The two indices may coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn distinct(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Walks families in reported order, stopping once both roles are filled.
pub fn resolve_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();
    for (i, family) in (0u32..).zip(families) {
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(i);
        }
        if supports_present(i) {
            indices.present = Some(i);
        }
        if indices.is_complete() {
            break;
        }
    }
    indices
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("no queue family set covering graphics and presentation")]
    IncompleteQueueFamilies,
    #[error("missing device extension {0}")]
    MissingExtension(String),
    #[error("surface reports no formats")]
    NoSurfaceFormats,
    #[error("surface reports no present modes")]
    NoPresentModes,
}

/// Everything the selector needs to know about one adapter.
#[derive(Clone, Debug, Default)]
pub struct AdapterReport {
    pub name: String,
    pub families: QueueFamilyIndices,
    pub extensions: Vec<CString>,
    pub surface_formats: usize,
    pub present_modes: usize,
}

impl AdapterReport {
    pub fn verdict(&self, required: &[&CStr]) -> Result<QueueFamilies, Rejection> {
        let families = self
            .families
            .complete()
            .ok_or(Rejection::IncompleteQueueFamilies)?;
        if let Some(missing) = required
            .iter()
            .find(|&&want| !self.extensions.iter().any(|have| have.as_c_str() == want))
        {
            return Err(Rejection::MissingExtension(
                missing.to_string_lossy().into_owned(),
            ));
        }
        if self.surface_formats == 0 {
            return Err(Rejection::NoSurfaceFormats);
        }
        if self.present_modes == 0 {
            return Err(Rejection::NoPresentModes);
        }
        Ok(families)
    }
}

/// First adapter, in enumeration order, that passes every predicate.
pub fn pick_first_suitable<A: Copy>(
    adapters: &[A],
    required: &[&CStr],
    mut probe: impl FnMut(A) -> AdapterReport,
) -> Result<(A, AdapterReport, QueueFamilies), InitErrorKind> {
    if adapters.is_empty() {
        return Err(InitErrorKind::NoVulkanGpu);
    }
    for &adapter in adapters {
        let report = probe(adapter);
        match report.verdict(required) {
            Ok(families) => return Ok((adapter, report, families)),
            Err(why) => warn!(adapter = %report.name, "adapter rejected: {why}"),
        }
    }
    Err(InitErrorKind::NoSuitableGpu)
}

/// The chosen adapter. Borrowed from the instance; never destroyed.
#[derive(Clone, Debug)]
pub struct Adapter {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub families: QueueFamilies,
}

unsafe fn probe(instance: &Instance, surface: &Surface, phys: vk::PhysicalDevice) -> AdapterReport {
    let props = unsafe { instance.get_physical_device_properties(phys) };
    let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    let queue_props = unsafe { instance.get_physical_device_queue_family_properties(phys) };
    let families = resolve_queue_families(&queue_props, |i| {
        unsafe {
            surface
                .loader()
                .get_physical_device_surface_support(phys, i, surface.handle())
        }
        .unwrap_or(false)
    });

    let extensions: Vec<CString> = unsafe { instance.enumerate_device_extension_properties(phys) }
        .unwrap_or_default()
        .iter()
        .map(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) }.to_owned())
        .collect();

    let mut report = AdapterReport {
        name,
        families,
        extensions,
        ..Default::default()
    };
    // Swap-chain support is only meaningful once the extension is known present.
    let has_extensions = DEVICE_EXTENSIONS
        .iter()
        .all(|&want| report.extensions.iter().any(|e| e.as_c_str() == want));
    if has_extensions {
        if let Ok(support) = unsafe { SwapchainSupport::query(surface, phys) } {
            report.surface_formats = support.formats.len();
            report.present_modes = support.present_modes.len();
        }
    }
    report
}

pub(crate) unsafe fn select_adapter(
    instance: &Instance,
    surface: &Surface,
) -> Result<Adapter, InitErrorKind> {
    let adapters = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        InitErrorKind::QueryFailed {
            call: "enumerate_physical_devices",
            driver_code: DriverCode(e.as_raw()),
        }
    })?;
    let (handle, report, families) = pick_first_suitable(&adapters, DEVICE_EXTENSIONS, |phys| {
        unsafe { probe(instance, surface, phys) }
    })?;
    info!(
        "adapter `{}` (graphics family {}, present family {})",
        report.name, families.graphics, families.present
    );
    Ok(Adapter {
        handle,
        name: report.name,
        families,
    })
}

/// One queue per distinct family, priority 1.0.
pub fn queue_create_infos(families: &QueueFamilies) -> Vec<vk::DeviceQueueCreateInfo<'static>> {
    families
        .distinct()
        .into_iter()
        .map(|index| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(index)
                .queue_priorities(&QUEUE_PRIORITY)
        })
        .collect()
}

pub struct LogicalDevice {
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl LogicalDevice {
    pub(crate) unsafe fn create(
        instance: &Instance,
        adapter: &Adapter,
    ) -> Result<Self, InitErrorKind> {
        let queue_infos = queue_create_infos(&adapter.families);
        let ext_ptrs: Vec<*const c_char> = DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&ext_ptrs)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(adapter.handle, &create_info, None) }
            .map_err(|e| InitErrorKind::DeviceCreateFailed {
                driver_code: DriverCode(e.as_raw()),
            })?;
        let graphics_queue = unsafe { device.get_device_queue(adapter.families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(adapter.families.present, 0) };
        info!("logical device up ({} queue families)", queue_infos.len());

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    /// Queue 0 of the graphics family.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue 0 of the present family; same queue as graphics when shared.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub(crate) fn destroyer(&self) -> impl FnOnce() + 'static {
        let device = self.device.clone();
        // SAFETY: the swap chain is released before this runs; queues are
        // never submitted to in this tier, so the device is idle.
        move || unsafe { device.destroy_device(None) }
    }
}
