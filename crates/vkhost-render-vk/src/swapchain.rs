// SPDX-License-Identifier: CEPL-1.0
//! Swap-chain negotiation and creation.
use ash::{khr::swapchain, vk, Device, Instance};
use tracing::info;
use vkhost_render::{DriverCode, InitErrorKind, RenderSize};

use crate::{device::QueueFamilies, surface::Surface};

/// Which present mode to ask for when the driver offers a choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// MAILBOX when offered, FIFO otherwise.
    #[default]
    Mailbox,
    /// Always FIFO.
    Fifo,
}

#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub(crate) unsafe fn query(
        surface: &Surface,
        phys: vk::PhysicalDevice,
    ) -> Result<Self, vk::Result> {
        let loader = surface.loader();
        let handle = surface.handle();
        unsafe {
            Ok(Self {
                capabilities: loader.get_physical_device_surface_capabilities(phys, handle)?,
                formats: loader.get_physical_device_surface_formats(phys, handle)?,
                present_modes: loader.get_physical_device_surface_present_modes(phys, handle)?,
            })
        }
    }
}

/// BGRA8 sRGB with the sRGB non-linear color space, else the first reported.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    match preference {
        PresentPreference::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        // FIFO support is mandatory.
        _ => vk::PresentModeKHR::FIFO,
    }
}

/// `current_extent` unless the surface leaves sizing to us, in which case the
/// framebuffer size is clamped into the supported range.
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    framebuffer: impl FnOnce() -> RenderSize,
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    let want = framebuffer();
    vk::Extent2D {
        width: want
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: want
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 && desired > caps.max_image_count {
        caps.max_image_count
    } else {
        desired
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharingPlan {
    Exclusive,
    Concurrent([u32; 2]),
}

impl SharingPlan {
    pub fn for_families(families: &QueueFamilies) -> Self {
        if families.is_shared() {
            SharingPlan::Exclusive
        } else {
            SharingPlan::Concurrent([families.graphics, families.present])
        }
    }

    pub fn mode(&self) -> vk::SharingMode {
        match self {
            SharingPlan::Exclusive => vk::SharingMode::EXCLUSIVE,
            SharingPlan::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn family_indices(&self) -> &[u32] {
        match self {
            SharingPlan::Exclusive => &[],
            SharingPlan::Concurrent(indices) => indices,
        }
    }
}

/// The negotiated configuration, kept for downstream consumers.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub sharing: SharingPlan,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    /// `None` when the surface reports no formats at all.
    pub fn negotiate(
        support: &SwapchainSupport,
        families: &QueueFamilies,
        preference: PresentPreference,
        framebuffer: impl FnOnce() -> RenderSize,
    ) -> Option<Self> {
        let caps = &support.capabilities;
        Some(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes, preference),
            extent: choose_extent(caps, framebuffer),
            image_count: choose_image_count(caps),
            sharing: SharingPlan::for_families(families),
            pre_transform: caps.current_transform,
        })
    }

    pub fn create_info(&self, surface: vk::SurfaceKHR) -> vk::SwapchainCreateInfoKHR<'_> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(self.image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(self.sharing.mode())
            .queue_family_indices(self.sharing.family_indices())
            .pre_transform(self.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null())
    }
}

pub struct Swapchain {
    loader: swapchain::Device,
    handle: vk::SwapchainKHR,
    config: SwapchainConfig,
    images: Vec<vk::Image>,
}

impl Swapchain {
    /// Creates the chain. Images are fetched separately with
    /// [`load_images`](Self::load_images) once the release action is in place.
    pub(crate) unsafe fn create(
        instance: &Instance,
        device: &Device,
        surface: &Surface,
        config: SwapchainConfig,
    ) -> Result<Self, InitErrorKind> {
        let loader = swapchain::Device::new(instance, device);
        let create_info = config.create_info(surface.handle());
        let handle = unsafe { loader.create_swapchain(&create_info, None) }.map_err(|e| {
            InitErrorKind::SwapChainCreateFailed {
                driver_code: DriverCode(e.as_raw()),
            }
        })?;
        Ok(Self {
            loader,
            handle,
            config,
            images: Vec::new(),
        })
    }

    /// The driver may create more images than were requested.
    pub(crate) unsafe fn load_images(&mut self) -> Result<(), InitErrorKind> {
        self.images = unsafe { self.loader.get_swapchain_images(self.handle) }.map_err(|e| {
            InitErrorKind::QueryFailed {
                call: "get_swapchain_images",
                driver_code: DriverCode(e.as_raw()),
            }
        })?;
        let c = &self.config;
        info!(
            "swap chain up ({}x{}, {:?}/{:?}, {:?}, {} images, {:?} sharing)",
            c.extent.width,
            c.extent.height,
            c.surface_format.format,
            c.surface_format.color_space,
            c.present_mode,
            self.images.len(),
            c.sharing.mode(),
        );
        Ok(())
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Negotiated parameters the chain was created with.
    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    /// Borrowed from the chain; invalid once it is destroyed.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub(crate) fn destroyer(&self) -> impl FnOnce() + 'static {
        let loader = self.loader.clone();
        let handle = self.handle;
        // SAFETY: first on the release stack; nothing else references the
        // chain's images.
        move || unsafe { loader.destroy_swapchain(handle, None) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn pair(f: Option<vk::SurfaceFormatKHR>) -> Option<(vk::Format, vk::ColorSpaceKHR)> {
        f.map(|f| (f.format, f.color_space))
    }

    fn unreachable_framebuffer() -> RenderSize {
        panic!("framebuffer size must not be queried when current_extent is set")
    }

    #[test]
    fn prefers_bgra8_srgb() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            pair(choose_surface_format(&formats)),
            Some((vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(
            pair(choose_surface_format(&formats)),
            Some((vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
        assert_eq!(pair(choose_surface_format(&[])), None);
    }

    #[test]
    fn mailbox_when_offered_else_fifo() {
        let with_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        let without = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&with_mailbox, PresentPreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&without, PresentPreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&with_mailbox, PresentPreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn current_extent_is_used_verbatim() {
        let extent = choose_extent(&caps(2, 3), unreachable_framebuffer);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn undefined_extent_clamps_framebuffer() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            max_image_extent: vk::Extent2D {
                width: 1280,
                height: 1024,
            },
            ..Default::default()
        };
        let big = choose_extent(&caps, || RenderSize::new(1600, 1200));
        assert_eq!((big.width, big.height), (1280, 1024));

        let small = choose_extent(&caps, || RenderSize::new(320, 200));
        assert_eq!((small.width, small.height), (640, 480));
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        assert_eq!(choose_image_count(&caps(2, 3)), 3);
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        assert_eq!(choose_image_count(&caps(1, 8)), 2);
    }

    #[test]
    fn sharing_follows_family_split() {
        let shared = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let split = QueueFamilies {
            graphics: 0,
            present: 1,
        };
        assert_eq!(SharingPlan::for_families(&shared).mode(), vk::SharingMode::EXCLUSIVE);
        assert!(SharingPlan::for_families(&shared).family_indices().is_empty());
        assert_eq!(SharingPlan::for_families(&split).mode(), vk::SharingMode::CONCURRENT);
        assert_eq!(SharingPlan::for_families(&split).family_indices(), [0, 1]);
    }

    #[test]
    fn split_families_produce_concurrent_create_info() {
        let support = SwapchainSupport {
            capabilities: caps(2, 0),
            formats: vec![fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let families = QueueFamilies {
            graphics: 0,
            present: 1,
        };
        let config = SwapchainConfig::negotiate(
            &support,
            &families,
            PresentPreference::Mailbox,
            unreachable_framebuffer,
        )
        .unwrap();
        let info = config.create_info(vk::SurfaceKHR::null());

        assert_eq!(info.image_sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(info.queue_family_index_count, 2);
        assert_eq!(info.min_image_count, 3);
        assert_eq!(info.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(info.image_array_layers, 1);
        assert_eq!(info.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);
        assert_eq!(info.composite_alpha, vk::CompositeAlphaFlagsKHR::OPAQUE);
        assert_eq!(info.pre_transform, vk::SurfaceTransformFlagsKHR::IDENTITY);
        assert_eq!(info.clipped, vk::TRUE);
        assert_eq!(info.old_swapchain, vk::SwapchainKHR::null());
    }

    #[test]
    fn shared_family_create_info_has_no_index_list() {
        let support = SwapchainSupport {
            capabilities: caps(2, 3),
            formats: vec![fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let config = SwapchainConfig::negotiate(
            &support,
            &families,
            PresentPreference::Mailbox,
            unreachable_framebuffer,
        )
        .unwrap();
        let info = config.create_info(vk::SurfaceKHR::null());

        assert_eq!(info.image_sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(info.queue_family_index_count, 0);
        assert_eq!(info.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(info.image_format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn negotiation_needs_a_format() {
        let support = SwapchainSupport {
            capabilities: caps(2, 3),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        assert!(SwapchainConfig::negotiate(
            &support,
            &families,
            PresentPreference::Mailbox,
            unreachable_framebuffer
        )
        .is_none());
    }
}
