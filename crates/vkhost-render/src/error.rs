// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

use thiserror::Error;

/// The bring-up stage an [`InitError`] was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStage {
    Window,
    Instance,
    DebugMessenger,
    Surface,
    PhysicalDevice,
    Device,
    SwapChain,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitStage::Window => "window",
            InitStage::Instance => "instance",
            InitStage::DebugMessenger => "debug messenger",
            InitStage::Surface => "surface",
            InitStage::PhysicalDevice => "physical device",
            InitStage::Device => "logical device",
            InitStage::SwapChain => "swap chain",
        })
    }
}

/// Raw `VkResult` returned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCode(pub i32);

impl fmt::Display for DriverCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VkResult {}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitErrorKind {
    #[error("window initialization failed: {0}")]
    WindowInitFailed(String),
    #[error("validation layers requested, but not available")]
    ValidationLayersMissing,
    #[error("application info contains an interior NUL: {0:?}")]
    InvalidAppInfo(String),
    #[error("failed to create instance ({driver_code})")]
    InstanceCreateFailed { driver_code: DriverCode },
    #[error("extension not present: {0}")]
    ExtensionNotPresent(String),
    #[error("failed to set up debug messenger ({driver_code})")]
    DebugMessengerFailed { driver_code: DriverCode },
    #[error("failed to create window surface ({driver_code})")]
    SurfaceCreateFailed { driver_code: DriverCode },
    #[error("failed to find GPUs with Vulkan support")]
    NoVulkanGpu,
    #[error("failed to find a suitable GPU")]
    NoSuitableGpu,
    #[error("failed to create logical device ({driver_code})")]
    DeviceCreateFailed { driver_code: DriverCode },
    #[error("failed to create swap chain ({driver_code})")]
    SwapChainCreateFailed { driver_code: DriverCode },
    #[error("{call} failed ({driver_code})")]
    QueryFailed {
        call: &'static str,
        driver_code: DriverCode,
    },
}

impl InitErrorKind {
    pub fn at(self, stage: InitStage) -> InitError {
        InitError { stage, kind: self }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{stage} stage failed: {kind}")]
pub struct InitError {
    pub stage: InitStage,
    pub kind: InitErrorKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_stage_and_driver_code() {
        let err = InitErrorKind::DeviceCreateFailed {
            driver_code: DriverCode(-3),
        }
        .at(InitStage::Device);
        assert_eq!(
            err.to_string(),
            "logical device stage failed: failed to create logical device (VkResult -3)"
        );
    }
}
