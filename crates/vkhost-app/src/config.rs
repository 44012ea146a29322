// SPDX-License-Identifier: CEPL-1.0
use std::{fs, io, path::Path};

use serde::Deserialize;
use tracing::{debug, warn};
use vkhost_platform::WindowSpec;
use vkhost_render_vk::{AppInfo, HostSettings, PresentPreference, Version, VALIDATION_ENABLED};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    pub window: WindowCfg,
    pub app: AppCfg,
    pub swapchain: SwapchainCfg,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let spec = WindowSpec::default();
        WindowCfg {
            title: spec.title,
            width: spec.width,
            height: spec.height,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub name: String,
    pub version: [u32; 3],
    pub engine_name: String,
    pub engine_version: [u32; 3],
    pub api_version: [u32; 2],
}

impl Default for AppCfg {
    fn default() -> Self {
        AppCfg {
            name: "Hello Triangle".to_owned(),
            version: [1, 0, 0],
            engine_name: "No Engine".to_owned(),
            engine_version: [1, 0, 0],
            api_version: [1, 0],
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SwapchainCfg {
    pub present_mode: PresentModeCfg,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Mailbox,
    Fifo,
}

fn version([major, minor, patch]: [u32; 3]) -> Version {
    Version::new(major, minor, patch)
}

impl HostConfig {
    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
        }
    }

    pub fn host_settings(&self) -> HostSettings {
        let [api_major, api_minor] = match self.app.api_version {
            [0, _] => {
                warn!(
                    "api_version {:?} is below 1.0, requesting 1.0",
                    self.app.api_version
                );
                AppCfg::default().api_version
            }
            v => v,
        };
        HostSettings {
            app: AppInfo {
                name: self.app.name.clone(),
                version: version(self.app.version),
                engine_name: self.app.engine_name.clone(),
                engine_version: version(self.app.engine_version),
                api_version: Version::new(api_major, api_minor, 0),
            },
            present: match self.swapchain.present_mode {
                PresentModeCfg::Mailbox => PresentPreference::Mailbox,
                PresentModeCfg::Fifo => PresentPreference::Fifo,
            },
            validation: VALIDATION_ENABLED,
        }
    }
}

pub fn parse(text: &str) -> Result<HostConfig, toml::de::Error> {
    toml::from_str(text)
}

/// A missing file means defaults; a malformed one is reported and ignored.
pub fn load(path: &Path) -> HostConfig {
    match fs::read_to_string(path) {
        Ok(text) => parse(&text).unwrap_or_else(|e| {
            warn!("ignoring {}: {e}", path.display());
            HostConfig::default()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            HostConfig::default()
        }
        Err(e) => {
            warn!("cannot read {}: {e}; using defaults", path.display());
            HostConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_reproduces_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.window_spec(), WindowSpec::default());

        let settings = cfg.host_settings();
        assert_eq!(settings.present, PresentPreference::Mailbox);
        assert_eq!(settings.app.name, "Hello Triangle");
        assert_eq!(settings.app.engine_name, "No Engine");
        assert_eq!(settings.app.api_version, Version::new(1, 0, 0));
        assert_eq!(settings.validation, cfg!(debug_assertions));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = parse(
            r#"
            [window]
            title = "Bootstrap"

            [swapchain]
            present_mode = "fifo"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "Bootstrap");
        assert_eq!((cfg.window.width, cfg.window.height), (800, 600));
        assert_eq!(cfg.host_settings().present, PresentPreference::Fifo);
    }

    #[test]
    fn app_versions_map_through() {
        let cfg = parse(
            r#"
            [app]
            version = [2, 1, 7]
            api_version = [1, 3]
            "#,
        )
        .unwrap();
        let app = cfg.host_settings().app;
        assert_eq!(app.version, Version::new(2, 1, 7));
        assert_eq!(app.api_version, Version::new(1, 3, 0));
        assert_eq!(app.engine_version, Version::new(1, 0, 0));
    }

    #[test]
    fn api_version_below_1_0_falls_back_to_default() {
        let cfg = parse("[app]\napi_version = [0, 9]\n").unwrap();
        let app = cfg.host_settings().app;
        assert_eq!(app.api_version, Version::new(1, 0, 0));
    }

    #[test]
    fn unreadable_path_falls_back_to_defaults() {
        // A directory exists but cannot be read as a file.
        let cfg = load(&std::env::temp_dir());
        assert_eq!(cfg.window_spec(), WindowSpec::default());
    }

    #[test]
    fn unknown_present_mode_is_rejected() {
        assert!(parse("[swapchain]\npresent_mode = \"immediate\"\n").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load(Path::new("definitely/not/here/vkhost.toml"));
        assert_eq!(cfg.swapchain.present_mode, PresentModeCfg::Mailbox);
    }
}
