// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use vkhost_core::init_tracing;
use vkhost_platform::WindowHost;
use vkhost_render_vk::VkHost;

mod config;

use config::HostConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML file with window, application and swap-chain settings
    #[arg(long, default_value = "vkhost.toml")]
    config: PathBuf,
}

/// Window up, Vulkan up, pump until closed, then tear down in reverse.
fn run(cfg: &HostConfig) -> Result<()> {
    let mut window = WindowHost::open(&cfg.window_spec()).context("opening window")?;
    let mut gpu = VkHost::new(&window, &cfg.host_settings()).context("bringing up vulkan")?;

    let sc = gpu.swapchain();
    info!(
        "presentable on `{}`: {} {:?} images at {}x{} (validation messenger {})",
        gpu.adapter().name,
        sc.images().len(),
        sc.format(),
        sc.extent().width,
        sc.extent().height,
        if gpu.has_debug_messenger() { "on" } else { "off" }
    );

    gpu.enter_main_loop();
    while !window.should_close() {
        window.pump_events();
    }
    info!("close requested, shutting down");

    // Graphics objects first; the window and toolkit go last.
    drop(gpu);
    drop(window);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let cfg = config::load(&args.config);

    match run(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
