// SPDX-License-Identifier: GPL-3.0-only

use camtex::backends::camera::get_provider;
use camtex::texture::TextureBackendType;
use camtex::{CameraSelection, CaptureBackendType, CapturePreset, Config};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

mod cli;

#[derive(Parser)]
#[command(name = "camtex")]
#[command(about = "Capture camera frames as renderer textures")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Capture provider
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    /// Capture quality preset (low, medium, high, fullhd)
    #[arg(long, global = true, value_parser = parse_preset)]
    preset: Option<CapturePreset>,

    /// Camera: front, back, external, or a device path from 'camtex list'
    #[arg(long, global = true, value_parser = parse_camera)]
    camera: Option<CameraSelection>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Save the first texture produced by the camera as PNG
    Snapshot {
        /// Output directory (default: configured snapshot directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seconds to wait for the first frame
        #[arg(short, long, default_value = "5")]
        timeout: u64,
    },

    /// Consume textures headlessly at render rate and report statistics
    Stream {
        /// Seconds to run (0 = until Ctrl+C)
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Texture engine
        #[arg(long, value_enum)]
        textures: Option<TexturesArg>,
    },

    /// Preview the camera in the terminal
    Preview,

    /// Inspect or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Write the default configuration
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Gstreamer,
    Synthetic,
}

#[derive(Clone, Copy, ValueEnum)]
enum TexturesArg {
    Cpu,
    Gpu,
}

fn parse_preset(value: &str) -> Result<CapturePreset, String> {
    CapturePreset::from_name(value)
        .ok_or_else(|| format!("unknown preset '{}' (low, medium, high, fullhd)", value))
}

fn parse_camera(value: &str) -> Result<CameraSelection, String> {
    if value.trim().is_empty() {
        return Err("camera must not be empty".to_string());
    }
    Ok(CameraSelection::parse(value))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) if matches!(cli.command, Commands::Config { .. }) => {
            eprintln!("{}", e);
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    // Set RUST_LOG to override the configured filter
    // Examples: RUST_LOG=debug, RUST_LOG=camtex=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    if let Some(backend) = cli.backend {
        config.backend = match backend {
            BackendArg::Gstreamer => CaptureBackendType::GStreamer,
            BackendArg::Synthetic => CaptureBackendType::Synthetic,
        };
    }
    if let Some(preset) = cli.preset {
        config.capture_preset = preset;
    }
    if let Some(camera) = cli.camera {
        config.camera = camera;
    }

    info!(backend = %config.backend, preset = %config.capture_preset, camera = %config.camera, "Starting camtex");

    match cli.command {
        Commands::List => cli::list_cameras(get_provider(config.backend)?),
        Commands::Snapshot { output, timeout } => {
            let dir = output.unwrap_or_else(|| config.snapshot_dir());
            cli::take_snapshot(
                get_provider(config.backend)?,
                config.capture_configuration(),
                &dir,
                timeout,
            )
        }
        Commands::Stream { duration, textures } => {
            let textures = match textures {
                Some(TexturesArg::Cpu) => TextureBackendType::Cpu,
                Some(TexturesArg::Gpu) => TextureBackendType::Gpu,
                None => config.texture_backend,
            };
            cli::stream(
                get_provider(config.backend)?,
                config.capture_configuration(),
                textures,
                duration,
            )
        }
        Commands::Preview => camtex::terminal::run(
            get_provider(config.backend)?,
            config.capture_configuration(),
            &config.snapshot_dir(),
        )
        .map_err(Into::into),
        Commands::Config { action } => cli::config_command(action, &config),
    }
}
