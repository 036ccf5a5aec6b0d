// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Saving a snapshot of the first texture
//! - Running a headless texture consumer
//! - Managing the configuration file

use crate::ConfigAction;
use camtex::backends::camera::CaptureProvider;
use camtex::constants::timing;
use camtex::pipeline::{CameraTexturePipeline, CaptureConfiguration, PipelineEvent};
use camtex::snapshot::save_snapshot;
use camtex::texture::{CpuTextureFactory, TextureBackendType, TextureFactory};
use camtex::{CapturePreset, Config};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// List all available cameras
pub fn list_cameras(provider: Arc<dyn CaptureProvider>) -> CliResult {
    let cameras = provider.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found ({} backend).", provider.backend_type());
        return Ok(());
    }

    println!("Available cameras ({} backend):", provider.backend_type());
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.name, camera.position);
        println!("      Path: {}", camera.path);
    }
    println!();
    let presets: Vec<String> = CapturePreset::ALL.iter().map(|p| p.to_string()).collect();
    println!("Presets: {}", presets.join(", "));

    Ok(())
}

/// Wait for the first texture and write it to `dir` as PNG
pub fn take_snapshot(
    provider: Arc<dyn CaptureProvider>,
    configuration: CaptureConfiguration,
    dir: &Path,
    timeout_secs: u64,
) -> CliResult {
    let pipeline = CameraTexturePipeline::create(provider, configuration, CpuTextureFactory::new())?;
    println!("Using camera: {}", pipeline.device().name);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    pipeline.start_capture()?;

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let texture = loop {
        if let Some(texture) = pipeline.current_texture() {
            break texture;
        }
        if stop_flag.load(Ordering::SeqCst) {
            pipeline.stop_capture()?;
            return Err("Interrupted before a frame arrived".into());
        }
        if Instant::now() >= deadline {
            let stats = pipeline.stats();
            pipeline.stop_capture()?;
            return Err(format!("No texture within {} seconds ({})", timeout_secs, stats).into());
        }
        std::thread::sleep(Duration::from_millis(timing::CONSUMER_TICK_MS));
    };
    pipeline.stop_capture()?;

    let path = save_snapshot(&texture, dir)?;
    println!(
        "Snapshot saved: {} ({}x{})",
        path.display(),
        texture.width(),
        texture.height()
    );
    Ok(())
}

/// Read the current texture once per render tick and report statistics
pub fn stream(
    provider: Arc<dyn CaptureProvider>,
    configuration: CaptureConfiguration,
    textures: TextureBackendType,
    duration_secs: u64,
) -> CliResult {
    match textures {
        TextureBackendType::Cpu => {
            stream_with(provider, configuration, CpuTextureFactory::new(), duration_secs)
        }
        #[cfg(feature = "gpu")]
        TextureBackendType::Gpu => {
            let factory = camtex::texture::GpuTextureFactory::headless("camtex")?;
            stream_with(provider, configuration, factory, duration_secs)
        }
        #[cfg(not(feature = "gpu"))]
        TextureBackendType::Gpu => Err("built without the `gpu` feature".into()),
    }
}

fn stream_with<F: TextureFactory>(
    provider: Arc<dyn CaptureProvider>,
    configuration: CaptureConfiguration,
    factory: F,
    duration_secs: u64,
) -> CliResult {
    let engine = factory.name();
    let pipeline = CameraTexturePipeline::create(provider, configuration, factory)?;
    println!(
        "Streaming {} with {} textures{}",
        pipeline.device().name,
        engine,
        if duration_secs == 0 {
            " (Ctrl+C to stop)".to_string()
        } else {
            format!(" for {} seconds", duration_secs)
        }
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut events = pipeline.subscribe();
    pipeline.start_capture()?;

    let result: CliResult = runtime.block_on(async {
        let mut tick = tokio::time::interval(Duration::from_millis(timing::CONSUMER_TICK_MS));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut report = tokio::time::interval(Duration::from_secs(1));
        let end = (duration_secs > 0).then(|| {
            tokio::time::Instant::now() + Duration::from_secs(duration_secs)
        });
        let until_end = async {
            match end {
                Some(end) => tokio::time::sleep_until(end).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(until_end);

        let started = Instant::now();
        let mut last_sequence = 0u64;
        let mut fresh_ticks = 0u64;
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    ticks += 1;
                    if let Some(current) = pipeline.current_texture()
                        && current.sequence() != last_sequence
                    {
                        last_sequence = current.sequence();
                        fresh_ticks += 1;
                    }
                }
                _ = report.tick() => {
                    let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
                    println!(
                        "[{:6.1}s] {} | fresh textures {:.1}/s over {} ticks",
                        elapsed,
                        pipeline.stats(),
                        fresh_ticks as f64 / elapsed,
                        ticks
                    );
                }
                event = events.recv() => match event {
                    Ok(PipelineEvent::Interrupted { reason, .. }) => {
                        println!("Capture interrupted: {}", reason);
                        break;
                    }
                    Ok(PipelineEvent::FrameDropped { error, .. }) => {
                        warn!(error = %error, "Frame dropped");
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagging");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    println!("Stopping...");
                    break;
                }
                _ = &mut until_end => break,
            }
        }
        Ok(())
    });

    pipeline.stop_capture()?;
    println!("Final: {}", pipeline.stats());
    if let Some(current) = pipeline.current_texture() {
        println!(
            "Last texture: #{} {}x{} at {:?}",
            current.sequence(),
            current.width(),
            current.height(),
            current.timestamp()
        );
    }
    result
}

/// Show, locate or reset the configuration file
pub fn config_command(action: ConfigAction, config: &Config) -> CliResult {
    match action {
        ConfigAction::Show => println!("{}", serde_json::to_string_pretty(config)?),
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            let path = Config::default().save()?;
            println!("Default configuration written to {}", path.display());
        }
    }
    Ok(())
}
