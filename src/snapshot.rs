// SPDX-License-Identifier: GPL-3.0-only

//! Saving published textures to disk

use crate::errors::AppResult;
use crate::texture::{CpuTexture, PublishedTexture};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for a snapshot taken now
pub fn snapshot_file_name() -> String {
    format!("IMG_{}.png", Local::now().format("%Y%m%d_%H%M%S%.3f"))
}

/// Encode the texture as PNG into `dir`, creating it if needed
pub fn save_snapshot(texture: &PublishedTexture<CpuTexture>, dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name());
    texture.texture().save(&path)?;
    info!(
        path = %path.display(),
        width = texture.width(),
        height = texture.height(),
        timestamp = ?texture.timestamp(),
        "Snapshot saved"
    );
    Ok(path)
}
