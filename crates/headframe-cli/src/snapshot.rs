//! Hands a completed capture over as files: two PNGs and a record.
//!
//! The record mirrors what the snapshot service stores for each pair: an
//! opaque id, creation and update timestamps, and the two photos.

use chrono::{DateTime, Utc};
use headframe_capture::CapturedImages;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to write record: {0}")]
    Record(#[from] std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotPhotos {
    pub front: String,
    pub top: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub photos: SnapshotPhotos,
}

/// Write `pair` under `root/<id>/` and return the record and its directory.
pub fn write_snapshot(
    root: &Path,
    pair: &CapturedImages,
) -> Result<(SnapshotRecord, PathBuf), SnapshotError> {
    let id = uuid::Uuid::new_v4().to_string();
    let dir = root.join(&id);
    std::fs::create_dir_all(&dir).map_err(|source| SnapshotError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    for (name, image) in [("front.png", &pair.front), ("top.png", &pair.top)] {
        let path = dir.join(name);
        image
            .save(&path)
            .map_err(|source| SnapshotError::Encode { path, source })?;
    }

    let now = Utc::now();
    let record = SnapshotRecord {
        id,
        created_at: now,
        updated_at: now,
        photos: SnapshotPhotos {
            front: "front.png".into(),
            top: "top.png".into(),
        },
    };
    std::fs::write(dir.join("snapshot.json"), serde_json::to_vec_pretty(&record)?)?;

    tracing::info!(id = %record.id, dir = %dir.display(), "snapshot written");
    Ok((record, dir))
}
