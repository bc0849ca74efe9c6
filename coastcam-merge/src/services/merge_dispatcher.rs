//! Merge dispatcher
//!
//! Runs one merge unit through the rectifier and persists the result: the
//! raster is flipped vertically, encoded, written to the scratch directory
//! for inspection and stored under the station's `cx/merge` namespace.
//! Only the object store write is terminal; a scratch write failure is
//! logged and ignored.

use crate::error::{CalibrationAlignmentError, MergeError, MergeResult};
use crate::models::{CameraRoster, MergeUnit, Raster};
use crate::paths;
use crate::services::calibration_selector::CalibrationSubset;
use crate::services::rectifier_client::{RectificationJob, Rectifier};
use crate::storage::ObjectStore;
use coastcam_common::config::{OutputFormat, TargetGrid};
use std::path::PathBuf;
use std::sync::Arc;

/// Where a merged raster was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMerge {
    pub timestamp: i64,
    pub key: String,
    pub scratch_path: Option<PathBuf>,
    pub cameras: usize,
}

pub struct MergeDispatcher {
    store: Arc<dyn ObjectStore>,
    rectifier: Arc<dyn Rectifier>,
    grid: TargetGrid,
    output_format: OutputFormat,
    scratch_dir: Option<PathBuf>,
}

impl MergeDispatcher {
    pub fn new(store: Arc<dyn ObjectStore>, rectifier: Arc<dyn Rectifier>, grid: TargetGrid) -> Self {
        Self {
            store,
            rectifier,
            grid,
            output_format: OutputFormat::default(),
            scratch_dir: None,
        }
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Also write merged rasters below `dir`
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// Rectify one merge unit and persist the raster
    pub async fn dispatch(
        &self,
        unit: &MergeUnit,
        subset: &CalibrationSubset,
        roster: &CameraRoster,
    ) -> MergeResult<PersistedMerge> {
        check_alignment(unit, subset)?;

        let mut images = Vec::with_capacity(unit.image_refs.len());
        for key in &unit.image_refs {
            images.push(self.store.get(key).await?);
        }

        let job = RectificationJob {
            metadata: roster.metadata.clone(),
            image_refs: unit.image_refs.clone(),
            images,
            intrinsics: subset.intrinsics.clone(),
            extrinsics: subset.extrinsics.clone(),
            local_origin: roster.local_origin,
            grid: self.grid,
        };

        tracing::debug!(
            station = %unit.station,
            timestamp = unit.timestamp,
            cameras = ?unit.cameras,
            "Rectifying merge unit"
        );

        let raster = self.rectifier.rectify(&job).await?;
        let encoded = encode_flipped(raster, self.output_format).await?;

        let ext = self.output_format.extension();
        let scratch_path = self.write_scratch(unit, ext, &encoded).await;

        let key = unit.merge_key(ext);
        self.store.put(&key, encoded).await?;

        tracing::info!(
            station = %unit.station,
            day = %unit.day,
            timestamp = unit.timestamp,
            cameras = unit.cameras.len(),
            key = %key,
            "Merged image stored"
        );

        Ok(PersistedMerge {
            timestamp: unit.timestamp,
            key,
            scratch_path,
            cameras: unit.cameras.len(),
        })
    }

    async fn write_scratch(&self, unit: &MergeUnit, ext: &str, encoded: &[u8]) -> Option<PathBuf> {
        let dir = self.scratch_dir.as_ref()?;
        let path = dir.join(paths::merge_filename(unit.timestamp, ext));

        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, encoded).await
        }
        .await;

        match result {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to write scratch copy of merged image"
                );
                None
            }
        }
    }
}

fn check_alignment(
    unit: &MergeUnit,
    subset: &CalibrationSubset,
) -> Result<(), CalibrationAlignmentError> {
    let images = unit.image_refs.len();
    if unit.cameras.len() != images
        || subset.camera_ids.len() != images
        || subset.intrinsics.len() != images
        || subset.extrinsics.len() != images
    {
        return Err(CalibrationAlignmentError::LengthMismatch {
            images,
            intrinsics: subset.intrinsics.len(),
            extrinsics: subset.extrinsics.len(),
        });
    }

    match unit
        .cameras
        .iter()
        .zip(&subset.camera_ids)
        .position(|(image, calibration)| image != calibration)
    {
        Some(position) => Err(CalibrationAlignmentError::OrderMismatch {
            position,
            image_camera: unit.cameras[position].clone(),
            calibration_camera: subset.camera_ids[position].clone(),
        }),
        None => Ok(()),
    }
}

/// Flip and encode on a blocking thread
async fn encode_flipped(raster: Raster, format: OutputFormat) -> MergeResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || raster.flipped_vertically().encode(format))
        .await
        .map_err(|e| MergeError::Encode(format!("Task join error: {}", e)))?
        .map_err(|e| MergeError::Encode(e.to_string()))
}
