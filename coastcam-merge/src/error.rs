//! Error types for coastcam-merge
//!
//! Failures are contained at the smallest unit that owns them: a malformed
//! filename skips one file, an alignment or rectification failure aborts one
//! merge unit, a listing failure aborts one day-unit.

use crate::paths::PathError;
use crate::services::rectifier_client::RectifyError;
use crate::storage::StoreError;
use thiserror::Error;

/// Image and calibration lists disagree for a merge unit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationAlignmentError {
    /// Covered camera missing from the roster or absent for the year
    #[error("Camera {camera} has an image but no usable calibration")]
    UnknownCamera { camera: String },

    #[error("Selected {intrinsics} intrinsics and {extrinsics} extrinsics for {images} images")]
    LengthMismatch {
        images: usize,
        intrinsics: usize,
        extrinsics: usize,
    },

    #[error("Position {position}: image from {image_camera} but calibration for {calibration_camera}")]
    OrderMismatch {
        position: usize,
        image_camera: String,
        calibration_camera: String,
    },
}

/// Two time-exposure frames from one camera share a timestamp
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Camera {camera} has two time-exposure frames for timestamp {timestamp}: {first} and {second}")]
pub struct DuplicateCaptureError {
    pub camera: String,
    pub timestamp: i64,
    pub first: String,
    pub second: String,
}

/// Merge pipeline errors
#[derive(Debug, Error)]
pub enum MergeError {
    /// Unparseable capture filename, day token or key
    #[error(transparent)]
    MalformedFilename(#[from] PathError),

    #[error("Calibration alignment failed: {0}")]
    CalibrationAlignment(#[from] CalibrationAlignmentError),

    #[error("Storage I/O failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Rectification failed: {0}")]
    Rectification(#[from] RectifyError),

    #[error(transparent)]
    DuplicateCapture(#[from] DuplicateCaptureError),

    #[error("Raster encoding failed: {0}")]
    Encode(String),

    /// Calibration could not be loaded
    #[error("Calibration unavailable: {0}")]
    Calibration(#[from] coastcam_common::Error),
}

impl MergeError {
    /// Short label used to group failures in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            MergeError::MalformedFilename(_) => "malformed_filename",
            MergeError::CalibrationAlignment(_) => "calibration_alignment",
            MergeError::Storage(_) => "storage_io",
            MergeError::Rectification(_) => "rectification",
            MergeError::DuplicateCapture(_) => "duplicate_capture",
            MergeError::Encode(_) => "encode",
            MergeError::Calibration(_) => "calibration",
        }
    }
}

pub type MergeResult<T> = std::result::Result<T, MergeError>;
