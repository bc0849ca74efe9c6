//! Data models for coastcam-merge
//!
//! - Cameras, the station roster and per-year presence
//! - Calibration parameter sets
//! - Coverage tables and merge units (built per day-unit, then discarded)
//! - Rasters produced by rectification

pub mod calibration;
pub mod camera;
pub mod coverage;
pub mod raster;

pub use calibration::{
    CalibrationSet, CoordinateSystem, Extrinsics, Intrinsics, LocalOrigin, StationCalibration,
    StationMetadata,
};
pub use camera::{is_camera_folder, Camera, CameraRoster, RegisteredCamera, YearPresence};
pub use coverage::{CameraListing, CoverageEntry, CoverageTable, MergeUnit, SkippedFile};
pub use raster::Raster;
