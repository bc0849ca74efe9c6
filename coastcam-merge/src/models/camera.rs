//! Cameras and the station roster

use crate::models::calibration::{CalibrationSet, LocalOrigin, StationMetadata};
use crate::paths;
use std::collections::HashSet;

/// A station camera
///
/// Immutable for the life of a run. Presence per year is tracked separately
/// in [`YearPresence`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Camera {
    /// Upper-case ordinal id, e.g. `C1`
    pub id: String,
    /// `cameras/{station}/{folder}/`
    pub storage_prefix: String,
}

impl Camera {
    pub fn new(station: &str, id: &str) -> Self {
        let id = id.to_uppercase();
        let storage_prefix = paths::camera_prefix(station, &id);
        Self { id, storage_prefix }
    }

    /// Build from a station subfolder name, if it names a camera
    pub fn from_folder(station: &str, folder: &str) -> Option<Self> {
        is_camera_folder(folder).then(|| Self::new(station, folder))
    }

    pub fn folder(&self) -> String {
        paths::camera_folder(&self.id)
    }
}

/// Camera folders are two characters starting with `c`; `cx` holds products
pub fn is_camera_folder(name: &str) -> bool {
    name.len() == 2 && name.starts_with('c') && name != "cx"
}

/// Which cameras have a folder for which year
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearPresence {
    present: HashSet<(String, String)>,
}

impl YearPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presence where every camera is assumed present for `year`
    pub fn assume_all<'a>(cameras: impl IntoIterator<Item = &'a Camera>, year: &str) -> Self {
        let mut presence = Self::new();
        for camera in cameras {
            presence.insert(&camera.id, year);
        }
        presence
    }

    pub fn insert(&mut self, camera_id: &str, year: &str) {
        self.present.insert((camera_id.to_string(), year.to_string()));
    }

    pub fn has_year(&self, camera_id: &str, year: &str) -> bool {
        self.present
            .contains(&(camera_id.to_string(), year.to_string()))
    }

    /// Cameras present in `year`, in the given (registration) order
    pub fn cameras_in<'a>(&self, cameras: &'a [Camera], year: &str) -> Vec<&'a Camera> {
        cameras
            .iter()
            .filter(|c| self.has_year(&c.id, year))
            .collect()
    }
}

/// A camera with its calibration
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredCamera {
    pub camera: Camera,
    pub calibration: CalibrationSet,
}

/// Every camera of a station in registration order, plus station-wide calibration
///
/// Read-only once built; shared across concurrent day-units.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRoster {
    pub station: String,
    pub cameras: Vec<RegisteredCamera>,
    pub metadata: StationMetadata,
    pub local_origin: LocalOrigin,
}

impl CameraRoster {
    pub fn plain_cameras(&self) -> Vec<Camera> {
        self.cameras.iter().map(|c| c.camera.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
