//! Coverage tables and merge units

use crate::paths;
use std::collections::BTreeMap;

/// Raw listing of one camera's day folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraListing {
    pub camera_id: String,
    /// Storage keys in listing order
    pub keys: Vec<String>,
}

impl CameraListing {
    pub fn new(camera_id: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            keys,
        }
    }
}

/// Cameras that captured one timestamp, in registration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageEntry {
    pub timestamp: i64,
    /// `(camera id, storage key)`; a camera appears at most once
    pub captures: Vec<(String, String)>,
}

impl CoverageEntry {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            captures: Vec::new(),
        }
    }

    pub fn camera_ids(&self) -> impl Iterator<Item = &str> {
        self.captures.iter().map(|(id, _)| id.as_str())
    }

    pub fn contains(&self, camera_id: &str) -> bool {
        self.camera_ids().any(|id| id == camera_id)
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// A listed file that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub key: String,
    pub reason: String,
}

/// Timestamp-indexed coverage of one day-unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageTable {
    pub entries: BTreeMap<i64, CoverageEntry>,
    pub skipped: Vec<SkippedFile>,
}

impl CoverageTable {
    pub fn get(&self, timestamp: i64) -> Option<&CoverageEntry> {
        self.entries.get(&timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One rectification job: one timestamp at one station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeUnit {
    pub station: String,
    pub year: String,
    pub day: String,
    pub timestamp: i64,
    pub image_refs: Vec<String>,
    /// `cameras[i]` produced `image_refs[i]`
    pub cameras: Vec<String>,
}

impl MergeUnit {
    pub fn from_entry(station: &str, year: &str, day: &str, entry: &CoverageEntry) -> Self {
        let (cameras, image_refs) = entry.captures.iter().cloned().unzip();
        Self {
            station: station.to_string(),
            year: year.to_string(),
            day: day.to_string(),
            timestamp: entry.timestamp,
            image_refs,
            cameras,
        }
    }

    /// Destination key of the merged product
    pub fn merge_key(&self, ext: &str) -> String {
        paths::build_merge_key(&self.station, &self.year, &self.day, self.timestamp, ext)
    }
}
