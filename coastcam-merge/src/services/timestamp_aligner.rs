//! Timestamp alignment
//!
//! Turns independent per-camera listings of one day folder into a single
//! timestamp-indexed coverage table. Cameras are visited in the order the
//! listings are given (registration order), so every coverage entry lists
//! its cameras in registration order regardless of discovery order.

use crate::error::DuplicateCaptureError;
use crate::models::{CameraListing, CoverageEntry, CoverageTable, SkippedFile};
use crate::paths::{self, CaptureVariant};
use coastcam_common::config::DuplicatePolicy;
use std::collections::BTreeMap;

/// Build the coverage table for one day-unit
///
/// Only time-exposure frames participate. Folder entries are ignored and
/// unparseable filenames are recorded in `skipped`. Two listings with the same
/// camera id are treated as one listing.
pub fn align(
    listings: &[CameraListing],
    policy: DuplicatePolicy,
) -> Result<CoverageTable, DuplicateCaptureError> {
    let mut skipped = Vec::new();

    // Per-camera timestamp -> key, cameras kept in first-seen order
    let mut per_camera: Vec<(&str, BTreeMap<i64, &str>)> = Vec::new();

    for listing in listings {
        let slot = match per_camera
            .iter()
            .position(|(id, _)| *id == listing.camera_id)
        {
            Some(slot) => slot,
            None => {
                per_camera.push((listing.camera_id.as_str(), BTreeMap::new()));
                per_camera.len() - 1
            }
        };

        for key in &listing.keys {
            if key.ends_with('/') {
                continue;
            }

            let name = paths::file_name(key);
            let capture = match paths::parse_capture_filename(name) {
                Ok(capture) => capture,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping unparseable capture");
                    skipped.push(SkippedFile {
                        key: key.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if capture.variant != CaptureVariant::TimeExposure {
                continue;
            }

            let timestamps = &mut per_camera[slot].1;
            if let Some(previous) = timestamps.insert(capture.timestamp, key.as_str()) {
                match policy {
                    DuplicatePolicy::LastWins => {
                        tracing::warn!(
                            camera = %listing.camera_id,
                            timestamp = capture.timestamp,
                            kept = %key,
                            dropped = %previous,
                            "Duplicate time-exposure frame, keeping the later one"
                        );
                    }
                    DuplicatePolicy::Reject => {
                        return Err(DuplicateCaptureError {
                            camera: listing.camera_id.clone(),
                            timestamp: capture.timestamp,
                            first: previous.to_string(),
                            second: key.clone(),
                        });
                    }
                }
            }
        }
    }

    let mut entries: BTreeMap<i64, CoverageEntry> = BTreeMap::new();
    for (camera_id, timestamps) in &per_camera {
        for (timestamp, key) in timestamps {
            entries
                .entry(*timestamp)
                .or_insert_with(|| CoverageEntry::new(*timestamp))
                .captures
                .push((camera_id.to_string(), key.to_string()));
        }
    }

    Ok(CoverageTable { entries, skipped })
}
