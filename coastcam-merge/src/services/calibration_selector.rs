//! Calibration subset selection
//!
//! Projects a coverage entry onto the roster so that `intrinsics[i]`,
//! `extrinsics[i]` and `camera_ids[i]` describe the camera that produced the
//! entry's i-th image.

use crate::error::CalibrationAlignmentError;
use crate::models::{CameraRoster, CoverageEntry, Extrinsics, Intrinsics, YearPresence};

/// Position-aligned calibration for one merge unit
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSubset {
    pub camera_ids: Vec<String>,
    pub intrinsics: Vec<Intrinsics>,
    pub extrinsics: Vec<Extrinsics>,
}

impl CalibrationSubset {
    pub fn len(&self) -> usize {
        self.camera_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.camera_ids.is_empty()
    }
}

/// Select the calibration of the cameras covering `entry`
///
/// Walks the roster once in registration order, skipping cameras absent for
/// `year` or not in the entry. When the entry covers the whole roster the full
/// lists are reused directly. The result is checked against the entry: a
/// length or identity mismatch is an error rather than a misaligned job.
pub fn select_calibration(
    roster: &CameraRoster,
    presence: &YearPresence,
    year: &str,
    entry: &CoverageEntry,
) -> Result<CalibrationSubset, CalibrationAlignmentError> {
    let covers_roster = entry.len() == roster.len()
        && roster
            .cameras
            .iter()
            .zip(entry.camera_ids())
            .all(|(c, id)| c.camera.id == id && presence.has_year(id, year));

    let subset = if covers_roster {
        full_roster(roster)
    } else {
        filtered(roster, presence, year, entry)
    };

    verify(&subset, entry)?;
    Ok(subset)
}

fn full_roster(roster: &CameraRoster) -> CalibrationSubset {
    CalibrationSubset {
        camera_ids: roster.cameras.iter().map(|c| c.camera.id.clone()).collect(),
        intrinsics: roster.cameras.iter().map(|c| c.calibration.intrinsics).collect(),
        extrinsics: roster.cameras.iter().map(|c| c.calibration.extrinsics).collect(),
    }
}

pub(crate) fn filtered(
    roster: &CameraRoster,
    presence: &YearPresence,
    year: &str,
    entry: &CoverageEntry,
) -> CalibrationSubset {
    let mut subset = CalibrationSubset {
        camera_ids: Vec::new(),
        intrinsics: Vec::new(),
        extrinsics: Vec::new(),
    };

    for registered in &roster.cameras {
        let id = registered.camera.id.as_str();
        if !presence.has_year(id, year) || !entry.contains(id) {
            continue;
        }
        subset.camera_ids.push(id.to_string());
        subset.intrinsics.push(registered.calibration.intrinsics);
        subset.extrinsics.push(registered.calibration.extrinsics);
    }

    subset
}

fn verify(subset: &CalibrationSubset, entry: &CoverageEntry) -> Result<(), CalibrationAlignmentError> {
    if let Some(unknown) = entry
        .camera_ids()
        .find(|id| !subset.camera_ids.iter().any(|s| s == *id))
    {
        return Err(CalibrationAlignmentError::UnknownCamera {
            camera: unknown.to_string(),
        });
    }

    if subset.intrinsics.len() != entry.len() || subset.extrinsics.len() != entry.len() {
        return Err(CalibrationAlignmentError::LengthMismatch {
            images: entry.len(),
            intrinsics: subset.intrinsics.len(),
            extrinsics: subset.extrinsics.len(),
        });
    }

    for (position, (image_camera, calibration_camera)) in
        entry.camera_ids().zip(&subset.camera_ids).enumerate()
    {
        if image_camera != calibration_camera {
            return Err(CalibrationAlignmentError::OrderMismatch {
                position,
                image_camera: image_camera.to_string(),
                calibration_camera: calibration_camera.clone(),
            });
        }
    }

    Ok(())
}
