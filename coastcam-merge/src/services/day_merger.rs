//! Day-unit merge pipeline
//!
//! For one station day: list every present camera's raw folder, align the
//! listings by timestamp, then select calibration and dispatch each merge
//! unit in turn. A failing merge unit is recorded and its siblings continue.

use crate::error::MergeResult;
use crate::models::{
    Camera, CameraListing, CameraRoster, CoverageEntry, CoverageTable, MergeUnit, YearPresence,
};
use crate::paths::{self, CaptureVariant};
use crate::services::calibration_selector::select_calibration;
use crate::services::merge_dispatcher::{MergeDispatcher, PersistedMerge};
use crate::services::timestamp_aligner::align;
use crate::storage::{ObjectStore, StoreError};
use coastcam_common::config::DuplicatePolicy;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One station day to merge
///
/// `day` is the canonical day token used for merge keys. `folders` are the
/// day folder names that may hold raw frames, canonical name first, so
/// legacy unpadded folders are still read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DayUnit {
    pub station: String,
    pub year: String,
    pub day: String,
    pub folders: Vec<String>,
}

impl DayUnit {
    /// Day-unit for a day folder name, canonical or not
    pub fn new(station: impl Into<String>, year: impl Into<String>, day: impl Into<String>) -> Self {
        let folder = day.into();
        let canonical = paths::normalize_day_token(&folder).unwrap_or_else(|_| folder.clone());
        Self::with_folders(station, year, canonical, [folder])
    }

    /// Day-unit for a canonical day and the folders found for it
    pub fn with_folders(
        station: impl Into<String>,
        year: impl Into<String>,
        canonical: impl Into<String>,
        folders: impl IntoIterator<Item = String>,
    ) -> Self {
        let canonical = canonical.into();
        let mut legacy: Vec<String> = folders.into_iter().filter(|f| *f != canonical).collect();
        legacy.sort();
        legacy.dedup();

        let mut ordered = Vec::with_capacity(legacy.len() + 1);
        ordered.push(canonical.clone());
        ordered.extend(legacy);

        Self {
            station: station.into(),
            year: year.into(),
            day: canonical,
            folders: ordered,
        }
    }
}

impl fmt::Display for DayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.station, self.year, self.day)
    }
}

/// A merge unit that did not produce output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub timestamp: i64,
    pub kind: String,
    pub message: String,
}

/// Result of merging one day-unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOutcome {
    pub day: DayUnit,
    pub merged: Vec<PersistedMerge>,
    pub failures: Vec<UnitFailure>,
    pub skipped_files: usize,
}

/// Runs day-units against a shared, read-only roster
pub struct DayMerger {
    store: Arc<dyn ObjectStore>,
    dispatcher: MergeDispatcher,
    roster: Arc<CameraRoster>,
    presence: Arc<YearPresence>,
    policy: DuplicatePolicy,
}

impl DayMerger {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        dispatcher: MergeDispatcher,
        roster: Arc<CameraRoster>,
        presence: Arc<YearPresence>,
        policy: DuplicatePolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            roster,
            presence,
            policy,
        }
    }

    /// Merge every timestamp of a day
    ///
    /// Errors only when the day cannot be aligned at all (listing failure or a
    /// rejected duplicate); per-timestamp failures are in the outcome.
    pub async fn merge_day(&self, day: &DayUnit) -> MergeResult<DayOutcome> {
        let mut listings = Vec::new();
        for registered in &self.roster.cameras {
            let camera = &registered.camera;
            if !self.presence.has_year(&camera.id, &day.year) {
                tracing::debug!(camera = %camera.id, year = %day.year, "Camera absent for year");
                continue;
            }
            let keys = self.list_raw(day, camera).await?;
            listings.push(CameraListing::new(camera.id.clone(), keys));
        }

        let table = align(&listings, self.policy)?;

        tracing::info!(
            day = %day,
            timestamps = table.len(),
            skipped_files = table.skipped.len(),
            "Day aligned"
        );

        Ok(self.dispatch_table(day, &table).await)
    }

    /// Merge one timestamp by checking each camera for its time-exposure frame
    pub async fn merge_timestamp(&self, day: &DayUnit, timestamp: i64) -> MergeResult<DayOutcome> {
        let mut listings = Vec::new();
        for registered in &self.roster.cameras {
            let camera = &registered.camera;
            if !self.presence.has_year(&camera.id, &day.year) {
                continue;
            }
            let filename = format!(
                "{}.{}.{}.jpg",
                timestamp,
                camera.folder(),
                CaptureVariant::TimeExposure
            );
            let mut found = None;
            for folder in &day.folders {
                let key = paths::build_raw_key(&day.station, &camera.id, &day.year, folder, &filename);
                if self.store.exists(&key).await? {
                    found = Some(key);
                    break;
                }
            }
            match found {
                Some(key) => listings.push(CameraListing::new(camera.id.clone(), vec![key])),
                None => tracing::debug!(camera = %camera.id, timestamp, "No capture for timestamp"),
            }
        }

        let table = align(&listings, self.policy)?;
        let mut outcome = self.dispatch_table(day, &table).await;
        if table.is_empty() {
            tracing::warn!(day = %day, timestamp, "No camera captured the requested timestamp");
            outcome.failures.push(UnitFailure {
                timestamp,
                kind: "no_coverage".to_string(),
                message: format!("no time-exposure frame found for {} on {}", timestamp, day),
            });
        }
        Ok(outcome)
    }

    /// Raw listing of the first day folder holding anything for `camera`
    async fn list_raw(&self, day: &DayUnit, camera: &Camera) -> Result<Vec<String>, StoreError> {
        for folder in &day.folders {
            let prefix = paths::raw_prefix(&day.station, &camera.id, &day.year, folder);
            let keys = self.store.list(&prefix).await?;
            if !keys.is_empty() {
                if *folder != day.day {
                    tracing::debug!(camera = %camera.id, folder = %folder, "Reading legacy day folder");
                }
                return Ok(keys);
            }
        }
        Ok(Vec::new())
    }

    async fn dispatch_table(&self, day: &DayUnit, table: &CoverageTable) -> DayOutcome {
        let mut outcome = DayOutcome {
            day: day.clone(),
            merged: Vec::new(),
            failures: Vec::new(),
            skipped_files: table.skipped.len(),
        };

        for entry in table.entries.values() {
            let unit = MergeUnit::from_entry(&day.station, &day.year, &day.day, entry);
            match self.merge_unit(&unit, entry).await {
                Ok(persisted) => outcome.merged.push(persisted),
                Err(e) => {
                    tracing::error!(
                        day = %day,
                        timestamp = unit.timestamp,
                        kind = e.kind(),
                        error = %e,
                        "Merge unit failed"
                    );
                    outcome.failures.push(UnitFailure {
                        timestamp: unit.timestamp,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    async fn merge_unit(&self, unit: &MergeUnit, entry: &CoverageEntry) -> MergeResult<PersistedMerge> {
        let subset = select_calibration(&self.roster, &self.presence, &unit.year, entry)?;
        self.dispatcher.dispatch(unit, &subset, &self.roster).await
    }
}
