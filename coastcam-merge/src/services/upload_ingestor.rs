//! Upload ingest and station maintenance
//!
//! - Re-keys flat uploads (`cameras/{station}/products/{file}`) into the
//!   day-partitioned raw layout
//! - Re-pads legacy day folders (`5_Jan.05` → `005_Jan.05`)
//! - Counts the capture variants in a day folder

use crate::error::MergeResult;
use crate::models::Camera;
use crate::paths::{self, CaptureVariant, DayToken, PathError};
use crate::services::camera_registry::CameraRegistry;
use crate::services::scope_planner::Scope;
use crate::storage::{ObjectStore, StoreError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A copied upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedCapture {
    pub raw_key: String,
    pub variant: CaptureVariant,
    /// Set for time-exposure frames, which are merged on arrival
    pub merge_scope: Option<Scope>,
}

/// Day folders moved to canonical names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub folders_normalized: usize,
    pub objects_copied: usize,
    /// Day folders that are not day tokens at all
    pub folders_ignored: usize,
}

/// Objects of one raw folder per capture variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariantCensus {
    pub counts: BTreeMap<String, usize>,
    pub unparseable: usize,
}

impl VariantCensus {
    pub fn total(&self) -> usize {
        self.counts.values().sum::<usize>() + self.unparseable
    }

    pub fn count(&self, variant: CaptureVariant) -> usize {
        self.counts.get(variant.token()).copied().unwrap_or(0)
    }
}

pub struct UploadIngestor {
    store: Arc<dyn ObjectStore>,
}

impl UploadIngestor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Copy an upload to its raw key
    ///
    /// Non-images and malformed names are rejected before anything is copied.
    pub async fn ingest(&self, upload_key: &str) -> MergeResult<IngestedCapture> {
        let (raw_key, capture) = match paths::raw_key_for_upload(upload_key) {
            Ok(mapped) => mapped,
            Err(e) => {
                tracing::warn!(key = %upload_key, error = %e, "Upload not ingested");
                return Err(e.into());
            }
        };

        self.store.copy(upload_key, &raw_key).await?;

        tracing::info!(from = %upload_key, to = %raw_key, variant = %capture.variant, "Upload copied");

        let merge_scope = if capture.variant == CaptureVariant::TimeExposure {
            let station = station_of_upload(upload_key)?;
            Some(Scope::for_capture(station, &capture)?)
        } else {
            None
        };

        Ok(IngestedCapture {
            raw_key,
            variant: capture.variant,
            merge_scope,
        })
    }

    /// Copy every non-canonical day folder of a station to its padded name
    pub async fn normalize_station_days(&self, station: &str) -> MergeResult<NormalizeReport> {
        let registry = CameraRegistry::new(self.store.clone());
        let cameras = registry.discover_cameras(station).await?;
        let years = registry.list_years(&cameras).await?;

        let mut report = NormalizeReport::default();
        for camera in &cameras {
            for year in &years {
                self.normalize_year(station, camera, year, &mut report).await?;
            }
        }

        tracing::info!(
            station = %station,
            folders = report.folders_normalized,
            objects = report.objects_copied,
            "Day folders normalized"
        );
        Ok(report)
    }

    async fn normalize_year(
        &self,
        station: &str,
        camera: &Camera,
        year: &str,
        report: &mut NormalizeReport,
    ) -> Result<(), StoreError> {
        let year_prefix = paths::year_prefix(station, &camera.id, year);
        for child in self.store.list(&year_prefix).await? {
            let Some(day) = child.strip_suffix('/').map(paths::file_name) else {
                continue;
            };
            let canonical = match DayToken::parse(day) {
                Ok(token) => token.to_string(),
                Err(_) => {
                    tracing::debug!(folder = %child, "Not a day folder");
                    report.folders_ignored += 1;
                    continue;
                }
            };
            if canonical == day {
                continue;
            }

            let target = format!("{}{}/", year_prefix, canonical);
            for key in self.list_recursive(&child).await? {
                let relative = &key[child.len()..];
                self.store.copy(&key, &format!("{}{}", target, relative)).await?;
                report.objects_copied += 1;
            }
            report.folders_normalized += 1;

            tracing::info!(from = %child, to = %target, "Day folder normalized");
        }
        Ok(())
    }

    /// Count the raw captures of one day folder by variant
    pub async fn census(
        &self,
        station: &str,
        camera_id: &str,
        year: &str,
        day: &str,
    ) -> MergeResult<VariantCensus> {
        let prefix = paths::raw_prefix(station, camera_id, year, day);
        let mut census = VariantCensus::default();
        for key in self.store.list(&prefix).await? {
            if key.ends_with('/') {
                continue;
            }
            match paths::parse_capture_filename(paths::file_name(&key)) {
                Ok(capture) => {
                    *census.counts.entry(capture.variant.token().to_string()).or_insert(0) += 1;
                }
                Err(_) => census.unparseable += 1,
            }
        }
        Ok(census)
    }

    async fn list_recursive(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut pending = vec![prefix.to_string()];
        let mut objects = Vec::new();
        while let Some(folder) = pending.pop() {
            for child in self.store.list(&folder).await? {
                if child.ends_with('/') {
                    pending.push(child);
                } else {
                    objects.push(child);
                }
            }
        }
        objects.sort();
        Ok(objects)
    }
}

fn station_of_upload(upload_key: &str) -> Result<&str, PathError> {
    upload_key
        .split('/')
        .filter(|s| !s.is_empty())
        .nth(1)
        .ok_or_else(|| PathError::MalformedKey {
            key: upload_key.to_string(),
            reason: "missing station".to_string(),
        })
}
