//! Camera registry
//!
//! Enumerates a station's cameras, loads their calibration into a
//! [`CameraRoster`], and answers which years and days each camera has data for.

use crate::db;
use crate::error::MergeResult;
use crate::models::{Camera, CameraRoster, RegisteredCamera, YearPresence};
use crate::paths::{self, DayToken};
use crate::services::calibration_loader::CalibrationSource;
use crate::storage::{ObjectStore, StoreError};
use coastcam_common::Error;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Store-backed view of a station's cameras
pub struct CameraRegistry {
    store: Arc<dyn ObjectStore>,
}

impl CameraRegistry {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Cameras with a folder under the station, in sorted folder order
    pub async fn discover_cameras(&self, station: &str) -> Result<Vec<Camera>, StoreError> {
        let children = self.store.list(&paths::station_prefix(station)).await?;
        let cameras: Vec<Camera> = children
            .iter()
            .filter_map(|child| folder_name(child))
            .filter_map(|folder| Camera::from_folder(station, folder))
            .collect();

        tracing::debug!(
            station = %station,
            cameras = ?cameras.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "Discovered cameras"
        );
        Ok(cameras)
    }

    /// Year folders each camera has
    pub async fn year_presence(&self, cameras: &[Camera]) -> Result<YearPresence, StoreError> {
        let mut presence = YearPresence::new();
        for camera in cameras {
            for year in self.year_folders(camera).await? {
                presence.insert(&camera.id, &year);
            }
        }
        Ok(presence)
    }

    /// Union of all cameras' year folders, sorted
    pub async fn list_years(&self, cameras: &[Camera]) -> Result<Vec<String>, StoreError> {
        let mut years = BTreeSet::new();
        for camera in cameras {
            years.extend(self.year_folders(camera).await?);
        }
        Ok(years.into_iter().collect())
    }

    /// Day folders of every camera present in `year`, grouped by canonical day token
    ///
    /// Legacy unpadded folders (`5_Jan.05`) land under their canonical day
    /// (`005_Jan.05`) so a day is never planned twice.
    pub async fn list_days(
        &self,
        station: &str,
        cameras: &[Camera],
        presence: &YearPresence,
        year: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, StoreError> {
        let year_number: Option<i32> = year.parse().ok();
        let mut days: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for camera in presence.cameras_in(cameras, year) {
            let children = self
                .store
                .list(&paths::year_prefix(station, &camera.id, year))
                .await?;
            for day in children.iter().filter_map(|c| folder_name(c)) {
                let parsed = DayToken::parse(day).and_then(|token| match year_number {
                    Some(y) => token.to_date(y).map(|_| token),
                    None => Ok(token),
                });
                match parsed {
                    Ok(token) => {
                        days.entry(token.to_string())
                            .or_default()
                            .insert(day.to_string());
                    }
                    Err(e) => {
                        tracing::warn!(
                            camera = %camera.id,
                            year = %year,
                            folder = %day,
                            error = %e,
                            "Ignoring folder that is not a day token"
                        );
                    }
                }
            }
        }
        Ok(days)
    }

    async fn year_folders(&self, camera: &Camera) -> Result<Vec<String>, StoreError> {
        let children = self.store.list(&camera.storage_prefix).await?;
        Ok(children
            .iter()
            .filter_map(|c| folder_name(c))
            .filter(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
            .map(str::to_string)
            .collect())
    }
}

/// Cameras registered for a station in the calibration database
pub async fn cameras_from_database(pool: &SqlitePool, station: &str) -> MergeResult<Vec<Camera>> {
    let numbers = db::cameras::station_camera_numbers(pool, station).await?;
    Ok(numbers.iter().map(|n| Camera::new(station, n)).collect())
}

/// Load calibration for every camera and build the roster
///
/// Station metadata and local origin come from the first registered camera.
pub async fn build_roster(
    station: &str,
    cameras: &[Camera],
    source: &dyn CalibrationSource,
) -> MergeResult<CameraRoster> {
    let first = cameras
        .first()
        .ok_or_else(|| Error::NotFound(format!("No cameras registered for station {}", station)))?;

    let mut registered = Vec::with_capacity(cameras.len());
    for camera in cameras {
        if registered
            .iter()
            .any(|r: &RegisteredCamera| r.camera.id == camera.id)
        {
            tracing::warn!(camera = %camera.id, "Camera registered twice, keeping first");
            continue;
        }
        let calibration = source.load_calibration(station, &camera.id).await?;
        registered.push(RegisteredCamera {
            camera: camera.clone(),
            calibration,
        });
    }

    let station_calibration = source.load_station(station, &first.id).await?;

    tracing::info!(
        station = %station,
        cameras = registered.len(),
        coordinate_system = %station_calibration.metadata.coordinate_system,
        "Camera roster loaded"
    );

    Ok(CameraRoster {
        station: station.to_string(),
        cameras: registered,
        metadata: station_calibration.metadata,
        local_origin: station_calibration.local_origin,
    })
}

/// Last segment of a folder listing entry, `None` for objects
fn folder_name(child: &str) -> Option<&str> {
    child
        .strip_suffix('/')
        .map(|folder| folder.rsplit('/').next().unwrap_or(folder))
}
