//! Test helper utilities
//!
//! Fixture stations, a recording rectifier and a store that fails on demand.

#![allow(dead_code)]

use async_trait::async_trait;
use coastcam_merge::models::{
    CalibrationSet, Camera, CameraRoster, CoordinateSystem, Extrinsics, Intrinsics, LocalOrigin,
    Raster, RegisteredCamera, StationMetadata,
};
use coastcam_merge::paths;
use coastcam_merge::services::{RectificationJob, RectifyError, Rectifier};
use coastcam_merge::storage::{MemoryStore, ObjectStore, StoreError};
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::{Arc, Mutex};

pub const STATION: &str = "caco-01";
pub const YEAR: &str = "2019";
pub const DAY: &str = "347_Dec.13";

/// Two burst-aligned capture times on 2019-12-13
pub const T1: i64 = 1576270800;
pub const T2: i64 = 1576271400;

pub fn calibration(camera_id: &str, seed: f64) -> CalibrationSet {
    CalibrationSet {
        camera_id: camera_id.to_string(),
        extrinsics: Extrinsics {
            x: 410843.97 + seed,
            y: 4655942.49,
            z: 24.36,
            azimuth: 250.0 + seed,
            tilt: 70.0,
            roll: 0.5,
        },
        intrinsics: Intrinsics {
            image_width: 2448.0,
            image_height: 2048.0,
            principal_point_u: 1224.5,
            principal_point_v: 1024.5,
            focal_u: 3000.0 + seed,
            focal_v: 3000.0,
            d1: -0.2,
            d2: 0.1,
            d3: 0.0,
            t1: 0.001,
            t2: -0.001,
        },
    }
}

/// Roster for [`STATION`] with cameras registered in the given order
pub fn roster(camera_ids: &[&str]) -> CameraRoster {
    let cameras = camera_ids
        .iter()
        .enumerate()
        .map(|(i, id)| RegisteredCamera {
            camera: Camera::new(STATION, id),
            calibration: calibration(id, i as f64),
        })
        .collect();

    CameraRoster {
        station: STATION.to_string(),
        cameras,
        metadata: StationMetadata {
            name: "CACO-01".to_string(),
            serial_number: Some("21217396".to_string()),
            camera_number: Some(camera_ids[0].to_string()),
            calibration_date: "2019-12-12".to_string(),
            coordinate_system: CoordinateSystem::Geo,
        },
        local_origin: LocalOrigin {
            x: 410935.0,
            y: 4655890.0,
            angle_degrees: 55.0,
        },
    }
}

/// Raw key of a capture in the fixture day folder
pub fn raw_key(camera_id: &str, timestamp: i64, variant: &str) -> String {
    let camera = camera_id.to_lowercase();
    let filename = format!("{}.{}.{}.jpg", timestamp, camera, variant);
    paths::build_raw_key(STATION, camera_id, YEAR, DAY, &filename)
}

pub fn timex_key(camera_id: &str, timestamp: i64) -> String {
    raw_key(camera_id, timestamp, "timex")
}

/// Store holding a time-exposure frame for every (camera, timestamp) pair
pub fn store_with_timex(captures: &[(&str, i64)]) -> MemoryStore {
    MemoryStore::with_objects(
        captures
            .iter()
            .map(|(camera, ts)| (timex_key(camera, *ts), format!("{}-{}", camera, ts).into_bytes())),
    )
}

/// 2x2 raster: red top row, blue bottom row
pub fn two_row_raster() -> Raster {
    let mut image = RgbImage::new(2, 2);
    for x in 0..2 {
        image.put_pixel(x, 0, Rgb([255, 0, 0]));
        image.put_pixel(x, 1, Rgb([0, 0, 255]));
    }
    Raster::new(DynamicImage::ImageRgb8(image))
}

/// What a rectifier was asked to do
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedJob {
    pub image_refs: Vec<String>,
    pub images: Vec<Vec<u8>>,
    pub intrinsics_focal_u: Vec<f64>,
    pub extrinsics_x: Vec<f64>,
}

/// Rectifier returning [`two_row_raster`] and recording every job
#[derive(Default)]
pub struct RecordingRectifier {
    jobs: Mutex<Vec<RecordedJob>>,
}

impl RecordingRectifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<RecordedJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Rectifier for RecordingRectifier {
    async fn rectify(&self, job: &RectificationJob) -> Result<Raster, RectifyError> {
        job.validate()?;
        self.jobs.lock().unwrap().push(RecordedJob {
            image_refs: job.image_refs.clone(),
            images: job.images.clone(),
            intrinsics_focal_u: job.intrinsics.iter().map(|i| i.focal_u).collect(),
            extrinsics_x: job.extrinsics.iter().map(|e| e.x).collect(),
        });
        Ok(two_row_raster())
    }
}

/// Store whose writes fail for keys containing a marker
pub struct FailingPutStore {
    pub inner: MemoryStore,
    marker: String,
}

impl FailingPutStore {
    pub fn new(inner: MemoryStore, marker: impl Into<String>) -> Self {
        Self {
            inner,
            marker: marker.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for FailingPutStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        if key.contains(&self.marker) {
            return Err(StoreError::io(
                key,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "write refused"),
            ));
        }
        self.inner.put(key, data).await
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        self.inner.copy(src, dst).await
    }
}
