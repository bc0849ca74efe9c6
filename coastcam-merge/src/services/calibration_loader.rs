//! Calibration sources
//!
//! Calibration comes either from YAML files (a local directory, or the
//! `cameras/parameters/{station}/` folder of the object store) or from the
//! calibration database. Both look the same to the rest of the pipeline.
//!
//! YAML layout per station, upper-case names:
//! - `{STATION}_{CAM}_extr.yaml`
//! - `{STATION}_{CAM}_intr.yaml`
//! - `{STATION}_{CAM}_metadata.yaml`
//! - `{STATION}_localOrigin.yaml`

use crate::db;
use crate::models::{CalibrationSet, Extrinsics, Intrinsics, LocalOrigin, StationCalibration, StationMetadata};
use crate::paths::KEY_ROOT;
use crate::storage::{ObjectStore, StoreError};
use async_trait::async_trait;
use coastcam_common::{Error, Result};
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

/// Source of camera calibration
#[async_trait]
pub trait CalibrationSource: Send + Sync {
    /// Extrinsics and intrinsics of one camera
    async fn load_calibration(&self, station: &str, camera_id: &str) -> Result<CalibrationSet>;

    /// Station metadata and local origin, read through `camera_id`'s records
    async fn load_station(&self, station: &str, camera_id: &str) -> Result<StationCalibration>;
}

/// Calibration file names for one camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationFileNames {
    pub extrinsics: String,
    pub intrinsics: String,
    pub metadata: String,
    pub local_origin: String,
}

impl CalibrationFileNames {
    pub fn new(station: &str, camera_id: &str) -> Self {
        let station = station.to_uppercase();
        let camera = camera_id.to_uppercase();
        Self {
            extrinsics: format!("{}_{}_extr.yaml", station, camera),
            intrinsics: format!("{}_{}_intr.yaml", station, camera),
            metadata: format!("{}_{}_metadata.yaml", station, camera),
            local_origin: format!("{}_localOrigin.yaml", station),
        }
    }
}

/// Parse one calibration YAML document
pub fn parse_yaml<T: DeserializeOwned + 'static>(name: &str, text: &str) -> Result<T> {
    serde_yml::from_str(text).map_err(|e| Error::Config(format!("{}: {}", name, e)))
}

/// Reads calibration files through a loader
async fn load_set<F, Fut>(station: &str, camera_id: &str, read: F) -> Result<CalibrationSet>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<String>>,
{
    let names = CalibrationFileNames::new(station, camera_id);
    let extrinsics: Extrinsics = parse_yaml(&names.extrinsics, &read(names.extrinsics.clone()).await?)?;
    let intrinsics: Intrinsics = parse_yaml(&names.intrinsics, &read(names.intrinsics.clone()).await?)?;
    Ok(CalibrationSet {
        camera_id: camera_id.to_uppercase(),
        extrinsics,
        intrinsics,
    })
}

async fn load_station_files<F, Fut>(station: &str, camera_id: &str, read: F) -> Result<StationCalibration>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<String>>,
{
    let names = CalibrationFileNames::new(station, camera_id);
    let metadata: StationMetadata = parse_yaml(&names.metadata, &read(names.metadata.clone()).await?)?;
    let local_origin: LocalOrigin =
        parse_yaml(&names.local_origin, &read(names.local_origin.clone()).await?)?;
    Ok(StationCalibration {
        metadata,
        local_origin,
    })
}

/// YAML files in a local directory
#[derive(Debug, Clone)]
pub struct YamlDirSource {
    dir: PathBuf,
}

impl YamlDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read(&self, name: String) -> Result<String> {
        let path = self.dir.join(&name);
        tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("Calibration file {}", path.display()))
            }
            _ => Error::Io(e),
        })
    }
}

#[async_trait]
impl CalibrationSource for YamlDirSource {
    async fn load_calibration(&self, station: &str, camera_id: &str) -> Result<CalibrationSet> {
        load_set(station, camera_id, |name| self.read(name)).await
    }

    async fn load_station(&self, station: &str, camera_id: &str) -> Result<StationCalibration> {
        load_station_files(station, camera_id, |name| self.read(name)).await
    }
}

/// YAML files under `cameras/parameters/{station}/` in the object store
pub struct StoreYamlSource {
    store: Arc<dyn ObjectStore>,
}

impl StoreYamlSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn parameters_prefix(station: &str) -> String {
        format!("{}/parameters/{}/", KEY_ROOT, station)
    }

    async fn read(&self, station: &str, name: String) -> Result<String> {
        let key = format!("{}{}", Self::parameters_prefix(station), name);
        let bytes = self.store.get(&key).await.map_err(|e| match e {
            StoreError::NotFound(key) => Error::NotFound(format!("Calibration object {}", key)),
            other => Error::Internal(other.to_string()),
        })?;
        String::from_utf8(bytes).map_err(|e| Error::Config(format!("{}: {}", key, e)))
    }
}

#[async_trait]
impl CalibrationSource for StoreYamlSource {
    async fn load_calibration(&self, station: &str, camera_id: &str) -> Result<CalibrationSet> {
        load_set(station, camera_id, |name| self.read(station, name)).await
    }

    async fn load_station(&self, station: &str, camera_id: &str) -> Result<StationCalibration> {
        load_station_files(station, camera_id, |name| self.read(station, name)).await
    }
}

/// The calibration database's `camera` table
#[derive(Debug, Clone)]
pub struct DatabaseSource {
    pool: SqlitePool,
}

impl DatabaseSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn record(&self, station: &str, camera_id: &str) -> Result<db::cameras::CameraRecord> {
        db::cameras::load_camera(&self.pool, station, camera_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("Calibration row for {} {}", station, camera_id))
            })
    }
}

#[async_trait]
impl CalibrationSource for DatabaseSource {
    async fn load_calibration(&self, station: &str, camera_id: &str) -> Result<CalibrationSet> {
        Ok(self.record(station, camera_id).await?.calibration())
    }

    async fn load_station(&self, station: &str, camera_id: &str) -> Result<StationCalibration> {
        Ok(self.record(station, camera_id).await?.station_calibration())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::CoordinateSystem;
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    pub(crate) const EXTR_C1: &str = "x: 410843.97\ny: 4655942.49\nz: 24.36\na: 250.5\nt: 70.2\nr: 0.5\n";
    pub(crate) const INTR_C1: &str = "NU: 2448\nNV: 2048\nc0U: 1224.5\nc0V: 1024.5\nfx: 3000.1\nfy: 3000.2\n\
d1: -0.2\nd2: 0.1\nd3: 0.0\nt1: 0.001\nt2: -0.001\n";
    pub(crate) const METADATA: &str = "name: CACO-01\nserial_number: 21217396\ncamera_number: C1\n\
calibration_date: '2019-12-12'\ncoordinate_system: geo\n";
    pub(crate) const LOCAL_ORIGIN: &str = "x: 410935.0\ny: 4655890.0\nangd: 55\n";

    #[test]
    fn test_file_names_are_upper_case() {
        let names = CalibrationFileNames::new("caco-01", "c1");
        assert_eq!(names.extrinsics, "CACO-01_C1_extr.yaml");
        assert_eq!(names.intrinsics, "CACO-01_C1_intr.yaml");
        assert_eq!(names.metadata, "CACO-01_C1_metadata.yaml");
        assert_eq!(names.local_origin, "CACO-01_localOrigin.yaml");
    }

    #[tokio::test]
    async fn test_yaml_dir_source() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("CACO-01_C1_extr.yaml"), EXTR_C1).unwrap();
        std::fs::write(temp_dir.path().join("CACO-01_C1_intr.yaml"), INTR_C1).unwrap();
        std::fs::write(temp_dir.path().join("CACO-01_C1_metadata.yaml"), METADATA).unwrap();
        std::fs::write(temp_dir.path().join("CACO-01_localOrigin.yaml"), LOCAL_ORIGIN).unwrap();

        let source = YamlDirSource::new(temp_dir.path());
        let set = source.load_calibration("caco-01", "C1").await.unwrap();
        assert_eq!(set.camera_id, "C1");
        assert_eq!(set.extrinsics.azimuth, 250.5);
        assert_eq!(set.intrinsics.image_width, 2448.0);
        assert_eq!(set.intrinsics.focal_v, 3000.2);

        let station = source.load_station("caco-01", "C1").await.unwrap();
        assert_eq!(station.metadata.coordinate_system, CoordinateSystem::Geo);
        assert_eq!(station.metadata.serial_number.as_deref(), Some("21217396"));
        assert_eq!(station.local_origin.angle_degrees, 55.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let source = YamlDirSource::new(temp_dir.path());
        assert!(matches!(
            source.load_calibration("caco-01", "C2").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_coordinate_system_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("CACO-01_C1_metadata.yaml"),
            METADATA.replace("geo", "utm"),
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("CACO-01_localOrigin.yaml"), LOCAL_ORIGIN).unwrap();

        let source = YamlDirSource::new(temp_dir.path());
        match source.load_station("caco-01", "C1").await {
            Err(Error::Config(message)) => assert!(message.contains("CACO-01_C1_metadata.yaml")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_yaml_source() {
        let prefix = StoreYamlSource::parameters_prefix("caco-01");
        let store = MemoryStore::with_objects([
            (format!("{}CACO-01_C1_extr.yaml", prefix), EXTR_C1.as_bytes().to_vec()),
            (format!("{}CACO-01_C1_intr.yaml", prefix), INTR_C1.as_bytes().to_vec()),
            (format!("{}CACO-01_C1_metadata.yaml", prefix), METADATA.as_bytes().to_vec()),
            (format!("{}CACO-01_localOrigin.yaml", prefix), LOCAL_ORIGIN.as_bytes().to_vec()),
        ]);

        let source = StoreYamlSource::new(Arc::new(store));
        let set = source.load_calibration("caco-01", "c1").await.unwrap();
        assert_eq!(set.extrinsics.x, 410843.97);
        let station = source.load_station("caco-01", "c1").await.unwrap();
        assert_eq!(station.metadata.name, "CACO-01");
    }

    #[tokio::test]
    async fn test_database_source() {
        let pool = crate::db::cameras::tests::setup_test_db().await;
        let record = crate::db::cameras::tests::record("caco-01", "C1", 1.0);
        crate::db::cameras::save_camera(&pool, &record).await.unwrap();

        let source = DatabaseSource::new(pool);
        let set = source.load_calibration("caco-01", "C1").await.unwrap();
        assert_eq!(set.intrinsics, record.intrinsics);
        assert!(matches!(
            source.load_calibration("caco-01", "C5").await,
            Err(Error::NotFound(_))
        ));
    }
}
