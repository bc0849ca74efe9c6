//! Camera calibration rows

use crate::models::{
    CalibrationSet, CoordinateSystem, Extrinsics, Intrinsics, LocalOrigin, StationCalibration,
    StationMetadata,
};
use coastcam_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

/// One `camera` row
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRecord {
    pub station_name: String,
    pub camera_number: String,
    pub serial_number: Option<String>,
    pub calibration_date: String,
    pub coordinate_system: CoordinateSystem,
    pub extrinsics: Extrinsics,
    pub intrinsics: Intrinsics,
    pub local_origin: LocalOrigin,
}

impl CameraRecord {
    pub fn calibration(&self) -> CalibrationSet {
        CalibrationSet {
            camera_id: self.camera_number.clone(),
            extrinsics: self.extrinsics,
            intrinsics: self.intrinsics,
        }
    }

    pub fn station_calibration(&self) -> StationCalibration {
        StationCalibration {
            metadata: StationMetadata {
                name: self.station_name.clone(),
                serial_number: self.serial_number.clone(),
                camera_number: Some(self.camera_number.clone()),
                calibration_date: self.calibration_date.clone(),
                coordinate_system: self.coordinate_system,
            },
            local_origin: self.local_origin,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let coordinate_system: String = row.try_get("coordinate_system")?;
        let coordinate_system = coordinate_system
            .parse::<CoordinateSystem>()
            .map_err(Error::Config)?;

        Ok(Self {
            station_name: row.try_get("station_name")?,
            camera_number: row.try_get("camera_number")?,
            serial_number: row.try_get("serial_number")?,
            calibration_date: row.try_get("calibration_date")?,
            coordinate_system,
            extrinsics: Extrinsics {
                x: row.try_get("x")?,
                y: row.try_get("y")?,
                z: row.try_get("z")?,
                azimuth: row.try_get("a")?,
                tilt: row.try_get("t")?,
                roll: row.try_get("r")?,
            },
            intrinsics: Intrinsics {
                image_width: row.try_get("NU")?,
                image_height: row.try_get("NV")?,
                principal_point_u: row.try_get("c0U")?,
                principal_point_v: row.try_get("c0V")?,
                focal_u: row.try_get("fx")?,
                focal_v: row.try_get("fy")?,
                d1: row.try_get("d1")?,
                d2: row.try_get("d2")?,
                d3: row.try_get("d3")?,
                t1: row.try_get("t1")?,
                t2: row.try_get("t2")?,
            },
            local_origin: LocalOrigin {
                x: row.try_get("x_origin")?,
                y: row.try_get("y_origin")?,
                angle_degrees: row.try_get("angd")?,
            },
        })
    }
}

/// Load the calibration row of one camera
pub async fn load_camera(
    db: &Pool<Sqlite>,
    station: &str,
    camera_number: &str,
) -> Result<Option<CameraRecord>> {
    let row = sqlx::query(
        "SELECT * FROM camera \
         WHERE station_name = ? COLLATE NOCASE AND camera_number = ? COLLATE NOCASE",
    )
    .bind(station)
    .bind(camera_number)
    .fetch_optional(db)
    .await?;

    row.as_ref().map(CameraRecord::from_row).transpose()
}

/// Camera numbers registered for a station, in registration order
///
/// Ordered by the numeric part of the camera number, so `C10` follows `C2`.
pub async fn station_camera_numbers(db: &Pool<Sqlite>, station: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT camera_number FROM camera WHERE station_name = ? COLLATE NOCASE \
         ORDER BY CAST(LTRIM(camera_number, 'cC') AS INTEGER), camera_number",
    )
    .bind(station)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|(n,)| n).collect())
}

/// Insert or replace a camera row
pub async fn save_camera(db: &Pool<Sqlite>, record: &CameraRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO camera (
            station_name, camera_number, serial_number, calibration_date, coordinate_system,
            x, y, z, a, t, r,
            NU, NV, c0U, c0V, fx, fy, d1, d2, d3, t1, t2,
            x_origin, y_origin, angd
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.station_name)
    .bind(&record.camera_number)
    .bind(&record.serial_number)
    .bind(&record.calibration_date)
    .bind(record.coordinate_system.to_string())
    .bind(record.extrinsics.x)
    .bind(record.extrinsics.y)
    .bind(record.extrinsics.z)
    .bind(record.extrinsics.azimuth)
    .bind(record.extrinsics.tilt)
    .bind(record.extrinsics.roll)
    .bind(record.intrinsics.image_width)
    .bind(record.intrinsics.image_height)
    .bind(record.intrinsics.principal_point_u)
    .bind(record.intrinsics.principal_point_v)
    .bind(record.intrinsics.focal_u)
    .bind(record.intrinsics.focal_v)
    .bind(record.intrinsics.d1)
    .bind(record.intrinsics.d2)
    .bind(record.intrinsics.d3)
    .bind(record.intrinsics.t1)
    .bind(record.intrinsics.t2)
    .bind(record.local_origin.x)
    .bind(record.local_origin.y)
    .bind(record.local_origin.angle_degrees)
    .execute(db)
    .await?;

    Ok(())
}
