//! Camera calibration parameters
//!
//! Field names on the wire follow the calibration file convention
//! (`a`/`t`/`r` for azimuth/tilt/roll, `NU`/`NV` for image size, ...).

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Camera position and orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Azimuth (degrees)
    #[serde(rename = "a")]
    pub azimuth: f64,
    /// Tilt (degrees)
    #[serde(rename = "t")]
    pub tilt: f64,
    /// Roll (degrees)
    #[serde(rename = "r")]
    pub roll: f64,
}

/// Lens model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    #[serde(rename = "NU")]
    pub image_width: f64,
    #[serde(rename = "NV")]
    pub image_height: f64,
    #[serde(rename = "c0U")]
    pub principal_point_u: f64,
    #[serde(rename = "c0V")]
    pub principal_point_v: f64,
    #[serde(rename = "fx")]
    pub focal_u: f64,
    #[serde(rename = "fy")]
    pub focal_v: f64,
    /// Radial distortion
    pub d1: f64,
    pub d2: f64,
    pub d3: f64,
    /// Tangential distortion
    pub t1: f64,
    pub t2: f64,
}

/// Frame the extrinsics are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CoordinateSystem {
    /// Local grid coordinates
    Xyz,
    /// World coordinates
    Geo,
}

impl FromStr for CoordinateSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xyz" => Ok(CoordinateSystem::Xyz),
            "geo" => Ok(CoordinateSystem::Geo),
            other => Err(format!(
                "Invalid coordinate_system '{}' (expected 'xyz' or 'geo')",
                other
            )),
        }
    }
}

impl TryFrom<String> for CoordinateSystem {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CoordinateSystem> for String {
    fn from(value: CoordinateSystem) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::Xyz => f.write_str("xyz"),
            CoordinateSystem::Geo => f.write_str("geo"),
        }
    }
}

/// Station-wide metadata (taken from the first registered camera)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMetadata {
    /// Station name
    pub name: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub camera_number: Option<String>,
    /// `YYYY-MM-DD`
    pub calibration_date: String,
    pub coordinate_system: CoordinateSystem,
}

/// Origin and rotation of the local grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalOrigin {
    pub x: f64,
    pub y: f64,
    /// Grid rotation (degrees)
    #[serde(rename = "angd")]
    pub angle_degrees: f64,
}

/// Per-camera calibration
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSet {
    pub camera_id: String,
    pub extrinsics: Extrinsics,
    pub intrinsics: Intrinsics,
}

/// Shared per-station calibration
#[derive(Debug, Clone, PartialEq)]
pub struct StationCalibration {
    pub metadata: StationMetadata,
    pub local_origin: LocalOrigin,
}

/// Accept serial/camera numbers written either as text or as bare numbers
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(s) => s,
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_system_parsing() {
        assert_eq!("xyz".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Xyz));
        assert_eq!("GEO".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Geo));
        assert!("utm".parse::<CoordinateSystem>().is_err());
    }

    #[test]
    fn test_metadata_json_round_trip_uses_file_names() {
        let metadata = StationMetadata {
            name: "CACO-01".to_string(),
            serial_number: Some("21217396".to_string()),
            camera_number: Some("C1".to_string()),
            calibration_date: "2019-12-12".to_string(),
            coordinate_system: CoordinateSystem::Geo,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["coordinate_system"], "geo");

        let origin = LocalOrigin {
            x: 410935.0,
            y: 4655890.0,
            angle_degrees: 55.0,
        };
        let json = serde_json::to_value(origin).unwrap();
        assert_eq!(json["angd"], 55.0);
    }

    #[test]
    fn test_metadata_accepts_numeric_serial() {
        let metadata: StationMetadata = serde_json::from_str(
            r#"{"name":"CACO-01","serial_number":21217396,"camera_number":"C1",
                "calibration_date":"2019-12-12","coordinate_system":"xyz"}"#,
        )
        .unwrap();
        assert_eq!(metadata.serial_number.as_deref(), Some("21217396"));
        assert_eq!(metadata.coordinate_system, CoordinateSystem::Xyz);
    }

    #[test]
    fn test_metadata_rejects_unknown_coordinate_system() {
        let result: Result<StationMetadata, _> = serde_json::from_str(
            r#"{"name":"CACO-01","calibration_date":"2019-12-12","coordinate_system":"utm"}"#,
        );
        assert!(result.is_err());
    }
}
