//! Scope planning
//!
//! A location such as
//! `s3://bucket/cameras/caco-01/c1/2019/347_Dec.13/raw/1576270801.c1.timex.jpg`
//! is classified once, by path depth, into one of four scopes:
//!
//! | segments | scope           |
//! |----------|-----------------|
//! | 4-5      | Station         |
//! | 6        | Year            |
//! | 7-8      | Day             |
//! | 9        | SingleTimestamp |
//!
//! Station and Year scopes are then expanded into day-units from the folders
//! the station's cameras actually have.

use crate::models::{Camera, YearPresence};
use crate::paths::{self, CaptureName, PathError};
use crate::services::camera_registry::CameraRegistry;
use crate::services::day_merger::DayUnit;
use crate::storage::StoreError;
use std::fmt;
use thiserror::Error;

const MIN_SEGMENTS: usize = 4;
const MAX_SEGMENTS: usize = 9;

/// Location rejected before any work starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location '{location}' is too short ({segments} segments, need at least 4)")]
    TooShort { location: String, segments: usize },

    #[error("Location '{location}' is too long ({segments} segments, at most 9)")]
    TooLong { location: String, segments: usize },

    #[error("Location '{0}' must end in a .jpg capture")]
    NotAnImage(String),

    #[error(transparent)]
    MalformedFilename(#[from] PathError),
}

/// Breadth of a merge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    SingleTimestamp {
        station: String,
        year: String,
        day: String,
        timestamp: i64,
    },
    Day(DayUnit),
    Year {
        station: String,
        year: String,
    },
    Station {
        station: String,
    },
}

impl Scope {
    /// Single-timestamp scope of a capture, in its derived day folder
    pub fn for_capture(station: &str, capture: &CaptureName) -> Result<Self, PathError> {
        let partition = paths::derive_day_partition(capture.timestamp)?;
        Ok(Scope::SingleTimestamp {
            station: station.to_string(),
            year: partition.year_folder(),
            day: partition.day_folder(),
            timestamp: capture.timestamp,
        })
    }

    pub fn station(&self) -> &str {
        match self {
            Scope::SingleTimestamp { station, .. }
            | Scope::Year { station, .. }
            | Scope::Station { station } => station,
            Scope::Day(day) => &day.station,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::SingleTimestamp {
                station,
                year,
                day,
                timestamp,
            } => write!(f, "timestamp {}/{}/{}/{}", station, year, day, timestamp),
            Scope::Day(day) => write!(f, "day {}", day),
            Scope::Year { station, year } => write!(f, "year {}/{}", station, year),
            Scope::Station { station } => write!(f, "station {}", station),
        }
    }
}

/// Classify a location string by its segment depth
pub fn classify_location(location: &str) -> Result<Scope, LocationError> {
    let normalized = location.trim().replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() < MIN_SEGMENTS {
        return Err(LocationError::TooShort {
            location: location.to_string(),
            segments: segments.len(),
        });
    }
    if segments.len() > MAX_SEGMENTS {
        return Err(LocationError::TooLong {
            location: location.to_string(),
            segments: segments.len(),
        });
    }

    let station = segments[3].to_string();
    let scope = match segments.len() {
        4 | 5 => Scope::Station { station },
        6 => Scope::Year {
            station,
            year: segments[5].to_string(),
        },
        7 | 8 => Scope::Day(DayUnit::new(station, segments[5], segments[6])),
        _ => {
            let filename = segments[8];
            if !filename.ends_with(".jpg") {
                return Err(LocationError::NotAnImage(location.to_string()));
            }
            let capture = paths::parse_capture_filename(filename)?;
            Scope::SingleTimestamp {
                station,
                year: segments[5].to_string(),
                day: segments[6].to_string(),
                timestamp: capture.timestamp,
            }
        }
    };

    Ok(scope)
}

/// What a scope resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedWork {
    Timestamp { day: DayUnit, timestamp: i64 },
    Days(Vec<DayUnit>),
}

/// Expanded scope plus the camera presence it was planned against
#[derive(Debug, Clone)]
pub struct ScopePlan {
    pub work: PlannedWork,
    pub presence: YearPresence,
}

/// Expand a scope into work using the station's folders
pub async fn plan(
    registry: &CameraRegistry,
    cameras: &[Camera],
    scope: &Scope,
) -> Result<ScopePlan, StoreError> {
    let plan = match scope {
        Scope::SingleTimestamp {
            station,
            year,
            day,
            timestamp,
        } => ScopePlan {
            work: PlannedWork::Timestamp {
                day: DayUnit::new(station.as_str(), year.as_str(), day.as_str()),
                timestamp: *timestamp,
            },
            presence: YearPresence::assume_all(cameras, year),
        },
        Scope::Day(day) => ScopePlan {
            work: PlannedWork::Days(vec![day.clone()]),
            presence: registry.year_presence(cameras).await?,
        },
        Scope::Year { station, year } => {
            let presence = registry.year_presence(cameras).await?;
            let days = expand_year(registry, station, cameras, &presence, year).await?;
            ScopePlan {
                work: PlannedWork::Days(days),
                presence,
            }
        }
        Scope::Station { station } => {
            let presence = registry.year_presence(cameras).await?;
            let mut days = Vec::new();
            for year in registry.list_years(cameras).await? {
                days.extend(expand_year(registry, station, cameras, &presence, &year).await?);
            }
            ScopePlan {
                work: PlannedWork::Days(days),
                presence,
            }
        }
    };

    if let PlannedWork::Days(days) = &plan.work {
        tracing::info!(scope = %scope, day_units = days.len(), "Scope planned");
    }
    Ok(plan)
}

async fn expand_year(
    registry: &CameraRegistry,
    station: &str,
    cameras: &[Camera],
    presence: &YearPresence,
    year: &str,
) -> Result<Vec<DayUnit>, StoreError> {
    Ok(registry
        .list_days(station, cameras, presence, year)
        .await?
        .into_iter()
        .map(|(canonical, folders)| DayUnit::with_folders(station, year, canonical, folders))
        .collect())
}
