//! Storage key and capture filename conventions
//!
//! Raw captures live at
//! `cameras/{station}/{camera}/{year}/{day}/raw/{timestamp}.{camera}.{variant}.{ext}`
//! and merged products at
//! `cameras/{station}/cx/merge/{year}/{day}/{timestamp}.timex.merge.{ext}`,
//! where `{day}` is the day token `"{day-of-year:03}_{Mon}.{day-of-month:02}"`.
//! Uploads arrive flat at `cameras/{station}/products/{file}` and are re-keyed
//! into the day-partitioned layout.
//!
//! Everything here is pure string/calendar work with no I/O.

use chrono::{Datelike, NaiveDate};
use coastcam_common::time::capture_instant;
use std::fmt;
use thiserror::Error;

/// Top-level prefix of every CoastCam key
pub const KEY_ROOT: &str = "cameras";

/// Folder holding raw frames inside a day folder
pub const RAW_FOLDER: &str = "raw";

/// Flat upload folder inside a station
pub const UPLOAD_FOLDER: &str = "products";

/// Station-level pseudo camera holding merged products
pub const MERGE_NAMESPACE: &str = "cx/merge";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const IMAGE_EXTENSIONS: [&str; 13] = [
    "tif", "tiff", "bmp", "jpg", "jpeg", "gif", "png", "eps", "raw", "cr2", "nef", "orf", "sr2",
];

/// Path convention errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Capture filename does not follow `{timestamp}.{camera}.{variant}.{ext}`
    #[error("Malformed capture filename '{name}': {reason}")]
    MalformedFilename { name: String, reason: String },

    /// Day folder name does not follow `{doy}_{Mon}.{dd}`
    #[error("Malformed day token '{0}'")]
    MalformedDayToken(String),

    /// Timestamp outside the representable calendar range
    #[error("Timestamp {0} cannot be represented as a calendar date")]
    TimestampOutOfRange(i64),

    /// File extension is not a known image type
    #[error("Not an image file: {0}")]
    NotAnImage(String),

    /// Key does not have the expected segment layout
    #[error("Malformed storage key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },
}

/// Kind of frame a station camera produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CaptureVariant {
    /// Long-exposure average; the only variant that is merged
    TimeExposure,
    Snapshot,
    Brightness,
    DarkFrame,
    RunningDark,
    Variance,
}

impl CaptureVariant {
    pub const ALL: [CaptureVariant; 6] = [
        CaptureVariant::TimeExposure,
        CaptureVariant::Snapshot,
        CaptureVariant::Brightness,
        CaptureVariant::DarkFrame,
        CaptureVariant::RunningDark,
        CaptureVariant::Variance,
    ];

    /// Token used in filenames
    pub fn token(&self) -> &'static str {
        match self {
            CaptureVariant::TimeExposure => "timex",
            CaptureVariant::Snapshot => "snap",
            CaptureVariant::Brightness => "bright",
            CaptureVariant::DarkFrame => "dark",
            CaptureVariant::RunningDark => "rundark",
            CaptureVariant::Variance => "var",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.token() == token)
    }
}

impl fmt::Display for CaptureVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Parsed `{timestamp}.{camera}.{variant}.{ext}` filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureName {
    /// Epoch seconds, including the burst digit
    pub timestamp: i64,
    /// Camera field as written in the filename (e.g. `c1`)
    pub camera: String,
    pub variant: CaptureVariant,
    pub ext: String,
}

impl CaptureName {
    /// Camera id in roster form (`c1` → `C1`)
    pub fn camera_id(&self) -> String {
        self.camera.to_uppercase()
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}.{}.{}", self.timestamp, self.camera, self.variant, self.ext)
    }
}

/// Split a capture filename into its four dot-delimited fields
pub fn parse_capture_filename(name: &str) -> Result<CaptureName, PathError> {
    let malformed = |reason: &str| PathError::MalformedFilename {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = name.split('.').collect();
    if fields.len() != 4 {
        return Err(malformed(&format!(
            "expected 4 dot-delimited fields, found {}",
            fields.len()
        )));
    }

    let (timestamp, camera, variant, ext) = (fields[0], fields[1], fields[2], fields[3]);

    if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("timestamp is not a decimal integer"));
    }
    // Two spellings of one instant would collide in the coverage table
    if timestamp.len() > 1 && timestamp.starts_with('0') {
        return Err(malformed("timestamp has leading zeros"));
    }
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| malformed("timestamp does not fit in 64 bits"))?;

    if camera.is_empty() {
        return Err(malformed("empty camera field"));
    }
    if ext.is_empty() {
        return Err(malformed("empty extension"));
    }

    let variant = CaptureVariant::from_token(variant)
        .ok_or_else(|| malformed(&format!("unknown capture variant '{}'", variant)))?;

    Ok(CaptureName {
        timestamp,
        camera: camera.to_string(),
        variant,
        ext: ext.to_string(),
    })
}

/// Day folder name, e.g. `347_Dec.13`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayToken {
    pub day_of_year: u32,
    /// 1-based month
    pub month: u32,
    pub day_of_month: u32,
}

impl DayToken {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day_of_year: date.ordinal(),
            month: date.month(),
            day_of_month: date.day(),
        }
    }

    /// Parse a day token, accepting an unpadded day-of-year or day-of-month
    pub fn parse(token: &str) -> Result<Self, PathError> {
        let malformed = || PathError::MalformedDayToken(token.to_string());

        let (doy, rest) = token.split_once('_').ok_or_else(malformed)?;
        let (month, dom) = rest.split_once('.').ok_or_else(malformed)?;

        let day_of_year = parse_bounded(doy, 3, 1, 366).ok_or_else(malformed)?;
        let day_of_month = parse_bounded(dom, 2, 1, 31).ok_or_else(malformed)?;
        let month = MONTH_ABBREVIATIONS
            .iter()
            .position(|m| *m == month)
            .map(|idx| idx as u32 + 1)
            .ok_or_else(malformed)?;

        Ok(Self {
            day_of_year,
            month,
            day_of_month,
        })
    }

    pub fn month_abbrev(&self) -> &'static str {
        MONTH_ABBREVIATIONS[(self.month as usize).saturating_sub(1).min(11)]
    }

    /// Resolve against a year; fails if the three fields disagree
    pub fn to_date(&self, year: i32) -> Result<NaiveDate, PathError> {
        NaiveDate::from_yo_opt(year, self.day_of_year)
            .filter(|date| date.month() == self.month && date.day() == self.day_of_month)
            .ok_or_else(|| PathError::MalformedDayToken(self.to_string()))
    }
}

impl fmt::Display for DayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}_{}.{:02}",
            self.day_of_year,
            self.month_abbrev(),
            self.day_of_month
        )
    }
}

fn parse_bounded(digits: &str, max_len: usize, min: u32, max: u32) -> Option<u32> {
    if digits.is_empty() || digits.len() > max_len || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|v| (min..=max).contains(v))
}

/// Year and day folder of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayPartition {
    pub year: i32,
    pub day: DayToken,
}

impl DayPartition {
    pub fn year_folder(&self) -> String {
        self.year.to_string()
    }

    pub fn day_folder(&self) -> String {
        self.day.to_string()
    }
}

/// Derive the UTC year/day folders of a capture timestamp
pub fn derive_day_partition(timestamp: i64) -> Result<DayPartition, PathError> {
    let instant = capture_instant(timestamp).ok_or(PathError::TimestampOutOfRange(timestamp))?;
    let date = instant.date_naive();
    Ok(DayPartition {
        year: date.year(),
        day: DayToken::from_date(date),
    })
}

/// Zero-pad a day token into canonical form (`5_Jan.5` → `005_Jan.05`)
pub fn normalize_day_token(token: &str) -> Result<String, PathError> {
    DayToken::parse(token).map(|t| t.to_string())
}

/// Last `/`-separated segment of a key
pub fn file_name(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}

/// Whether the filename carries a known image extension
pub fn is_image_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Folder name of a camera id (`C1` → `c1`)
pub fn camera_folder(camera_id: &str) -> String {
    camera_id.to_lowercase()
}

pub fn station_prefix(station: &str) -> String {
    format!("{}/{}/", KEY_ROOT, station)
}

pub fn camera_prefix(station: &str, camera_id: &str) -> String {
    format!("{}{}/", station_prefix(station), camera_folder(camera_id))
}

pub fn year_prefix(station: &str, camera_id: &str, year: &str) -> String {
    format!("{}{}/", camera_prefix(station, camera_id), year)
}

pub fn raw_prefix(station: &str, camera_id: &str, year: &str, day: &str) -> String {
    format!("{}{}/{}/", year_prefix(station, camera_id, year), day, RAW_FOLDER)
}

/// Canonical key of a raw capture
pub fn build_raw_key(station: &str, camera_id: &str, year: &str, day: &str, filename: &str) -> String {
    format!("{}{}", raw_prefix(station, camera_id, year, day), filename)
}

/// Filename of a merged product
pub fn merge_filename(timestamp: i64, ext: &str) -> String {
    format!("{}.timex.merge.{}", timestamp, ext)
}

/// Canonical key of a merged product
pub fn build_merge_key(station: &str, year: &str, day: &str, timestamp: i64, ext: &str) -> String {
    format!(
        "{}{}/{}/{}/{}",
        station_prefix(station),
        MERGE_NAMESPACE,
        year,
        day,
        merge_filename(timestamp, ext)
    )
}

/// Flat upload key of a capture
pub fn build_upload_key(station: &str, filename: &str) -> String {
    format!("{}{}/{}", station_prefix(station), UPLOAD_FOLDER, filename)
}

/// Map a flat upload key to its day-partitioned raw key
///
/// Returns the parsed filename alongside the new key.
pub fn raw_key_for_upload(upload_key: &str) -> Result<(String, CaptureName), PathError> {
    let segments: Vec<&str> = upload_key.split('/').filter(|s| !s.is_empty()).collect();
    let (station, filename) = match segments.as_slice() {
        [root, station, folder, filename] if *root == KEY_ROOT && *folder == UPLOAD_FOLDER => {
            (*station, *filename)
        }
        _ => {
            return Err(PathError::MalformedKey {
                key: upload_key.to_string(),
                reason: "expected cameras/{station}/products/{file}".to_string(),
            })
        }
    };

    if !is_image_file(filename) {
        return Err(PathError::NotAnImage(filename.to_string()));
    }

    let capture = parse_capture_filename(filename)?;
    let partition = derive_day_partition(capture.timestamp)?;
    let key = build_raw_key(
        station,
        &capture.camera,
        &partition.year_folder(),
        &partition.day_folder(),
        filename,
    );
    Ok((key, capture))
}
