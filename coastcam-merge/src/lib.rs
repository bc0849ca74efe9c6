//! coastcam-merge library interface
//!
//! Aligns per-camera time-exposure captures of a CoastCam station by
//! timestamp and merges each timestamp into one rectified image.

pub mod db;
pub mod error;
pub mod models;
pub mod paths;
pub mod services;
pub mod storage;
pub mod utils;

pub use crate::error::{MergeError, MergeResult};
