//! # CoastCam Common Library
//!
//! Shared code for the CoastCam imagery tools:
//! - Error type
//! - Configuration model and file resolution
//! - Capture timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
