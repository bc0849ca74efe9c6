//! Utility modules

pub mod retry;

pub use retry::{retry_transient, RetryPolicy};
