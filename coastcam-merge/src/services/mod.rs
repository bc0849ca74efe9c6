//! Merge pipeline services

pub mod batch_runner;
pub mod calibration_loader;
pub mod calibration_selector;
pub mod camera_registry;
pub mod day_merger;
pub mod merge_dispatcher;
pub mod rectifier_client;
pub mod scope_planner;
pub mod timestamp_aligner;
pub mod upload_ingestor;

pub use batch_runner::{run_days, run_timestamp, RunSummary};
pub use calibration_loader::{CalibrationSource, DatabaseSource, StoreYamlSource, YamlDirSource};
pub use calibration_selector::{select_calibration, CalibrationSubset};
pub use camera_registry::{build_roster, cameras_from_database, CameraRegistry};
pub use day_merger::{DayMerger, DayOutcome, DayUnit, UnitFailure};
pub use merge_dispatcher::{MergeDispatcher, PersistedMerge};
pub use rectifier_client::{CommandRectifier, RectificationJob, RectifyError, Rectifier};
pub use scope_planner::{classify_location, plan, LocationError, PlannedWork, Scope, ScopePlan};
pub use timestamp_aligner::align;
pub use upload_ingestor::{IngestedCapture, NormalizeReport, UploadIngestor, VariantCensus};
