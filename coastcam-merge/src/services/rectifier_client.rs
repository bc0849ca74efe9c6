//! Rectifier client
//!
//! Projects the time-exposure images of one timestamp onto the station's
//! local grid. [`CommandRectifier`] delegates to an external program: it
//! stages the images and a JSON job description in a scratch directory, runs
//! `{program} {args...} job.json output.png` on a blocking thread and decodes
//! the raster the program wrote.

use crate::models::{Extrinsics, Intrinsics, LocalOrigin, Raster, StationMetadata};
use crate::paths;
use async_trait::async_trait;
use coastcam_common::config::{RectifierConfig, TargetGrid};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Rectifier errors
#[derive(Debug, Error)]
pub enum RectifyError {
    /// Job lists are empty or of unequal length
    #[error("Invalid rectification job: {0}")]
    InvalidJob(String),

    /// Rectifier program not found in PATH
    #[error("Rectifier program not found: {0}")]
    ProgramNotFound(String),

    /// Failed to start or join the rectifier
    #[error("Failed to execute rectifier: {0}")]
    Execution(String),

    /// Rectifier exited unsuccessfully
    #[error("Rectifier failed: {0}")]
    Failed(String),

    /// Output raster unreadable
    #[error("Failed to decode rectifier output: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs for one rectification; all per-image lists are position-aligned
#[derive(Debug, Clone)]
pub struct RectificationJob {
    pub metadata: StationMetadata,
    pub image_refs: Vec<String>,
    /// Encoded image bytes, `images[i]` read from `image_refs[i]`
    pub images: Vec<Vec<u8>>,
    pub intrinsics: Vec<Intrinsics>,
    pub extrinsics: Vec<Extrinsics>,
    pub local_origin: LocalOrigin,
    pub grid: TargetGrid,
}

impl RectificationJob {
    pub fn validate(&self) -> Result<(), RectifyError> {
        let n = self.image_refs.len();
        if n == 0 {
            return Err(RectifyError::InvalidJob("no images supplied".to_string()));
        }
        if self.images.len() != n || self.intrinsics.len() != n || self.extrinsics.len() != n {
            return Err(RectifyError::InvalidJob(format!(
                "list lengths differ: {} refs, {} images, {} intrinsics, {} extrinsics",
                n,
                self.images.len(),
                self.intrinsics.len(),
                self.extrinsics.len()
            )));
        }
        Ok(())
    }
}

/// Rectification backend
#[async_trait]
pub trait Rectifier: Send + Sync {
    async fn rectify(&self, job: &RectificationJob) -> Result<Raster, RectifyError>;
}

/// Job description written for the external program
#[derive(Debug, Serialize)]
struct JobFile<'a> {
    metadata: &'a StationMetadata,
    images: Vec<PathBuf>,
    intrinsics: &'a [Intrinsics],
    extrinsics: &'a [Extrinsics],
    local_origin: &'a LocalOrigin,
    grid: &'a TargetGrid,
}

/// Runs an external rectification program
#[derive(Debug, Clone)]
pub struct CommandRectifier {
    program: String,
    args: Vec<String>,
    work_root: PathBuf,
}

impl CommandRectifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            work_root: std::env::temp_dir(),
        }
    }

    pub fn from_config(config: &RectifierConfig) -> Self {
        let rectifier = Self::new(config.program.clone(), config.args.clone());
        match &config.work_dir {
            Some(dir) => rectifier.with_work_root(dir),
            None => rectifier,
        }
    }

    /// Stage job directories under `root` instead of the system temp dir
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    async fn run_in(&self, work_dir: &Path, job: &RectificationJob) -> Result<Raster, RectifyError> {
        let mut staged = Vec::with_capacity(job.images.len());
        for (index, (key, bytes)) in job.image_refs.iter().zip(&job.images).enumerate() {
            let path = work_dir.join(format!("{:02}_{}", index, paths::file_name(key)));
            tokio::fs::write(&path, bytes).await?;
            staged.push(path);
        }

        let job_file = JobFile {
            metadata: &job.metadata,
            images: staged,
            intrinsics: &job.intrinsics,
            extrinsics: &job.extrinsics,
            local_origin: &job.local_origin,
            grid: &job.grid,
        };
        let job_path = work_dir.join("job.json");
        let job_json = serde_json::to_vec_pretty(&job_file)
            .map_err(|e| RectifyError::InvalidJob(e.to_string()))?;
        tokio::fs::write(&job_path, job_json).await?;

        let output_path = work_dir.join("output.png");

        tracing::debug!(
            program = %self.program,
            job_file = %job_path.display(),
            images = job.images.len(),
            "Running rectifier"
        );

        let output = tokio::task::spawn_blocking({
            let program = self.program.clone();
            let args = self.args.clone();
            let job_path = job_path.clone();
            let output_path = output_path.clone();

            move || {
                Command::new(&program)
                    .args(&args)
                    .arg(&job_path)
                    .arg(&output_path)
                    .output()
            }
        })
        .await
        .map_err(|e| RectifyError::Execution(format!("Task join error: {}", e)))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RectifyError::ProgramNotFound(self.program.clone())
            } else {
                RectifyError::Execution(e.to_string())
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RectifyError::Failed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&output_path).await.map_err(|e| {
            RectifyError::Decode(format!("{}: {}", output_path.display(), e))
        })?;
        Raster::decode(&bytes).map_err(|e| RectifyError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Rectifier for CommandRectifier {
    async fn rectify(&self, job: &RectificationJob) -> Result<Raster, RectifyError> {
        job.validate()?;

        let work_dir = self
            .work_root
            .join(format!("coastcam_rectify_{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&work_dir).await?;

        let result = self.run_in(&work_dir, job).await;

        // Clean up staged inputs and output
        let _ = tokio::fs::remove_dir_all(&work_dir).await;

        if let Ok(raster) = &result {
            tracing::debug!(
                width = raster.width(),
                height = raster.height(),
                "Rectifier produced raster"
            );
        }
        result
    }
}
