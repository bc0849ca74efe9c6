//! Calibration database access
//!
//! The station calibration database holds one `camera` row per
//! (station, camera) with extrinsics, intrinsics, metadata and the station's
//! local grid origin.

pub mod cameras;

use coastcam_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the camera table if it doesn't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS camera (
            station_name TEXT NOT NULL,
            camera_number TEXT NOT NULL,
            serial_number TEXT,
            calibration_date TEXT NOT NULL,
            coordinate_system TEXT NOT NULL,
            x REAL NOT NULL,
            y REAL NOT NULL,
            z REAL NOT NULL,
            a REAL NOT NULL,
            t REAL NOT NULL,
            r REAL NOT NULL,
            NU REAL NOT NULL,
            NV REAL NOT NULL,
            c0U REAL NOT NULL,
            c0V REAL NOT NULL,
            fx REAL NOT NULL,
            fy REAL NOT NULL,
            d1 REAL NOT NULL,
            d2 REAL NOT NULL,
            d3 REAL NOT NULL,
            t1 REAL NOT NULL,
            t2 REAL NOT NULL,
            x_origin REAL NOT NULL,
            y_origin REAL NOT NULL,
            angd REAL NOT NULL,
            PRIMARY KEY (station_name, camera_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database tables initialized (camera)");

    Ok(())
}
