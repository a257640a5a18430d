//! SQLite persistence for the vidforge orchestrator.
//!
//! The store is the single source of truth for jobs and runs; every
//! in-memory view (armed triggers, health caches) is rebuilt from it.
//! SQLite has no multi-writer concurrency control, so the pool is
//! capped at a single connection to serialize writers.

use std::collections::HashSet;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::SqlitePool;

/// Columns added to `jobs` after the table first shipped. Applied
/// additively so databases created before these fields existed keep
/// working without a rebuild.
const JOBS_ADDITIVE_COLUMNS: [(&str, &str); 4] = [
    ("video_length", "INTEGER"),
    ("fps", "INTEGER"),
    ("width", "INTEGER"),
    ("height", "INTEGER"),
];

const CREATE_JOBS: &str = "\
    CREATE TABLE IF NOT EXISTS jobs (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      task_name TEXT NOT NULL UNIQUE,
      job_type TEXT NOT NULL,
      prompt TEXT,
      character TEXT,
      environment TEXT,
      video_length INTEGER,
      fps INTEGER,
      width INTEGER,
      height INTEGER,
      schedule_kind TEXT NOT NULL,
      schedule_dt TEXT,
      recurring_days TEXT,
      recurring_time TEXT,
      status TEXT NOT NULL,
      host_script_path TEXT,
      host_log_path TEXT,
      last_error TEXT,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    )";

const CREATE_JOB_RUNS: &str = "\
    CREATE TABLE IF NOT EXISTS job_runs (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      job_id INTEGER NOT NULL,
      started_at TEXT NOT NULL,
      finished_at TEXT,
      status TEXT NOT NULL,
      output_path TEXT,
      log_path TEXT,
      host_exit_code INTEGER,
      error_message TEXT,
      FOREIGN KEY(job_id) REFERENCES jobs(id)
    )";

/// Create a connection pool from a database URL
/// (e.g. `sqlite://data/vidforge.db?mode=rwc`).
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Single writer connection; see module docs.
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Create the schema and apply additive column migrations.
///
/// Idempotent: tables are created only if missing, and each column in
/// [`JOBS_ADDITIVE_COLUMNS`] is added only when `PRAGMA table_info`
/// shows it absent. Older databases therefore upgrade in place.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_JOBS).execute(pool).await?;

    let rows = sqlx::query("PRAGMA table_info(jobs)")
        .fetch_all(pool)
        .await?;
    let existing: HashSet<String> = rows
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    for (name, column_type) in JOBS_ADDITIVE_COLUMNS {
        if !existing.contains(name) {
            tracing::info!(column = name, "Applying additive jobs migration");
            sqlx::query(&format!("ALTER TABLE jobs ADD COLUMN {name} {column_type}"))
                .execute(pool)
                .await?;
        }
    }

    sqlx::query(CREATE_JOB_RUNS).execute(pool).await?;
    Ok(())
}
