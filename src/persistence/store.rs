//! SQLite-based step store

use crate::core::graph::{Attrs, JobId};
use crate::core::patch::{SaveRequest, SaveResponse};
use crate::core::schema::SelectOption;
use crate::persistence::{default_dictionaries, PersistenceBackend, PersistenceError, StepRepository, StoredStep};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        PersistenceError::Storage(e.to_string())
    }
}

/// SQLite step store
pub struct SqliteStepStore {
    pool: SqlitePool,
}

impl SqliteStepStore {
    /// Create a new SQLite store
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);
        // Every connection to :memory: opens its own database
        let max_connections = if db_path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("stepform");
        std::fs::create_dir_all(&db_dir)?;

        let db_path = db_dir.join("steps.db");
        let db_path = db_path
            .to_str()
            .context("Database path is not valid UTF-8")?;
        Self::new(db_path).await
    }

    /// Initialize database schema and seed dictionaries
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_graph (
                job_id TEXT PRIMARY KEY,
                graph TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS job_step (
                job_id TEXT NOT NULL,
                step_code TEXT NOT NULL,
                step_title TEXT NOT NULL,
                step_attrs TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (job_id, step_code)
            );

            CREATE TABLE IF NOT EXISTS dict_data (
                dict_type TEXT NOT NULL,
                label TEXT NOT NULL,
                value TEXT NOT NULL,
                sort INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (dict_type, value)
            );

            CREATE INDEX IF NOT EXISTS idx_job_step_job ON job_step(job_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (dict_type, options) in default_dictionaries() {
            self.put_dictionary(&dict_type, &options).await?;
        }

        Ok(())
    }

    /// Insert dictionary entries, keeping existing ones
    pub async fn put_dictionary(&self, dict_type: &str, options: &[SelectOption]) -> Result<()> {
        for (sort, option) in options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO dict_data (dict_type, label, value, sort)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(dict_type)
            .bind(&option.label)
            .bind(&option.value)
            .bind(sort as i64)
            .execute(&self.pool)
            .await
            .context("Failed to seed dictionary")?;
        }
        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    /// Job ids are stored in their JSON form so `7` and `"7"` stay distinct
    fn job_key(job_id: &JobId) -> Result<String, PersistenceError> {
        serde_json::to_string(job_id).map_err(|e| PersistenceError::Storage(e.to_string()))
    }

    fn step_from_row(row: &SqliteRow) -> Result<StoredStep, PersistenceError> {
        let attrs: String = row.get("step_attrs");
        let step_attrs: Attrs = serde_json::from_str(&attrs)
            .map_err(|e| PersistenceError::Storage(format!("Corrupt step attributes: {}", e)))?;
        let job_key: String = row.get("job_id");
        let job_id: JobId = serde_json::from_str(&job_key)
            .map_err(|e| PersistenceError::Storage(format!("Corrupt job id: {}", e)))?;

        Ok(StoredStep {
            job_id,
            step_code: row.get("step_code"),
            step_title: row.get("step_title"),
            step_attrs,
            updated_at: Self::from_naive(row.get("updated_at")),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStepStore {
    async fn save(&self, request: &SaveRequest) -> Result<SaveResponse, PersistenceError> {
        let job_id = Self::job_key(&request.job_id)?;
        let step = StoredStep::from_request(request);
        let attrs = serde_json::to_string(&step.step_attrs)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        let now = Self::to_naive(step.updated_at);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO job_graph (job_id, graph, updated_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&job_id)
        .bind(&request.job_graph)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO job_step (job_id, step_code, step_title, step_attrs, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (job_id, step_code) DO UPDATE SET
                step_title = excluded.step_title,
                step_attrs = excluded.step_attrs,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&job_id)
        .bind(&step.step_code)
        .bind(&step.step_title)
        .bind(&attrs)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Saved step {} of job {} ({})", step.step_code, request.job_id, request.request_id);
        Ok(SaveResponse::ok())
    }

    async fn list_options(&self, dict_type: &str) -> Result<Vec<SelectOption>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT label, value
            FROM dict_data
            WHERE dict_type = ?1
            ORDER BY sort ASC, value ASC
            "#,
        )
        .bind(dict_type)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(PersistenceError::UnknownDictionary(dict_type.to_string()));
        }

        debug!("Loaded {} options for dictionary {}", rows.len(), dict_type);
        Ok(rows
            .iter()
            .map(|row| SelectOption::new(row.get::<String, _>("label"), row.get::<String, _>("value")))
            .collect())
    }
}

#[async_trait::async_trait]
impl StepRepository for SqliteStepStore {
    async fn load_step(&self, job_id: &JobId, step_code: &str) -> Result<Option<StoredStep>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT job_id, step_code, step_title, step_attrs, updated_at
            FROM job_step
            WHERE job_id = ?1 AND step_code = ?2
            "#,
        )
        .bind(Self::job_key(job_id)?)
        .bind(step_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::step_from_row).transpose()
    }

    async fn list_steps(&self, job_id: &JobId) -> Result<Vec<StoredStep>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, step_code, step_title, step_attrs, updated_at
            FROM job_step
            WHERE job_id = ?1
            ORDER BY step_code ASC
            "#,
        )
        .bind(Self::job_key(job_id)?)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::step_from_row).collect()
    }

    async fn load_graph(&self, job_id: &JobId) -> Result<Option<String>, PersistenceError> {
        let row = sqlx::query("SELECT graph FROM job_graph WHERE job_id = ?1")
            .bind(Self::job_key(job_id)?)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("graph")))
    }
}
