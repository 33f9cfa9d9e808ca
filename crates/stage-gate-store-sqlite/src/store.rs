// crates/stage-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Pipeline Store
// Description: A durable PipelineStore backed by a single SQLite connection.
// Purpose: Persist pipelines, stages, and attributions across process
// restarts without requiring an external database service.
// Dependencies: rusqlite, serde, serde_json, stage-gate-core, thiserror
// ============================================================================

//! ## Overview
//! [`SqlitePipelineStore`] keeps one open [`rusqlite::Connection`] behind a
//! [`std::sync::Mutex`]. `compare_and_update_stage` and
//! `complete_stage_transaction` each run inside a single `SQLite`
//! transaction, which is sufficient to make them atomic: `SQLite` serializes
//! writers at the database level, and the mutex serializes them at the
//! process level on top of that.
//!
//! Complex fields (`status`, `current_stage`, `output`, `artifacts`,
//! `claimed_at`/`started_at`/`completed_at`) are stored as `SQLite` `TEXT`
//! columns holding their `serde_json` encoding rather than as individually
//! normalized columns, trading query-ability over those fields for a schema
//! that mirrors `stage-gate-core`'s types directly.
//!
//! Both transactional methods retry their attempt up to [`MAX_BUSY_RETRIES`]
//! times when the engine reports `SQLITE_BUSY`/`SQLITE_LOCKED`, on top of the
//! `busy_timeout` pragma each connection already carries, before surfacing
//! [`stage_gate_core::StoreError::Io`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use stage_gate_core::Attribution;
use stage_gate_core::AttributionId;
use stage_gate_core::Pipeline;
use stage_gate_core::PipelineId;
use stage_gate_core::PipelineStatus;
use stage_gate_core::PipelineStore;
use stage_gate_core::Stage;
use stage_gate_core::StageId;
use stage_gate_core::StageName;
use stage_gate_core::StageOutput;
use stage_gate_core::StageStatus;
use stage_gate_core::StoreError;
use stage_gate_core::Timestamp;
use stage_gate_core::interfaces::PipelineFields;
use stage_gate_core::interfaces::StageFields;
use stage_gate_core::interfaces::apply_pipeline_fields;
use stage_gate_core::interfaces::apply_stage_fields;

const SCHEMA_VERSION: i64 = 1;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Store Modes
// ============================================================================

/// `SQLite` `journal_mode` pragma setting.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqliteStoreMode {
    /// Rollback-journal mode; simplest, least concurrent.
    Delete,
    /// Write-ahead log mode; readers do not block the writer.
    Wal,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Wal => "WAL",
        }
    }
}

/// `SQLite` `synchronous` pragma setting.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqliteSyncMode {
    /// No sync; fastest, least durable.
    Off,
    /// Sync at critical moments; the recommended default under WAL.
    Normal,
    /// Sync on every write; slowest, most durable.
    Full,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

// ============================================================================
// SECTION: Store Configuration
// ============================================================================

/// Configuration for [`SqlitePipelineStore::open`].
///
/// # Invariants
/// - `busy_timeout_ms` is interpreted as milliseconds and passed directly to
///   `SQLite`'s `busy_timeout` pragma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Filesystem path to the database file.
    pub path: PathBuf,
    /// Milliseconds `SQLite` will wait on a locked database before returning
    /// `SQLITE_BUSY`.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode to apply on open.
    #[serde(default = "default_journal_mode")]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode to apply on open.
    #[serde(default = "default_sync_mode")]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config pointing at `path` with the recommended WAL defaults.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
            sync_mode: default_sync_mode(),
        }
    }
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

const fn default_journal_mode() -> SqliteStoreMode {
    SqliteStoreMode::Wal
}

const fn default_sync_mode() -> SqliteSyncMode {
    SqliteSyncMode::Normal
}

// ============================================================================
// SECTION: Store Error
// ============================================================================

/// Errors a [`SqlitePipelineStore`] operation may surface before they are
/// folded into [`StoreError`] at the `PipelineStore` boundary.
///
/// # Invariants
/// - Error messages avoid embedding full row payloads.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Underlying `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// The engine reported `SQLITE_BUSY`/`SQLITE_LOCKED`; retried internally
    /// up to [`MAX_BUSY_RETRIES`] times before reaching this variant.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// A row held a value this store could not decode.
    #[error("sqlite store decode error: {0}")]
    Decode(String),
    /// The requested entity does not exist.
    #[error("sqlite store not found: {0}")]
    NotFound(String),
    /// A conditional write's precondition did not hold.
    #[error("sqlite store precondition failed: {0}")]
    PreconditionFailed(String),
    /// A uniqueness constraint was violated.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
}

/// Number of attempts `compare_and_update_stage`/`complete_stage_transaction`
/// make against a busy database before surfacing [`StoreError::Io`].
const MAX_BUSY_RETRIES: u32 = 3;

/// True when `error` is the engine reporting `SQLITE_BUSY`/`SQLITE_LOCKED`,
/// as opposed to any other driver failure.
fn is_busy_or_locked(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(inner.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        if is_busy_or_locked(&error) {
            Self::Busy(error.to_string())
        } else {
            Self::Db(error.to_string())
        }
    }
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Db(message) | SqliteStoreError::Decode(message) | SqliteStoreError::Busy(message) => Self::Io(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::PreconditionFailed(message) => Self::PreconditionFailed(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
        }
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    connection.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> =
        tx.query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0)).optional()?;
    if version.is_none() {
        tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS pipelines (
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                current_stage TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stages (
                id TEXT PRIMARY KEY,
                pipeline_id TEXT NOT NULL,
                stage_name TEXT NOT NULL,
                status TEXT NOT NULL,
                agent_id TEXT,
                agent_name TEXT,
                output TEXT,
                artifacts TEXT NOT NULL,
                error TEXT,
                claimed_at TEXT,
                started_at TEXT,
                completed_at TEXT,
                UNIQUE (pipeline_id, stage_name)
            );

            CREATE INDEX IF NOT EXISTS idx_stages_pipeline ON stages (pipeline_id);

            CREATE TABLE IF NOT EXISTS attributions (
                id TEXT PRIMARY KEY,
                pipeline_id TEXT NOT NULL,
                stage_id TEXT NOT NULL,
                stage_name TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                weight INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (pipeline_id, stage_name)
            );",
        )?;
    }
    tx.commit()?;
    Ok(())
}

// ============================================================================
// SECTION: JSON Column Helpers
// ============================================================================

fn encode<T: Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Decode(err.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(text).map_err(|err| SqliteStoreError::Decode(err.to_string()))
}

fn encode_opt<T: Serialize>(value: Option<&T>) -> Result<Option<String>, SqliteStoreError> {
    value.map(encode).transpose()
}

fn decode_opt<T: for<'de> Deserialize<'de>>(text: Option<String>) -> Result<Option<T>, SqliteStoreError> {
    text.map(|text| decode(&text)).transpose()
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Lifts a decode failure into the `rusqlite::Error` shape row-mapping
/// closures are required to return, so callers can keep using `?` against
/// `rusqlite`'s own `Result` inside `query_row`/`query_map`.
fn sql_decode_err(err: SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

fn pipeline_from_row(row: &Row<'_>) -> rusqlite::Result<Pipeline> {
    pipeline_from_row_decoded(row).map_err(sql_decode_err)
}

fn pipeline_from_row_decoded(row: &Row<'_>) -> Result<Pipeline, SqliteStoreError> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    let current_stage: Option<String> = row.get("current_stage")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(Pipeline {
        id: PipelineId::new(id),
        topic: row.get("topic")?,
        description: row.get("description")?,
        status: decode::<PipelineStatus>(&status)?,
        current_stage: decode_opt::<StageName>(current_stage)?,
        created_at: decode::<Timestamp>(&created_at)?,
        updated_at: decode::<Timestamp>(&updated_at)?,
    })
}

fn stage_from_row(row: &Row<'_>) -> rusqlite::Result<Stage> {
    stage_from_row_decoded(row).map_err(sql_decode_err)
}

fn stage_from_row_decoded(row: &Row<'_>) -> Result<Stage, SqliteStoreError> {
    let id: String = row.get("id")?;
    let pipeline_id: String = row.get("pipeline_id")?;
    let stage_name: String = row.get("stage_name")?;
    let status: String = row.get("status")?;
    let agent_id: Option<String> = row.get("agent_id")?;
    let agent_name: Option<String> = row.get("agent_name")?;
    let output: Option<String> = row.get("output")?;
    let artifacts: String = row.get("artifacts")?;
    let claimed_at: Option<String> = row.get("claimed_at")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let stage_name = StageName::from_str_token(&stage_name)
        .ok_or_else(|| SqliteStoreError::Decode(format!("unknown stage name token {stage_name}")))?;
    Ok(Stage {
        id: StageId::new(id),
        pipeline_id: PipelineId::new(pipeline_id),
        stage_name,
        status: decode::<StageStatus>(&status)?,
        agent_id: agent_id.map(stage_gate_core::AgentId::new),
        agent_name: agent_name.map(stage_gate_core::AgentName::new),
        output: decode_opt::<StageOutput>(output)?,
        artifacts: decode::<Vec<String>>(&artifacts)?,
        error: row.get("error")?,
        claimed_at: decode_opt::<Timestamp>(claimed_at)?,
        started_at: decode_opt::<Timestamp>(started_at)?,
        completed_at: decode_opt::<Timestamp>(completed_at)?,
    })
}

fn attribution_from_row(row: &Row<'_>) -> rusqlite::Result<Attribution> {
    attribution_from_row_decoded(row).map_err(sql_decode_err)
}

fn attribution_from_row_decoded(row: &Row<'_>) -> Result<Attribution, SqliteStoreError> {
    let id: String = row.get("id")?;
    let pipeline_id: String = row.get("pipeline_id")?;
    let stage_id: String = row.get("stage_id")?;
    let stage_name: String = row.get("stage_name")?;
    let agent_id: String = row.get("agent_id")?;
    let agent_name: String = row.get("agent_name")?;
    let weight: i64 = row.get("weight")?;
    let created_at: String = row.get("created_at")?;
    let stage_name = StageName::from_str_token(&stage_name)
        .ok_or_else(|| SqliteStoreError::Decode(format!("unknown stage name token {stage_name}")))?;
    let weight = u8::try_from(weight).map_err(|_err| SqliteStoreError::Decode(format!("weight {weight} out of range")))?;
    Ok(Attribution {
        id: AttributionId::new(id),
        pipeline_id: PipelineId::new(pipeline_id),
        stage_id: StageId::new(stage_id),
        stage_name,
        agent_id: stage_gate_core::AgentId::new(agent_id),
        agent_name: stage_gate_core::AgentName::new(agent_name),
        weight,
        created_at: decode::<Timestamp>(&created_at)?,
    })
}

fn insert_stage(tx: &Transaction<'_>, stage: &Stage) -> Result<(), SqliteStoreError> {
    tx.execute(
        "INSERT INTO stages (
            id, pipeline_id, stage_name, status, agent_id, agent_name, output,
            artifacts, error, claimed_at, started_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            stage.id.as_str(),
            stage.pipeline_id.as_str(),
            stage.stage_name.as_str(),
            encode(&stage.status)?,
            stage.agent_id.as_ref().map(stage_gate_core::AgentId::as_str),
            stage.agent_name.as_ref().map(stage_gate_core::AgentName::as_str),
            encode_opt(stage.output.as_ref())?,
            encode(&stage.artifacts)?,
            stage.error,
            encode_opt(stage.claimed_at.as_ref())?,
            encode_opt(stage.started_at.as_ref())?,
            encode_opt(stage.completed_at.as_ref())?,
        ],
    )?;
    Ok(())
}

fn write_stage_fields(tx: &Transaction<'_>, stage_id: &StageId, stage: &Stage) -> Result<(), SqliteStoreError> {
    tx.execute(
        "UPDATE stages SET
            status = ?1, agent_id = ?2, agent_name = ?3, output = ?4,
            artifacts = ?5, error = ?6, claimed_at = ?7, started_at = ?8,
            completed_at = ?9
         WHERE id = ?10",
        params![
            encode(&stage.status)?,
            stage.agent_id.as_ref().map(stage_gate_core::AgentId::as_str),
            stage.agent_name.as_ref().map(stage_gate_core::AgentName::as_str),
            encode_opt(stage.output.as_ref())?,
            encode(&stage.artifacts)?,
            stage.error,
            encode_opt(stage.claimed_at.as_ref())?,
            encode_opt(stage.started_at.as_ref())?,
            encode_opt(stage.completed_at.as_ref())?,
            stage_id.as_str(),
        ],
    )?;
    Ok(())
}

fn write_pipeline_fields(tx: &Transaction<'_>, pipeline: &Pipeline) -> Result<(), SqliteStoreError> {
    tx.execute(
        "UPDATE pipelines SET status = ?1, current_stage = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            encode(&pipeline.status)?,
            encode_opt(pipeline.current_stage.as_ref())?,
            encode(&pipeline.updated_at)?,
            pipeline.id.as_str(),
        ],
    )?;
    Ok(())
}

fn load_stage_by_id(tx: &Transaction<'_>, stage_id: &StageId) -> Result<Stage, SqliteStoreError> {
    tx.query_row("SELECT * FROM stages WHERE id = ?1", params![stage_id.as_str()], stage_from_row)
        .optional()?
        .ok_or_else(|| SqliteStoreError::NotFound(format!("stage {stage_id} not found")))
}

fn load_pipeline(tx: &Transaction<'_>, pipeline_id: &PipelineId) -> Result<Pipeline, SqliteStoreError> {
    tx.query_row("SELECT * FROM pipelines WHERE id = ?1", params![pipeline_id.as_str()], pipeline_from_row)
        .optional()?
        .ok_or_else(|| SqliteStoreError::NotFound(format!("pipeline {pipeline_id} not found")))
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed [`PipelineStore`] with WAL support.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
pub struct SqlitePipelineStore {
    connection: Mutex<Connection>,
}

impl SqlitePipelineStore {
    /// Opens (or creates) the database at `config.path`, applies pragmas, and
    /// runs schema initialization.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError::Db`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Opens an in-memory database, useful for tests that do not need a
    /// file on disk.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError::Db`] if the in-memory database cannot be
    /// created.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        Self::open(&SqliteStoreConfig::new(Path::new(":memory:")))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// One attempt at [`PipelineStore::compare_and_update_stage`]'s
    /// transaction, without the busy-retry wrapper.
    fn compare_and_update_stage_attempt(
        &self,
        stage_id: &StageId,
        expected_status: StageStatus,
        fields: StageFields,
    ) -> Result<Stage, SqliteStoreError> {
        let mut connection = self.lock();
        let tx = connection.transaction()?;
        let mut stage = load_stage_by_id(&tx, stage_id)?;
        if stage.status != expected_status {
            return Err(SqliteStoreError::PreconditionFailed(format!(
                "stage {stage_id} expected status {expected_status:?} but was {:?}",
                stage.status
            )));
        }
        apply_stage_fields(&mut stage, fields);
        write_stage_fields(&tx, stage_id, &stage)?;
        tx.commit()?;
        Ok(stage)
    }

    /// One attempt at [`PipelineStore::complete_stage_transaction`]'s
    /// transaction, without the busy-retry wrapper.
    fn complete_stage_transaction_attempt(
        &self,
        stage_id: &StageId,
        expected_status: StageStatus,
        stage_fields: StageFields,
        attribution: Attribution,
        pipeline_fields: PipelineFields,
    ) -> Result<(Stage, Pipeline), SqliteStoreError> {
        let mut connection = self.lock();
        let tx = connection.transaction()?;
        let mut stage = load_stage_by_id(&tx, stage_id)?;
        if stage.status != expected_status {
            return Err(SqliteStoreError::PreconditionFailed(format!(
                "stage {stage_id} expected status {expected_status:?} but was {:?}",
                stage.status
            )));
        }
        let existing_attribution: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM attributions WHERE pipeline_id = ?1 AND stage_name = ?2",
                params![attribution.pipeline_id.as_str(), attribution.stage_name.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if existing_attribution.is_some() {
            return Err(SqliteStoreError::Conflict(format!(
                "attribution already recorded for pipeline {} stage {}",
                attribution.pipeline_id, attribution.stage_name
            )));
        }
        apply_stage_fields(&mut stage, stage_fields);
        write_stage_fields(&tx, stage_id, &stage)?;
        tx.execute(
            "INSERT INTO attributions (
                id, pipeline_id, stage_id, stage_name, agent_id, agent_name, weight, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attribution.id.as_str(),
                attribution.pipeline_id.as_str(),
                attribution.stage_id.as_str(),
                attribution.stage_name.as_str(),
                attribution.agent_id.as_str(),
                attribution.agent_name.as_str(),
                i64::from(attribution.weight),
                encode(&attribution.created_at)?,
            ],
        )?;
        let mut pipeline = load_pipeline(&tx, &stage.pipeline_id)?;
        apply_pipeline_fields(&mut pipeline, pipeline_fields);
        write_pipeline_fields(&tx, &pipeline)?;
        tx.commit()?;
        Ok((stage, pipeline))
    }
}

impl PipelineStore for SqlitePipelineStore {
    fn create_pipeline_with_stages(&self, pipeline: Pipeline, stages: Vec<Stage>) -> Result<(), StoreError> {
        let mut connection = self.lock();
        let tx = connection.transaction().map_err(SqliteStoreError::from)?;
        let existing: Option<i64> = tx
            .query_row("SELECT 1 FROM pipelines WHERE id = ?1", params![pipeline.id.as_str()], |row| row.get(0))
            .optional()
            .map_err(SqliteStoreError::from)?;
        if existing.is_some() {
            return Err(StoreError::Conflict(format!("pipeline {} already exists", pipeline.id)));
        }
        tx.execute(
            "INSERT INTO pipelines (id, topic, description, status, current_stage, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                pipeline.id.as_str(),
                pipeline.topic,
                pipeline.description,
                encode(&pipeline.status).map_err(StoreError::from)?,
                encode_opt(pipeline.current_stage.as_ref()).map_err(StoreError::from)?,
                encode(&pipeline.created_at).map_err(StoreError::from)?,
                encode(&pipeline.updated_at).map_err(StoreError::from)?,
            ],
        )
        .map_err(SqliteStoreError::from)?;
        for stage in &stages {
            insert_stage(&tx, stage).map_err(StoreError::from)?;
        }
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn find_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, StoreError> {
        let connection = self.lock();
        connection
            .query_row("SELECT * FROM pipelines WHERE id = ?1", params![id.as_str()], pipeline_from_row)
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))
    }

    fn find_stage(&self, pipeline_id: &PipelineId, stage_name: StageName) -> Result<Option<Stage>, StoreError> {
        let connection = self.lock();
        connection
            .query_row(
                "SELECT * FROM stages WHERE pipeline_id = ?1 AND stage_name = ?2",
                params![pipeline_id.as_str(), stage_name.as_str()],
                stage_from_row,
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))
    }

    fn find_stage_by_id(&self, stage_id: &StageId) -> Result<Option<Stage>, StoreError> {
        let connection = self.lock();
        connection
            .query_row("SELECT * FROM stages WHERE id = ?1", params![stage_id.as_str()], stage_from_row)
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))
    }

    fn list_stages(&self, pipeline_id: &PipelineId) -> Result<Vec<Stage>, StoreError> {
        let connection = self.lock();
        let exists: Option<i64> = connection
            .query_row("SELECT 1 FROM pipelines WHERE id = ?1", params![pipeline_id.as_str()], |row| row.get(0))
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("pipeline {pipeline_id} not found")));
        }
        let mut statement = connection
            .prepare("SELECT * FROM stages WHERE pipeline_id = ?1")
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let rows = statement
            .query_map(params![pipeline_id.as_str()], stage_from_row)
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let mut stages = Vec::new();
        for row in rows {
            let stage = row.map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
            stages.push(stage);
        }
        stages.sort_by_key(|stage| stage.stage_name.position());
        Ok(stages)
    }

    fn list_running_pipelines_with_stages(&self) -> Result<Vec<(Pipeline, Vec<Stage>)>, StoreError> {
        let connection = self.lock();
        let running_token = encode(&PipelineStatus::Running).map_err(StoreError::from)?;
        let mut statement = connection
            .prepare("SELECT * FROM pipelines WHERE status = ?1")
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let rows = statement
            .query_map(params![running_token], pipeline_from_row)
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let mut result = Vec::new();
        for row in rows {
            let pipeline = row.map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
            let mut stage_statement = connection
                .prepare("SELECT * FROM stages WHERE pipeline_id = ?1")
                .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
            let stage_rows = stage_statement
                .query_map(params![pipeline.id.as_str()], stage_from_row)
                .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
            let mut stages = Vec::new();
            for stage_row in stage_rows {
                let stage = stage_row.map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
                stages.push(stage);
            }
            stages.sort_by_key(|stage| stage.stage_name.position());
            result.push((pipeline, stages));
        }
        Ok(result)
    }

    fn list_pipelines(&self, filter: Option<PipelineStatus>, limit: u32) -> Result<Vec<Pipeline>, StoreError> {
        let connection = self.lock();
        let limit = i64::from(limit);
        let mut pipelines = match filter {
            Some(status) => {
                let status_token = encode(&status).map_err(StoreError::from)?;
                let mut statement = connection
                    .prepare("SELECT * FROM pipelines WHERE status = ?1")
                    .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
                let rows = statement
                    .query_map(params![status_token], pipeline_from_row)
                    .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
                rows.map(|row| row.map_err(|err| StoreError::from(SqliteStoreError::from(err))))
                    .collect::<Result<Vec<_>, StoreError>>()?
            }
            None => {
                let mut statement = connection
                    .prepare("SELECT * FROM pipelines")
                    .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
                let rows = statement
                    .query_map(params![], pipeline_from_row)
                    .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
                rows.map(|row| row.map_err(|err| StoreError::from(SqliteStoreError::from(err))))
                    .collect::<Result<Vec<_>, StoreError>>()?
            }
        };
        pipelines.sort_by(|a, b| b.created_at.as_comparable().cmp(&a.created_at.as_comparable()));
        pipelines.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(pipelines)
    }

    fn compare_and_update_stage(
        &self,
        stage_id: &StageId,
        expected_status: StageStatus,
        fields: StageFields,
    ) -> Result<Stage, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.compare_and_update_stage_attempt(stage_id, expected_status, fields.clone()) {
                Ok(stage) => return Ok(stage),
                Err(SqliteStoreError::Busy(_)) if attempt < MAX_BUSY_RETRIES => {}
                Err(err) => return Err(StoreError::from(err)),
            }
        }
    }

    fn complete_stage_transaction(
        &self,
        stage_id: &StageId,
        expected_status: StageStatus,
        stage_fields: StageFields,
        attribution: Attribution,
        pipeline_fields: PipelineFields,
    ) -> Result<(Stage, Pipeline), StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.complete_stage_transaction_attempt(
                stage_id,
                expected_status,
                stage_fields.clone(),
                attribution.clone(),
                pipeline_fields.clone(),
            ) {
                Ok(result) => return Ok(result),
                Err(SqliteStoreError::Busy(_)) if attempt < MAX_BUSY_RETRIES => {}
                Err(err) => return Err(StoreError::from(err)),
            }
        }
    }

    fn append_attribution(&self, attribution: Attribution) -> Result<(), StoreError> {
        let connection = self.lock();
        let existing: Option<i64> = connection
            .query_row(
                "SELECT 1 FROM attributions WHERE pipeline_id = ?1 AND stage_name = ?2",
                params![attribution.pipeline_id.as_str(), attribution.stage_name.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        if existing.is_some() {
            return Err(StoreError::Conflict(format!(
                "attribution already recorded for pipeline {} stage {}",
                attribution.pipeline_id, attribution.stage_name
            )));
        }
        connection
            .execute(
                "INSERT INTO attributions (
                    id, pipeline_id, stage_id, stage_name, agent_id, agent_name, weight, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    attribution.id.as_str(),
                    attribution.pipeline_id.as_str(),
                    attribution.stage_id.as_str(),
                    attribution.stage_name.as_str(),
                    attribution.agent_id.as_str(),
                    attribution.agent_name.as_str(),
                    i64::from(attribution.weight),
                    encode(&attribution.created_at).map_err(StoreError::from)?,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn list_attributions(&self, pipeline_id: &PipelineId) -> Result<Vec<Attribution>, StoreError> {
        let connection = self.lock();
        let mut statement = connection
            .prepare("SELECT * FROM attributions WHERE pipeline_id = ?1")
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let rows = statement
            .query_map(params![pipeline_id.as_str()], attribution_from_row)
            .map_err(|err| StoreError::from(SqliteStoreError::from(err)))?;
        let mut attributions = rows
            .map(|row| row.map_err(|err| StoreError::from(SqliteStoreError::from(err))))
            .collect::<Result<Vec<_>, StoreError>>()?;
        attributions.sort_by_key(|attribution| attribution.stage_name.position());
        Ok(attributions)
    }

    fn update_pipeline(&self, id: &PipelineId, fields: PipelineFields) -> Result<Pipeline, StoreError> {
        let mut connection = self.lock();
        let tx = connection.transaction().map_err(SqliteStoreError::from)?;
        let mut pipeline = load_pipeline(&tx, id).map_err(StoreError::from)?;
        apply_pipeline_fields(&mut pipeline, fields);
        write_pipeline_fields(&tx, &pipeline).map_err(StoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(pipeline)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
