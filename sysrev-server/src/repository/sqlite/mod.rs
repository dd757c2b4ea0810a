//! SQLite implementation of `StudyReviewRepository`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.
//!
//! # Storage Layout
//!
//! Study reviews are stored as JSON next to indexed copies of their two
//! statuses. When adding fields to `StudyReview`, use `#[serde(default)]` so
//! rows written by older versions still deserialize.

mod history;


use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, warn};

use super::{HistoryEntry, RepositoryError, StudyReviewRepository};
use sysrev_core::{ResearcherId, StudyReview, StudyReviewId, SystematicStudy, SystematicStudyId};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 2;

/// SQLite-backed study review repository.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
pub struct SqliteRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Create a new SQLite repository at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    /// Runs any pending migrations if the database exists but has an older schema.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` so committed classifications survive power loss
    /// - `busy_timeout = 5000ms` to wait out a concurrent CLI writer
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;

                    // Covers the WAL/SHM files SQLite creates with the default umask.
                    #[cfg(unix)]
                    {
                        use std::os::unix::fs::PermissionsExt;
                        let dir_permissions = std::fs::Permissions::from_mode(0o700);
                        if let Err(e) = std::fs::set_permissions(parent, dir_permissions) {
                            warn!(
                                "Failed to set restrictive permissions on state directory: {}",
                                e
                            );
                        }
                    }
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        #[cfg(unix)]
        if !is_in_memory && !path_str.is_empty() {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path_ref, permissions) {
                warn!(
                    "Failed to set restrictive permissions on database file: {}",
                    e
                );
            }
        }

        // SQLite can silently keep DELETE mode on filesystems without shared
        // memory support, so check what we actually got. In-memory databases
        // report "memory".
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'. \
                     This can happen on filesystems that don't support shared memory \
                     (e.g., some network filesystems).",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        // 0 if the table is empty, i.e. a fresh database
        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        // Migration from version 0 (fresh database) to version 1
        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS systematic_studies (
                    id TEXT PRIMARY KEY,
                    owner TEXT NOT NULL,
                    study_json TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS study_reviews (
                    systematic_study_id TEXT NOT NULL,
                    id INTEGER NOT NULL,
                    selection_status TEXT NOT NULL,
                    extraction_status TEXT NOT NULL,
                    review_json TEXT NOT NULL,
                    PRIMARY KEY (systematic_study_id, id)
                );

                CREATE INDEX IF NOT EXISTS idx_study_reviews_status
                    ON study_reviews(systematic_study_id, selection_status, extraction_status);

                CREATE TABLE IF NOT EXISTS study_review_sequences (
                    systematic_study_id TEXT PRIMARY KEY,
                    last_id INTEGER NOT NULL
                );
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        // Migration from version 1 to version 2: classification history
        if from_version < 2 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS classification_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    systematic_study_id TEXT NOT NULL,
                    study_review_id INTEGER NOT NULL,
                    event_type TEXT NOT NULL,
                    event_data TEXT NOT NULL,
                    recorded_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_classification_history_lookup
                    ON classification_history(systematic_study_id, study_review_id, id);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v2", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite repository (for testing).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }
}

// =============================================================================
// Row helpers
// =============================================================================

/// Serialized form of a study review, ready to be bound to an upsert.
struct ReviewRow {
    systematic_study_id: String,
    id: i64,
    selection_status: &'static str,
    extraction_status: &'static str,
    review_json: String,
}

impl ReviewRow {
    fn new(review: &StudyReview, operation: &'static str) -> Result<Self, RepositoryError> {
        let classification = review.classification();
        let review_json = serde_json::to_string(review)
            .map_err(|e| RepositoryError::storage(operation, e.to_string()))?;
        Ok(Self {
            systematic_study_id: review.systematic_study_id().to_string(),
            id: review.id().0,
            selection_status: classification.selection().as_str(),
            extraction_status: classification.extraction().as_str(),
            review_json,
        })
    }

    fn upsert(&self, conn: &Connection, operation: &'static str) -> Result<(), RepositoryError> {
        conn.execute(
            "INSERT INTO study_reviews (systematic_study_id, id, selection_status,
                                        extraction_status, review_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(systematic_study_id, id) DO UPDATE SET
                 selection_status = excluded.selection_status,
                 extraction_status = excluded.extraction_status,
                 review_json = excluded.review_json",
            params![
                self.systematic_study_id,
                self.id,
                self.selection_status,
                self.extraction_status,
                self.review_json
            ],
        )
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?;
        Ok(())
    }
}

/// Decode the `review_json` column of a list query, skipping rows that
/// cannot be read so one corrupt record does not hide the rest.
fn collect_reviews(
    rows: impl Iterator<Item = rusqlite::Result<(i64, String)>>,
    operation: &'static str,
) -> Vec<StudyReview> {
    let mut reviews = Vec::new();
    for row in rows {
        let (id, json) = match row {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to read study review row in {}: {}", operation, e);
                continue;
            }
        };

        match serde_json::from_str::<StudyReview>(&json) {
            Ok(review) => reviews.push(review),
            Err(e) => {
                warn!(
                    "Skipping corrupt study review #{} in {}: {}. \
                     This row may need manual investigation or will be overwritten \
                     on next update.",
                    id, operation, e
                );
            }
        }
    }
    reviews
}

// =============================================================================
// StudyReviewRepository trait implementation
// =============================================================================

#[async_trait]
impl StudyReviewRepository for SqliteRepository {
    async fn get_systematic_study(
        &self,
        id: SystematicStudyId,
    ) -> Result<Option<SystematicStudy>, RepositoryError> {
        let conn = self.conn.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let json: Option<String> = conn
                .query_row(
                    "SELECT study_json FROM systematic_studies WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get_systematic_study", e.to_string()))?;

            json.map(|json| {
                serde_json::from_str(&json)
                    .map_err(|_| RepositoryError::corruption("systematic study JSON"))
            })
            .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("get_systematic_study", e.to_string()))?
    }

    async fn put_systematic_study(&self, study: &SystematicStudy) -> Result<(), RepositoryError> {
        let conn = self.conn.clone();
        let id = study.id().to_string();
        let owner = study.owner().to_string();
        let study_json = serde_json::to_string(study)
            .map_err(|e| RepositoryError::storage("serialize systematic study", e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            conn.execute(
                "INSERT INTO systematic_studies (id, owner, study_json)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     owner = excluded.owner,
                     study_json = excluded.study_json",
                params![id, owner, study_json],
            )
            .map_err(|e| RepositoryError::storage("put_systematic_study", e.to_string()))?;

            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::storage("put_systematic_study", e.to_string()))?
    }

    async fn get_systematic_studies_for(
        &self,
        researcher: ResearcherId,
    ) -> Result<Vec<SystematicStudy>, RepositoryError> {
        let conn = self.conn.clone();
        let researcher = researcher.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let mut stmt = conn
                .prepare(
                    "SELECT s.id, s.study_json FROM systematic_studies s
                     WHERE EXISTS (
                         SELECT 1 FROM json_each(s.study_json, '$.collaborators') c
                         WHERE c.value = ?1
                     )
                     ORDER BY s.id",
                )
                .map_err(|e| {
                    RepositoryError::storage("get_systematic_studies_for", e.to_string())
                })?;

            let rows = stmt
                .query_map(params![researcher], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| {
                    RepositoryError::storage("get_systematic_studies_for", e.to_string())
                })?;

            let mut studies = Vec::new();
            for row in rows {
                let (id, json) = match row {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to read systematic study row: {}", e);
                        continue;
                    }
                };
                match serde_json::from_str::<SystematicStudy>(&json) {
                    Ok(study) => studies.push(study),
                    Err(e) => warn!("Skipping corrupt systematic study {}: {}", id, e),
                }
            }
            Ok(studies)
        })
        .await
        .map_err(|e| RepositoryError::storage("get_systematic_studies_for", e.to_string()))?
    }

    async fn next_study_review_id(
        &self,
        systematic_study: SystematicStudyId,
    ) -> Result<StudyReviewId, RepositoryError> {
        let conn = self.conn.clone();
        let systematic_study = systematic_study.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let id: i64 = conn
                .query_row(
                    "INSERT INTO study_review_sequences (systematic_study_id, last_id)
                     VALUES (?1, 1)
                     ON CONFLICT(systematic_study_id) DO UPDATE SET last_id = last_id + 1
                     RETURNING last_id",
                    params![systematic_study],
                    |row| row.get(0),
                )
                .map_err(|e| RepositoryError::storage("next_study_review_id", e.to_string()))?;

            Ok(StudyReviewId(id))
        })
        .await
        .map_err(|e| RepositoryError::storage("next_study_review_id", e.to_string()))?
    }

    async fn get(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Option<StudyReview>, RepositoryError> {
        let conn = self.conn.clone();
        let systematic_study = systematic_study.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let json: Option<String> = conn
                .query_row(
                    "SELECT review_json FROM study_reviews
                     WHERE systematic_study_id = ?1 AND id = ?2",
                    params![systematic_study, id.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get", e.to_string()))?;

            json.map(|json| {
                serde_json::from_str(&json)
                    .map_err(|_| RepositoryError::corruption("study review JSON"))
            })
            .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("get", e.to_string()))?
    }

    async fn put(&self, review: &StudyReview) -> Result<(), RepositoryError> {
        let conn = self.conn.clone();
        let row = ReviewRow::new(review, "put")?;

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            row.upsert(&conn, "put")
        })
        .await
        .map_err(|e| RepositoryError::storage("put", e.to_string()))?
    }

    async fn put_with_history(
        &self,
        reviews: &[StudyReview],
        entry: &HistoryEntry,
    ) -> Result<(), RepositoryError> {
        let conn = self.conn.clone();
        let rows = reviews
            .iter()
            .map(|review| ReviewRow::new(review, "put_with_history"))
            .collect::<Result<Vec<_>, _>>()?;
        let history_row = history::HistoryRow::new(entry)?;

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();

            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::storage("put_with_history begin", e.to_string()))?;

            for row in &rows {
                row.upsert(&tx, "put_with_history")?;
            }
            history_row.insert(&tx)?;

            tx.commit()
                .map_err(|e| RepositoryError::storage("put_with_history commit", e.to_string()))
        })
        .await
        .map_err(|e| RepositoryError::storage("put_with_history", e.to_string()))?
    }

    async fn delete(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Option<StudyReview>, RepositoryError> {
        let conn = self.conn.clone();
        let systematic_study = systematic_study.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();

            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::storage("delete begin", e.to_string()))?;

            // Use DELETE...RETURNING to atomically delete and return the row
            let json: Option<String> = tx
                .query_row(
                    "DELETE FROM study_reviews
                     WHERE systematic_study_id = ?1 AND id = ?2
                     RETURNING review_json",
                    params![systematic_study, id.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RepositoryError::storage("delete", e.to_string()))?;

            if json.is_some() {
                tx.execute(
                    "DELETE FROM classification_history
                     WHERE systematic_study_id = ?1 AND study_review_id = ?2",
                    params![systematic_study, id.0],
                )
                .map_err(|e| RepositoryError::storage("delete history", e.to_string()))?;
            }

            tx.commit()
                .map_err(|e| RepositoryError::storage("delete commit", e.to_string()))?;

            json.map(|json| {
                serde_json::from_str(&json)
                    .map_err(|_| RepositoryError::corruption("study review JSON"))
            })
            .transpose()
        })
        .await
        .map_err(|e| RepositoryError::storage("delete", e.to_string()))?
    }

    async fn get_all(
        &self,
        systematic_study: SystematicStudyId,
    ) -> Result<Vec<StudyReview>, RepositoryError> {
        let conn = self.conn.clone();
        let systematic_study = systematic_study.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let mut stmt = conn
                .prepare(
                    "SELECT id, review_json FROM study_reviews
                     WHERE systematic_study_id = ?1
                     ORDER BY id",
                )
                .map_err(|e| RepositoryError::storage("get_all", e.to_string()))?;

            let rows = stmt
                .query_map(params![systematic_study], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| RepositoryError::storage("get_all", e.to_string()))?;

            Ok(collect_reviews(rows, "get_all"))
        })
        .await
        .map_err(|e| RepositoryError::storage("get_all", e.to_string()))?
    }

    async fn get_by_search_source(
        &self,
        systematic_study: SystematicStudyId,
        search_source: &str,
    ) -> Result<Vec<StudyReview>, RepositoryError> {
        let conn = self.conn.clone();
        let systematic_study = systematic_study.to_string();
        let search_source = search_source.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let mut stmt = conn
                .prepare(
                    "SELECT r.id, r.review_json FROM study_reviews r
                     WHERE r.systematic_study_id = ?1
                       AND EXISTS (
                           SELECT 1 FROM json_each(r.review_json, '$.searchSources') s
                           WHERE s.value = ?2
                       )
                     ORDER BY r.id",
                )
                .map_err(|e| RepositoryError::storage("get_by_search_source", e.to_string()))?;

            let rows = stmt
                .query_map(params![systematic_study, search_source], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| RepositoryError::storage("get_by_search_source", e.to_string()))?;

            Ok(collect_reviews(rows, "get_by_search_source"))
        })
        .await
        .map_err(|e| RepositoryError::storage("get_by_search_source", e.to_string()))?
    }

    // =========================================================================
    // Classification history - delegated to history module
    // =========================================================================

    async fn get_history(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Vec<HistoryEntry>, RepositoryError> {
        self.get_history_impl(systematic_study, id).await
    }
}
