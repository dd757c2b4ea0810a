//! Classification history operations for SQLite repository.
//!
//! Each successful transition is stored in the `classification_history`
//! table with the event name in `event_type` and the full transition as
//! JSON in `event_data`.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::super::{HistoryEntry, RepositoryError};
use super::SqliteRepository;
use sysrev_core::{ClassificationEvent, StudyClassification, StudyReviewId, SystematicStudyId};

/// Contents of the `event_data` column.
#[derive(Serialize, Deserialize)]
struct TransitionData {
    event: ClassificationEvent,
    from: StudyClassification,
    to: StudyClassification,
}

/// Serialized form of a history entry, ready to be inserted.
pub(super) struct HistoryRow {
    systematic_study_id: String,
    study_review_id: i64,
    event_type: &'static str,
    event_data: String,
    recorded_at: i64,
}

impl HistoryRow {
    pub(super) fn new(entry: &HistoryEntry) -> Result<Self, RepositoryError> {
        let data = TransitionData {
            event: entry.event,
            from: entry.from,
            to: entry.to,
        };
        let event_data = serde_json::to_string(&data)
            .map_err(|e| RepositoryError::storage("serialize history entry", e.to_string()))?;

        Ok(Self {
            systematic_study_id: entry.systematic_study_id.to_string(),
            study_review_id: entry.study_review_id.0,
            event_type: entry.event.log_summary(),
            event_data,
            recorded_at: entry.recorded_at,
        })
    }

    pub(super) fn insert(&self, conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute(
            "INSERT INTO classification_history
                 (systematic_study_id, study_review_id, event_type, event_data, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.systematic_study_id,
                self.study_review_id,
                self.event_type,
                self.event_data,
                self.recorded_at
            ],
        )
        .map_err(|e| RepositoryError::storage("insert history entry", e.to_string()))?;
        Ok(())
    }
}

impl SqliteRepository {
    pub(super) async fn get_history_impl(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let conn = self.conn.clone();
        let systematic_study_key = systematic_study.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let mut stmt = conn
                .prepare(
                    "SELECT id, event_data, recorded_at
                     FROM classification_history
                     WHERE systematic_study_id = ?1 AND study_review_id = ?2
                     ORDER BY id",
                )
                .map_err(|e| RepositoryError::storage("get_history", e.to_string()))?;

            let rows = stmt
                .query_map(params![systematic_study_key, id.0], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(|e| RepositoryError::storage("get_history", e.to_string()))?;

            let mut entries = Vec::new();
            for row in rows {
                let (entry_id, event_data, recorded_at) =
                    row.map_err(|e| RepositoryError::storage("get_history row", e.to_string()))?;

                let data: TransitionData = serde_json::from_str(&event_data)
                    .map_err(|_| RepositoryError::corruption("event_data JSON"))?;

                entries.push(HistoryEntry {
                    id: entry_id,
                    systematic_study_id: systematic_study,
                    study_review_id: id,
                    event: data.event,
                    from: data.from,
                    to: data.to,
                    recorded_at,
                });
            }

            Ok(entries)
        })
        .await
        .map_err(|e| RepositoryError::storage("get_history", e.to_string()))?
    }
}
