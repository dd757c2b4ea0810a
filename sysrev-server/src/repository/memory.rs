//! In-memory implementation of `StudyReviewRepository`.
//!
//! All state is held in memory and lost on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{HistoryEntry, RepositoryError, StudyReviewRepository};
use sysrev_core::{ResearcherId, StudyReview, StudyReviewId, SystematicStudy, SystematicStudyId};

type ReviewKey = (SystematicStudyId, StudyReviewId);

#[derive(Default)]
struct HistoryLog {
    next_id: i64,
    entries: Vec<HistoryEntry>,
}

/// In-memory study review repository.
///
/// Reviews live in a `BTreeMap` so per-study listings come out ordered by id.
/// Writers that touch both reviews and history take the `reviews` lock first.
pub struct InMemoryRepository {
    studies: RwLock<HashMap<SystematicStudyId, SystematicStudy>>,
    reviews: RwLock<BTreeMap<ReviewKey, StudyReview>>,
    sequences: RwLock<HashMap<SystematicStudyId, i64>>,
    history: RwLock<HistoryLog>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            studies: RwLock::new(HashMap::new()),
            reviews: RwLock::new(BTreeMap::new()),
            sequences: RwLock::new(HashMap::new()),
            history: RwLock::new(HistoryLog::default()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn key(review: &StudyReview) -> ReviewKey {
    (review.systematic_study_id(), review.id())
}

#[async_trait]
impl StudyReviewRepository for InMemoryRepository {
    async fn get_systematic_study(
        &self,
        id: SystematicStudyId,
    ) -> Result<Option<SystematicStudy>, RepositoryError> {
        let studies = self.studies.read().await;
        Ok(studies.get(&id).cloned())
    }

    async fn put_systematic_study(&self, study: &SystematicStudy) -> Result<(), RepositoryError> {
        let mut studies = self.studies.write().await;
        studies.insert(study.id(), study.clone());
        Ok(())
    }

    async fn get_systematic_studies_for(
        &self,
        researcher: ResearcherId,
    ) -> Result<Vec<SystematicStudy>, RepositoryError> {
        let studies = self.studies.read().await;
        let mut matching: Vec<SystematicStudy> = studies
            .values()
            .filter(|study| study.contains_collaborator(researcher))
            .cloned()
            .collect();
        matching.sort_by_key(|study| study.id());
        Ok(matching)
    }

    async fn next_study_review_id(
        &self,
        systematic_study: SystematicStudyId,
    ) -> Result<StudyReviewId, RepositoryError> {
        let mut sequences = self.sequences.write().await;
        let last = sequences.entry(systematic_study).or_insert(0);
        *last += 1;
        Ok(StudyReviewId(*last))
    }

    async fn get(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Option<StudyReview>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(reviews.get(&(systematic_study, id)).cloned())
    }

    async fn put(&self, review: &StudyReview) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        reviews.insert(key(review), review.clone());
        Ok(())
    }

    async fn put_with_history(
        &self,
        to_save: &[StudyReview],
        entry: &HistoryEntry,
    ) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        let mut history = self.history.write().await;

        for review in to_save {
            reviews.insert(key(review), review.clone());
        }
        history.next_id += 1;
        let mut entry = entry.clone();
        entry.id = history.next_id;
        history.entries.push(entry);
        Ok(())
    }

    async fn delete(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Option<StudyReview>, RepositoryError> {
        let mut reviews = self.reviews.write().await;
        let mut history = self.history.write().await;

        let removed = reviews.remove(&(systematic_study, id));
        if removed.is_some() {
            history.entries.retain(|entry| {
                !(entry.systematic_study_id == systematic_study && entry.study_review_id == id)
            });
        }
        Ok(removed)
    }

    async fn get_all(
        &self,
        systematic_study: SystematicStudyId,
    ) -> Result<Vec<StudyReview>, RepositoryError> {
        let reviews = self.reviews.read().await;
        let first = (systematic_study, StudyReviewId(i64::MIN));
        let last = (systematic_study, StudyReviewId(i64::MAX));
        Ok(reviews
            .range(first..=last)
            .map(|(_, review)| review.clone())
            .collect())
    }

    async fn get_by_search_source(
        &self,
        systematic_study: SystematicStudyId,
        search_source: &str,
    ) -> Result<Vec<StudyReview>, RepositoryError> {
        Ok(self
            .get_all(systematic_study)
            .await?
            .into_iter()
            .filter(|review| review.has_search_source(search_source))
            .collect())
    }

    async fn get_history(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let history = self.history.read().await;
        Ok(history
            .entries
            .iter()
            .filter(|entry| {
                entry.systematic_study_id == systematic_study && entry.study_review_id == id
            })
            .cloned()
            .collect())
    }
}
