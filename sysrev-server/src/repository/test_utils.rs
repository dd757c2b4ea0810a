//! Shared fixtures for repository and service tests.

use std::collections::BTreeSet;

use sysrev_core::{
    ResearcherId, StudyMetadata, StudyReview, StudyReviewId, SystematicStudy, SystematicStudyId,
};
use uuid::Uuid;

pub(crate) fn metadata(title: &str) -> StudyMetadata {
    StudyMetadata {
        study_type: "ARTICLE".to_string(),
        title: title.to_string(),
        year: 2020,
        authors: "Grace Hopper".to_string(),
        venue: "Empirical Software Engineering".to_string(),
        abstract_text: "We screen studies.".to_string(),
        keywords: BTreeSet::from(["review".to_string(), "screening".to_string()]),
        references: vec!["A prior study".to_string()],
        doi: None,
    }
}

pub(crate) fn systematic_study(owner: ResearcherId) -> SystematicStudy {
    SystematicStudy::new(
        SystematicStudyId::new_random(),
        "Test systematic study",
        "A study used in tests",
        owner,
    )
    .unwrap()
}

pub(crate) fn researcher() -> ResearcherId {
    ResearcherId(Uuid::new_v4())
}

pub(crate) fn review(systematic_study: SystematicStudyId, id: i64, sources: &[&str]) -> StudyReview {
    StudyReview::new(
        StudyReviewId(id),
        systematic_study,
        metadata(&format!("Study {}", id)),
        sources.iter().map(|s| s.to_string()),
    )
    .unwrap()
}
