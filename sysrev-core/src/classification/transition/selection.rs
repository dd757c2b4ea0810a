//! Selection transitions.

use crate::classification::state::{ClassificationStatus, StudyClassification};

/// Include at selection. Extraction is unaffected.
pub fn include(state: StudyClassification) -> StudyClassification {
    StudyClassification::with_statuses(ClassificationStatus::Included, state.extraction())
}

/// Exclude at selection.
///
/// An extraction that is INCLUDED or still UNCLASSIFIED is excluded as well;
/// an extraction already EXCLUDED or DUPLICATED is kept as it is.
pub fn exclude(state: StudyClassification) -> StudyClassification {
    let extraction = match state.extraction() {
        ClassificationStatus::Included | ClassificationStatus::Unclassified => {
            ClassificationStatus::Excluded
        }
        other @ (ClassificationStatus::Excluded | ClassificationStatus::Duplicated) => other,
    };
    StudyClassification::with_statuses(ClassificationStatus::Excluded, extraction)
}

/// Unclassify at selection. A study that is no longer screened cannot keep
/// a downstream extraction decision, so both phases are reset.
pub fn unclassify(_state: StudyClassification) -> StudyClassification {
    StudyClassification::new()
}
