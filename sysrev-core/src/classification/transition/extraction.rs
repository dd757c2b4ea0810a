//! Extraction transitions.

use super::TransitionError;
use crate::classification::state::{ClassificationStatus, StudyClassification};

/// Include at extraction.
///
/// Rejected if the study was excluded at selection. An undecided selection is
/// promoted to INCLUDED, since reaching extraction implies passing selection.
pub fn include(state: StudyClassification) -> Result<StudyClassification, TransitionError> {
    let selection = match state.selection() {
        ClassificationStatus::Excluded => return Err(TransitionError::ExcludedInSelection),
        ClassificationStatus::Unclassified => ClassificationStatus::Included,
        other => other,
    };
    Ok(StudyClassification::with_statuses(
        selection,
        ClassificationStatus::Included,
    ))
}

/// Exclude at extraction. An undecided selection is excluded too.
pub fn exclude(state: StudyClassification) -> StudyClassification {
    let selection = match state.selection() {
        ClassificationStatus::Unclassified => ClassificationStatus::Excluded,
        other => other,
    };
    StudyClassification::with_statuses(selection, ClassificationStatus::Excluded)
}

/// Unclassify at extraction. Selection is untouched.
pub fn unclassify(state: StudyClassification) -> StudyClassification {
    StudyClassification::with_statuses(state.selection(), ClassificationStatus::Unclassified)
}

#[cfg(test)]
mod tests {
    use super::super::tests::state;
    use super::*;
    use ClassificationStatus::{Duplicated, Excluded, Included, Unclassified};

    #[test]
    fn test_include_promotes_undecided_selection() {
        let next = include(state(Unclassified, Unclassified)).unwrap();
        assert_eq!((next.selection(), next.extraction()), (Included, Included));
    }

    #[test]
    fn test_include_keeps_included_selection() {
        let next = include(state(Included, Excluded)).unwrap();
        assert_eq!((next.selection(), next.extraction()), (Included, Included));
    }

    #[test]
    fn test_include_keeps_duplicated_selection() {
        let next = include(state(Duplicated, Duplicated)).unwrap();
        assert_eq!((next.selection(), next.extraction()), (Duplicated, Included));
    }

    #[test]
    fn test_include_rejected_when_excluded_in_selection() {
        for extraction in [Unclassified, Excluded, Duplicated] {
            assert_eq!(
                include(state(Excluded, extraction)),
                Err(TransitionError::ExcludedInSelection)
            );
        }
    }

    #[test]
    fn test_exclude_excludes_undecided_selection() {
        let next = exclude(state(Unclassified, Unclassified));
        assert_eq!((next.selection(), next.extraction()), (Excluded, Excluded));
    }

    #[test]
    fn test_exclude_keeps_decided_selection() {
        let next = exclude(state(Included, Included));
        assert_eq!((next.selection(), next.extraction()), (Included, Excluded));
    }

    #[test]
    fn test_unclassify_keeps_selection() {
        let next = unclassify(state(Included, Included));
        assert_eq!((next.selection(), next.extraction()), (Included, Unclassified));

        let next = unclassify(state(Excluded, Excluded));
        assert_eq!((next.selection(), next.extraction()), (Excluded, Unclassified));
    }
}
