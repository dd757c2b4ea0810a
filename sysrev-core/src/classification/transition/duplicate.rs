//! Duplicate marking.

use crate::classification::state::{ClassificationStatus, StudyClassification};

/// Mark the study as a duplicate in both phases.
///
/// Which study is kept is the caller's concern; the classification only
/// records that this one is out of the review.
pub fn mark(_state: StudyClassification) -> StudyClassification {
    StudyClassification::with_statuses(
        ClassificationStatus::Duplicated,
        ClassificationStatus::Duplicated,
    )
}

#[cfg(test)]
mod tests {
    use super::super::tests::state;
    use super::*;
    use ClassificationStatus::{Duplicated, Excluded, Included, Unclassified};

    #[test]
    fn test_mark_overrides_any_decision() {
        for (selection, extraction) in [
            (Unclassified, Unclassified),
            (Included, Included),
            (Excluded, Excluded),
        ] {
            let next = mark(state(selection, extraction));
            assert_eq!((next.selection(), next.extraction()), (Duplicated, Duplicated));
        }
    }
}
