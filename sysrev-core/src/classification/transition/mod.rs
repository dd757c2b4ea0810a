//! Pure state transition function.
//!
//! The transition function takes the current classification and an event and
//! returns the new classification, or an error if the event is not allowed in
//! the current state. It has no side effects; a rejected event leaves the
//! caller's value untouched.
//!
//! Each phase has its own handler module with co-located tests:
//! - `selection`: title/abstract screening decisions
//! - `extraction`: full-text extraction decisions
//! - `duplicate`: duplicate marking

mod duplicate;
mod extraction;
mod selection;

use thiserror::Error;

use super::event::{ClassificationEvent, Phase};
use super::state::{ClassificationStatus, StudyClassification};

/// Errors raised by classification transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// A study rejected at selection cannot be pulled into extraction.
    #[error("a study excluded during selection can not be included during extraction")]
    ExcludedInSelection,

    /// The status exists but cannot be requested through this phase.
    #[error("status {status} can not be assigned during {phase}; mark the study as duplicated instead")]
    StatusNotAssignable {
        phase: Phase,
        status: ClassificationStatus,
    },

    /// A stored status pair that no sequence of transitions produces.
    #[error("inconsistent classification: selection {selection}, extraction {extraction}")]
    Inconsistent {
        selection: ClassificationStatus,
        extraction: ClassificationStatus,
    },

    /// A study review was marked as a duplicate of itself.
    #[error("a study review can not be marked as a duplicate of itself")]
    SelfDuplicate,
}

/// Result of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionResult {
    /// Classification before the event.
    pub from: StudyClassification,
    /// Classification after the event.
    pub to: StudyClassification,
}

impl TransitionResult {
    pub fn new(from: StudyClassification, to: StudyClassification) -> Self {
        Self { from, to }
    }

    /// Returns true if the event did not change either status.
    pub fn is_no_change(&self) -> bool {
        self.from == self.to
    }
}

/// Pure state transition function.
///
/// Given the current classification and an event, returns the old and new
/// classification. Errors leave nothing to undo since nothing is mutated.
pub fn transition(
    state: StudyClassification,
    event: ClassificationEvent,
) -> Result<TransitionResult, TransitionError> {
    let next = match event {
        ClassificationEvent::IncludeInSelection => selection::include(state),
        ClassificationEvent::ExcludeInSelection => selection::exclude(state),
        ClassificationEvent::UnclassifyInSelection => selection::unclassify(state),
        ClassificationEvent::IncludeInExtraction => extraction::include(state)?,
        ClassificationEvent::ExcludeInExtraction => extraction::exclude(state),
        ClassificationEvent::UnclassifyInExtraction => extraction::unclassify(state),
        ClassificationEvent::MarkAsDuplicated => duplicate::mark(state),
    };
    Ok(TransitionResult::new(state, next))
}

/// In-place operations, one per event.
///
/// Each returns the post-transition pair. The only fallible one is
/// `include_in_extraction`, which leaves `self` unchanged on error.
impl StudyClassification {
    /// Apply an event in place.
    pub fn apply(
        &mut self,
        event: ClassificationEvent,
    ) -> Result<TransitionResult, TransitionError> {
        let result = transition(*self, event)?;
        *self = result.to;
        Ok(result)
    }

    pub fn include_in_selection(&mut self) -> StudyClassification {
        *self = selection::include(*self);
        *self
    }

    pub fn exclude_in_selection(&mut self) -> StudyClassification {
        *self = selection::exclude(*self);
        *self
    }

    pub fn unclassify_in_selection(&mut self) -> StudyClassification {
        *self = selection::unclassify(*self);
        *self
    }

    pub fn include_in_extraction(&mut self) -> Result<StudyClassification, TransitionError> {
        *self = extraction::include(*self)?;
        Ok(*self)
    }

    pub fn exclude_in_extraction(&mut self) -> StudyClassification {
        *self = extraction::exclude(*self);
        *self
    }

    pub fn unclassify_in_extraction(&mut self) -> StudyClassification {
        *self = extraction::unclassify(*self);
        *self
    }

    pub fn mark_as_duplicated(&mut self) -> StudyClassification {
        *self = duplicate::mark(*self);
        *self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use ClassificationStatus::{Duplicated, Excluded, Included, Unclassified};

    pub(crate) fn state(
        selection: ClassificationStatus,
        extraction: ClassificationStatus,
    ) -> StudyClassification {
        StudyClassification::from_statuses(selection, extraction).unwrap()
    }

    fn pair(classification: StudyClassification) -> (ClassificationStatus, ClassificationStatus) {
        (classification.selection(), classification.extraction())
    }

    #[test]
    fn test_include_in_extraction_from_unclassified_includes_both() {
        let result = transition(
            state(Unclassified, Unclassified),
            ClassificationEvent::IncludeInExtraction,
        )
        .unwrap();
        assert_eq!(pair(result.to), (Included, Included));
    }

    #[test]
    fn test_exclude_in_selection_from_unclassified_excludes_both() {
        let result = transition(
            state(Unclassified, Unclassified),
            ClassificationEvent::ExcludeInSelection,
        )
        .unwrap();
        assert_eq!(pair(result.to), (Excluded, Excluded));
    }

    #[test]
    fn test_exclude_in_selection_cascades_over_included_extraction() {
        let result = transition(
            state(Included, Included),
            ClassificationEvent::ExcludeInSelection,
        )
        .unwrap();
        assert_eq!(pair(result.to), (Excluded, Excluded));
    }

    #[test]
    fn test_exclude_in_selection_keeps_excluded_extraction() {
        let result = transition(
            state(Included, Excluded),
            ClassificationEvent::ExcludeInSelection,
        )
        .unwrap();
        assert_eq!(pair(result.to), (Excluded, Excluded));
    }

    #[test]
    fn test_include_in_extraction_rejected_after_selection_exclusion() {
        let before = state(Excluded, Unclassified);
        let result = transition(before, ClassificationEvent::IncludeInExtraction);
        assert_eq!(result, Err(TransitionError::ExcludedInSelection));

        let mut classification = before;
        assert!(classification.include_in_extraction().is_err());
        assert_eq!(classification, before);
    }

    #[test]
    fn test_exclude_in_extraction_from_unclassified_excludes_both() {
        let result = transition(
            state(Unclassified, Unclassified),
            ClassificationEvent::ExcludeInExtraction,
        )
        .unwrap();
        assert_eq!(pair(result.to), (Excluded, Excluded));
    }

    #[test]
    fn test_apply_mutates_in_place_and_reports_both_ends() {
        let mut classification = StudyClassification::new();
        let result = classification
            .apply(ClassificationEvent::IncludeInSelection)
            .unwrap();
        assert_eq!(pair(result.from), (Unclassified, Unclassified));
        assert_eq!(pair(result.to), (Included, Unclassified));
        assert_eq!(classification, result.to);
        assert!(!result.is_no_change());
    }

    #[test]
    fn test_apply_error_leaves_value_untouched() {
        let mut classification = state(Excluded, Excluded);
        let before = classification;
        assert!(classification
            .apply(ClassificationEvent::IncludeInExtraction)
            .is_err());
        assert_eq!(classification, before);
    }

    #[test]
    fn test_repeated_event_is_no_change() {
        let mut classification = state(Included, Unclassified);
        let result = classification
            .apply(ClassificationEvent::IncludeInSelection)
            .unwrap();
        assert!(result.is_no_change());
    }

    #[test]
    fn test_in_place_methods_return_post_transition_pair() {
        let mut classification = StudyClassification::new();
        assert_eq!(pair(classification.include_in_selection()), (Included, Unclassified));
        assert_eq!(
            pair(classification.include_in_extraction().unwrap()),
            (Included, Included)
        );
        assert_eq!(pair(classification.unclassify_in_extraction()), (Included, Unclassified));
        assert_eq!(pair(classification.exclude_in_extraction()), (Included, Excluded));
        assert_eq!(pair(classification.exclude_in_selection()), (Excluded, Excluded));
        assert_eq!(
            pair(classification.unclassify_in_selection()),
            (Unclassified, Unclassified)
        );
        assert_eq!(pair(classification.mark_as_duplicated()), (Duplicated, Duplicated));
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    pub(crate) fn arb_event() -> impl Strategy<Value = ClassificationEvent> {
        prop_oneof![
            Just(ClassificationEvent::IncludeInSelection),
            Just(ClassificationEvent::ExcludeInSelection),
            Just(ClassificationEvent::UnclassifyInSelection),
            Just(ClassificationEvent::IncludeInExtraction),
            Just(ClassificationEvent::ExcludeInExtraction),
            Just(ClassificationEvent::UnclassifyInExtraction),
            Just(ClassificationEvent::MarkAsDuplicated),
        ]
    }

    /// Any classification reachable from a fresh record.
    pub(crate) fn arb_reachable_state() -> impl Strategy<Value = StudyClassification> {
        proptest::collection::vec(arb_event(), 0..12).prop_map(|events| {
            let mut classification = StudyClassification::new();
            for event in events {
                let _ = classification.apply(event);
            }
            classification
        })
    }

    proptest! {
        /// Property: extraction INCLUDED never coexists with selection EXCLUDED.
        #[test]
        fn included_extraction_never_follows_excluded_selection(
            events in proptest::collection::vec(arb_event(), 0..40)
        ) {
            let mut classification = StudyClassification::new();
            for event in events {
                let _ = classification.apply(event);
                prop_assert!(
                    !(classification.extraction() == Included
                        && classification.selection() == Excluded),
                    "reached {} after {:?}",
                    classification,
                    event
                );
            }
        }

        /// Property: unclassifying in selection always reaches the initial state.
        #[test]
        fn unclassify_in_selection_resets_everything(start in arb_reachable_state()) {
            let mut classification = start;
            classification.unclassify_in_selection();
            prop_assert_eq!(classification, StudyClassification::new());
            // Applying it again stays at the fixed point.
            classification.unclassify_in_selection();
            prop_assert_eq!(classification, StudyClassification::new());
        }

        /// Property: a rejected event never changes the state.
        #[test]
        fn rejected_events_change_nothing(start in arb_reachable_state(), event in arb_event()) {
            let mut classification = start;
            if classification.apply(event).is_err() {
                prop_assert_eq!(classification, start);
            }
        }

        /// Property: every reachable state survives a JSON round-trip.
        #[test]
        fn reachable_states_deserialize(start in arb_reachable_state()) {
            let json = serde_json::to_string(&start).unwrap();
            let back: StudyClassification = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, start);
        }

        /// Property: unclassifying in extraction never touches selection.
        #[test]
        fn unclassify_in_extraction_keeps_selection(start in arb_reachable_state()) {
            let mut classification = start;
            classification.unclassify_in_extraction();
            prop_assert_eq!(classification.selection(), start.selection());
            prop_assert_eq!(classification.extraction(), Unclassified);
        }
    }
}
