//! Events that trigger classification transitions.
//!
//! Events are what a researcher (or the duplicate-detection workflow) asked
//! for. They are inputs to the pure transition function.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::ClassificationStatus;
use super::transition::TransitionError;

/// Review phase a status change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Selection,
    Extraction,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selection => write!(f, "selection"),
            Self::Extraction => write!(f, "extraction"),
        }
    }
}

/// All events that can change a study's classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationEvent {
    // =========================================================================
    // Selection (title/abstract screening)
    // =========================================================================
    IncludeInSelection,
    /// Also excludes in extraction unless extraction is already EXCLUDED or DUPLICATED.
    ExcludeInSelection,
    /// Resets both phases.
    UnclassifyInSelection,

    // =========================================================================
    // Extraction (full text)
    // =========================================================================
    /// Rejected when selection is EXCLUDED; promotes an undecided selection.
    IncludeInExtraction,
    /// Excludes an undecided selection as well.
    ExcludeInExtraction,
    UnclassifyInExtraction,

    // =========================================================================
    // Duplicate detection
    // =========================================================================
    /// The study is a duplicate of another study review in the same systematic study.
    MarkAsDuplicated,
}

impl ClassificationEvent {
    /// Map a requested status for a phase onto the event that produces it.
    ///
    /// DUPLICATED is a valid status but cannot be requested through a phase;
    /// it is only set by marking a study as a duplicate of another one.
    pub fn for_status(phase: Phase, status: ClassificationStatus) -> Result<Self, TransitionError> {
        use ClassificationStatus as S;
        match (phase, status) {
            (Phase::Selection, S::Included) => Ok(Self::IncludeInSelection),
            (Phase::Selection, S::Excluded) => Ok(Self::ExcludeInSelection),
            (Phase::Selection, S::Unclassified) => Ok(Self::UnclassifyInSelection),
            (Phase::Extraction, S::Included) => Ok(Self::IncludeInExtraction),
            (Phase::Extraction, S::Excluded) => Ok(Self::ExcludeInExtraction),
            (Phase::Extraction, S::Unclassified) => Ok(Self::UnclassifyInExtraction),
            (phase, S::Duplicated) => Err(TransitionError::StatusNotAssignable { phase, status }),
        }
    }

    /// Short name for logs.
    pub fn log_summary(&self) -> &'static str {
        match self {
            Self::IncludeInSelection => "IncludeInSelection",
            Self::ExcludeInSelection => "ExcludeInSelection",
            Self::UnclassifyInSelection => "UnclassifyInSelection",
            Self::IncludeInExtraction => "IncludeInExtraction",
            Self::ExcludeInExtraction => "ExcludeInExtraction",
            Self::UnclassifyInExtraction => "UnclassifyInExtraction",
            Self::MarkAsDuplicated => "MarkAsDuplicated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_status_maps_each_phase() {
        assert_eq!(
            ClassificationEvent::for_status(Phase::Selection, ClassificationStatus::Excluded),
            Ok(ClassificationEvent::ExcludeInSelection)
        );
        assert_eq!(
            ClassificationEvent::for_status(Phase::Extraction, ClassificationStatus::Included),
            Ok(ClassificationEvent::IncludeInExtraction)
        );
        assert_eq!(
            ClassificationEvent::for_status(Phase::Extraction, ClassificationStatus::Unclassified),
            Ok(ClassificationEvent::UnclassifyInExtraction)
        );
    }

    #[test]
    fn test_for_status_rejects_duplicated() {
        for phase in [Phase::Selection, Phase::Extraction] {
            let err =
                ClassificationEvent::for_status(phase, ClassificationStatus::Duplicated).unwrap_err();
            assert!(matches!(err, TransitionError::StatusNotAssignable { .. }));
        }
    }

    #[test]
    fn test_event_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ClassificationEvent::ExcludeInSelection).unwrap();
        assert_eq!(json, "\"EXCLUDE_IN_SELECTION\"");
    }
}
