//! State types for the classification state machine.
//!
//! A classification is a pair of statuses. Fields are private: the only way
//! to move from one pair to another is through the transition function, so
//! the cross-phase invariants are checked in exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::transition::TransitionError;

/// Error returned when status text at a boundary is not a known name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {kind} '{value}' (expected one of {expected})")]
pub struct ParseStatusError {
    /// What was being parsed, e.g. "classification status".
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Comma-separated list of accepted names.
    pub expected: &'static str,
}

/// Outcome of one review phase for a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationStatus {
    /// No decision has been recorded yet.
    #[default]
    Unclassified,
    Included,
    Excluded,
    /// The study is a duplicate of another study review.
    Duplicated,
}

impl ClassificationStatus {
    pub const ALL: [Self; 4] = [
        Self::Unclassified,
        Self::Included,
        Self::Excluded,
        Self::Duplicated,
    ];

    /// The upper-case name used in JSON, SQLite and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassified => "UNCLASSIFIED",
            Self::Included => "INCLUDED",
            Self::Excluded => "EXCLUDED",
            Self::Duplicated => "DUPLICATED",
        }
    }
}

impl fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassificationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError {
                kind: "classification status",
                value: s.to_string(),
                expected: "UNCLASSIFIED, INCLUDED, EXCLUDED, DUPLICATED",
            })
    }
}

/// Selection and extraction status of a single study review.
///
/// Created as (UNCLASSIFIED, UNCLASSIFIED). Deserialization rejects pairs that
/// no sequence of transitions can reach, so a stored record cannot smuggle in
/// an extraction inclusion for a study excluded at selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawClassification")]
pub struct StudyClassification {
    selection_status: ClassificationStatus,
    extraction_status: ClassificationStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClassification {
    selection_status: ClassificationStatus,
    extraction_status: ClassificationStatus,
}

impl TryFrom<RawClassification> for StudyClassification {
    type Error = TransitionError;

    fn try_from(raw: RawClassification) -> Result<Self, Self::Error> {
        Self::from_statuses(raw.selection_status, raw.extraction_status)
    }
}

impl StudyClassification {
    /// A freshly registered study: nothing decided in either phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a classification from stored statuses.
    ///
    /// Fails if extraction is INCLUDED while selection is EXCLUDED.
    pub fn from_statuses(
        selection: ClassificationStatus,
        extraction: ClassificationStatus,
    ) -> Result<Self, TransitionError> {
        if selection == ClassificationStatus::Excluded
            && extraction == ClassificationStatus::Included
        {
            return Err(TransitionError::Inconsistent {
                selection,
                extraction,
            });
        }
        Ok(Self::with_statuses(selection, extraction))
    }

    /// Unchecked constructor for transition handlers.
    pub(crate) fn with_statuses(
        selection: ClassificationStatus,
        extraction: ClassificationStatus,
    ) -> Self {
        Self {
            selection_status: selection,
            extraction_status: extraction,
        }
    }

    pub fn selection(&self) -> ClassificationStatus {
        self.selection_status
    }

    pub fn extraction(&self) -> ClassificationStatus {
        self.extraction_status
    }

    /// Returns true if neither phase has a decision.
    pub fn is_unclassified(&self) -> bool {
        self.selection_status == ClassificationStatus::Unclassified
            && self.extraction_status == ClassificationStatus::Unclassified
    }
}

impl fmt::Display for StudyClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(selection: {}, extraction: {})",
            self.selection_status, self.extraction_status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_accepts_exact_names() {
        for status in ClassificationStatus::ALL {
            assert_eq!(status.as_str().parse::<ClassificationStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_is_case_sensitive() {
        let err = "included".parse::<ClassificationStatus>().unwrap_err();
        assert_eq!(err.value, "included");
        assert_eq!(err.kind, "classification status");
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!("MAYBE".parse::<ClassificationStatus>().is_err());
        assert!("".parse::<ClassificationStatus>().is_err());
        assert!(" INCLUDED".parse::<ClassificationStatus>().is_err());
    }

    #[test]
    fn test_new_classification_is_unclassified() {
        let classification = StudyClassification::new();
        assert_eq!(classification.selection(), ClassificationStatus::Unclassified);
        assert_eq!(classification.extraction(), ClassificationStatus::Unclassified);
        assert!(classification.is_unclassified());
    }

    #[test]
    fn test_from_statuses_rejects_included_extraction_after_excluded_selection() {
        let result = StudyClassification::from_statuses(
            ClassificationStatus::Excluded,
            ClassificationStatus::Included,
        );
        assert!(matches!(result, Err(TransitionError::Inconsistent { .. })));
    }

    #[test]
    fn test_serializes_with_upper_case_names() {
        let classification = StudyClassification::from_statuses(
            ClassificationStatus::Included,
            ClassificationStatus::Excluded,
        )
        .unwrap();
        let json = serde_json::to_value(classification).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "selectionStatus": "INCLUDED",
                "extractionStatus": "EXCLUDED"
            })
        );
    }

    #[test]
    fn test_deserialize_rejects_unreachable_pair() {
        let json = r#"{"selectionStatus":"EXCLUDED","extractionStatus":"INCLUDED"}"#;
        let result: Result<StudyClassification, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        let classification = StudyClassification::new();
        assert_eq!(
            classification.to_string(),
            "(selection: UNCLASSIFIED, extraction: UNCLASSIFIED)"
        );
    }
}
