//! Study review records.
//!
//! A study review is one bibliographic record being screened inside one
//! systematic study. It owns its classification; the record and its
//! classification are created and destroyed together.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::classification::{
    ClassificationEvent, ParseStatusError, StudyClassification, TransitionError, TransitionResult,
};
use crate::ids::{QuestionId, StudyReviewId, SystematicStudyId};

/// Errors raised by study review operations outside the classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudyError {
    #[error("the study must be related to at least one search source")]
    NoSearchSource,

    #[error("search source '{0}' is not related to this study")]
    UnknownSearchSource(String),

    #[error("answer can not be blank")]
    BlankAnswer,

    #[error("{field} can not be blank")]
    BlankField { field: &'static str },
}

/// How soon a researcher intends to read the full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingPriority {
    VeryLow,
    #[default]
    Low,
    High,
    VeryHigh,
}

impl ReadingPriority {
    pub const ALL: [Self; 4] = [Self::VeryLow, Self::Low, Self::High, Self::VeryHigh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "VERY_LOW",
            Self::Low => "LOW",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY_HIGH",
        }
    }
}

impl fmt::Display for ReadingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingPriority {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| ParseStatusError {
                kind: "reading priority",
                value: s.to_string(),
                expected: "VERY_LOW, LOW, HIGH, VERY_HIGH",
            })
    }
}

/// Answer to a data-extraction form question or a quality question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Answer {
    /// Free text; must not be blank.
    Textual(String),
    /// A number on a bounded scale.
    NumberScale(i64),
    /// One option out of a pick list.
    PickList(String),
    /// A labelled point on a scale, e.g. "Good" = 3.
    LabeledScale { label: String, value: i32 },
}

impl Answer {
    /// Reject answers that carry no information.
    pub fn validate(&self) -> Result<(), StudyError> {
        match self {
            Self::Textual(text) | Self::PickList(text) if text.trim().is_empty() => {
                Err(StudyError::BlankAnswer)
            }
            Self::LabeledScale { label, .. } if label.trim().is_empty() => {
                Err(StudyError::BlankAnswer)
            }
            _ => Ok(()),
        }
    }
}

/// Which answer sheet a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerSheet {
    Form,
    Quality,
}

/// Bibliographic data of the underlying study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyMetadata {
    /// Entry type, e.g. "ARTICLE" or "INPROCEEDINGS".
    pub study_type: String,
    pub title: String,
    pub year: i32,
    pub authors: String,
    pub venue: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

/// A study being screened within one systematic study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyReview {
    id: StudyReviewId,
    systematic_study_id: SystematicStudyId,
    #[serde(flatten)]
    pub metadata: StudyMetadata,
    search_sources: BTreeSet<String>,
    #[serde(default)]
    criteria: BTreeSet<String>,
    #[serde(default)]
    form_answers: BTreeMap<QuestionId, Answer>,
    #[serde(default)]
    quality_answers: BTreeMap<QuestionId, Answer>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub reading_priority: ReadingPriority,
    #[serde(flatten)]
    classification: StudyClassification,
}

impl StudyReview {
    /// Register a study. It starts unclassified in both phases.
    ///
    /// At least one search source is required; blank titles are rejected.
    pub fn new(
        id: StudyReviewId,
        systematic_study_id: SystematicStudyId,
        metadata: StudyMetadata,
        search_sources: impl IntoIterator<Item = String>,
    ) -> Result<Self, StudyError> {
        if metadata.title.trim().is_empty() {
            return Err(StudyError::BlankField { field: "title" });
        }
        let search_sources: BTreeSet<String> = search_sources
            .into_iter()
            .filter(|source| !source.trim().is_empty())
            .collect();
        if search_sources.is_empty() {
            return Err(StudyError::NoSearchSource);
        }
        Ok(Self {
            id,
            systematic_study_id,
            metadata,
            search_sources,
            criteria: BTreeSet::new(),
            form_answers: BTreeMap::new(),
            quality_answers: BTreeMap::new(),
            comments: String::new(),
            reading_priority: ReadingPriority::default(),
            classification: StudyClassification::new(),
        })
    }

    pub fn id(&self) -> StudyReviewId {
        self.id
    }

    pub fn systematic_study_id(&self) -> SystematicStudyId {
        self.systematic_study_id
    }

    pub fn classification(&self) -> StudyClassification {
        self.classification
    }

    /// Run a classification event against this record.
    pub fn classify(
        &mut self,
        event: ClassificationEvent,
    ) -> Result<TransitionResult, TransitionError> {
        self.classification.apply(event)
    }

    /// Mark this record as a duplicate of `kept`.
    ///
    /// The kept record absorbs this record's search sources so the evidence
    /// of where the study was found is not lost.
    pub fn mark_as_duplicate_of(
        &mut self,
        kept: &mut StudyReview,
    ) -> Result<TransitionResult, TransitionError> {
        if self.id == kept.id && self.systematic_study_id == kept.systematic_study_id {
            return Err(TransitionError::SelfDuplicate);
        }
        kept.search_sources.extend(self.search_sources.iter().cloned());
        self.classification.apply(ClassificationEvent::MarkAsDuplicated)
    }

    pub fn search_sources(&self) -> &BTreeSet<String> {
        &self.search_sources
    }

    pub fn has_search_source(&self, source: &str) -> bool {
        self.search_sources.contains(source)
    }

    pub fn add_search_source(&mut self, source: impl Into<String>) -> bool {
        self.search_sources.insert(source.into())
    }

    /// Remove a search source. The last one cannot be removed.
    pub fn remove_search_source(&mut self, source: &str) -> Result<(), StudyError> {
        if !self.search_sources.contains(source) {
            return Err(StudyError::UnknownSearchSource(source.to_string()));
        }
        if self.search_sources.len() == 1 {
            return Err(StudyError::NoSearchSource);
        }
        self.search_sources.remove(source);
        Ok(())
    }

    pub fn criteria(&self) -> &BTreeSet<String> {
        &self.criteria
    }

    pub fn add_criterion(&mut self, criterion: impl Into<String>) -> bool {
        self.criteria.insert(criterion.into())
    }

    pub fn remove_criterion(&mut self, criterion: &str) -> bool {
        self.criteria.remove(criterion)
    }

    pub fn answers(&self, sheet: AnswerSheet) -> &BTreeMap<QuestionId, Answer> {
        match sheet {
            AnswerSheet::Form => &self.form_answers,
            AnswerSheet::Quality => &self.quality_answers,
        }
    }

    /// Record an answer, replacing any previous answer to the same question.
    pub fn answer(
        &mut self,
        sheet: AnswerSheet,
        question: QuestionId,
        answer: Answer,
    ) -> Result<Option<Answer>, StudyError> {
        answer.validate()?;
        let answers = match sheet {
            AnswerSheet::Form => &mut self.form_answers,
            AnswerSheet::Quality => &mut self.quality_answers,
        };
        Ok(answers.insert(question, answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::ClassificationStatus;
    use uuid::Uuid;

    fn metadata(title: &str) -> StudyMetadata {
        StudyMetadata {
            study_type: "ARTICLE".to_string(),
            title: title.to_string(),
            year: 2021,
            authors: "Ada Lovelace".to_string(),
            venue: "Journal of Reviews".to_string(),
            abstract_text: "An abstract".to_string(),
            keywords: BTreeSet::from(["screening".to_string()]),
            references: vec![],
            doi: Some("10.1000/xyz123".to_string()),
        }
    }

    fn study(id: i64, sources: &[&str]) -> StudyReview {
        StudyReview::new(
            StudyReviewId(id),
            SystematicStudyId(Uuid::nil()),
            metadata("A study"),
            sources.iter().map(|s| s.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_requires_search_source() {
        let result = StudyReview::new(
            StudyReviewId(1),
            SystematicStudyId(Uuid::nil()),
            metadata("A study"),
            Vec::<String>::new(),
        );
        assert_eq!(result.unwrap_err(), StudyError::NoSearchSource);
    }

    #[test]
    fn test_new_ignores_blank_search_sources() {
        let result = StudyReview::new(
            StudyReviewId(1),
            SystematicStudyId(Uuid::nil()),
            metadata("A study"),
            vec!["  ".to_string()],
        );
        assert_eq!(result.unwrap_err(), StudyError::NoSearchSource);
    }

    #[test]
    fn test_new_rejects_blank_title() {
        let result = StudyReview::new(
            StudyReviewId(1),
            SystematicStudyId(Uuid::nil()),
            metadata(" "),
            vec!["Scopus".to_string()],
        );
        assert_eq!(result.unwrap_err(), StudyError::BlankField { field: "title" });
    }

    #[test]
    fn test_new_study_is_unclassified_with_low_priority() {
        let review = study(1, &["Scopus"]);
        assert!(review.classification().is_unclassified());
        assert_eq!(review.reading_priority, ReadingPriority::Low);
    }

    #[test]
    fn test_cannot_remove_last_search_source() {
        let mut review = study(1, &["Scopus"]);
        assert_eq!(
            review.remove_search_source("Scopus"),
            Err(StudyError::NoSearchSource)
        );
        assert!(review.has_search_source("Scopus"));
    }

    #[test]
    fn test_remove_search_source() {
        let mut review = study(1, &["Scopus", "IEEE"]);
        review.remove_search_source("IEEE").unwrap();
        assert!(!review.has_search_source("IEEE"));
        assert_eq!(
            review.remove_search_source("ACM"),
            Err(StudyError::UnknownSearchSource("ACM".to_string()))
        );
    }

    #[test]
    fn test_criteria() {
        let mut review = study(1, &["Scopus"]);
        assert!(review.add_criterion("IC1"));
        assert!(!review.add_criterion("IC1"));
        assert!(review.remove_criterion("IC1"));
        assert!(review.criteria().is_empty());
    }

    #[test]
    fn test_answer_replaces_previous_answer() {
        let mut review = study(1, &["Scopus"]);
        let question = QuestionId(Uuid::new_v4());

        let previous = review
            .answer(AnswerSheet::Form, question, Answer::Textual("first".into()))
            .unwrap();
        assert!(previous.is_none());

        let previous = review
            .answer(AnswerSheet::Form, question, Answer::NumberScale(4))
            .unwrap();
        assert_eq!(previous, Some(Answer::Textual("first".into())));
        assert_eq!(
            review.answers(AnswerSheet::Form).get(&question),
            Some(&Answer::NumberScale(4))
        );
        assert!(review.answers(AnswerSheet::Quality).is_empty());
    }

    #[test]
    fn test_blank_answer_rejected() {
        let mut review = study(1, &["Scopus"]);
        let question = QuestionId(Uuid::new_v4());
        assert_eq!(
            review.answer(AnswerSheet::Quality, question, Answer::Textual("".into())),
            Err(StudyError::BlankAnswer)
        );
        assert!(review.answers(AnswerSheet::Quality).is_empty());
    }

    #[test]
    fn test_mark_as_duplicate_merges_sources() {
        let mut kept = study(1, &["Scopus"]);
        let mut duplicate = study(2, &["IEEE"]);

        duplicate.mark_as_duplicate_of(&mut kept).unwrap();

        assert_eq!(
            duplicate.classification().selection(),
            ClassificationStatus::Duplicated
        );
        assert_eq!(
            duplicate.classification().extraction(),
            ClassificationStatus::Duplicated
        );
        assert!(kept.has_search_source("IEEE"));
        assert!(kept.classification().is_unclassified());
    }

    #[test]
    fn test_cannot_duplicate_itself() {
        let mut review = study(1, &["Scopus"]);
        let mut same = review.clone();
        assert_eq!(
            review.mark_as_duplicate_of(&mut same),
            Err(TransitionError::SelfDuplicate)
        );
    }

    #[test]
    fn test_classify_rejected_keeps_record() {
        let mut review = study(1, &["Scopus"]);
        review
            .classify(ClassificationEvent::ExcludeInSelection)
            .unwrap();
        let before = review.clone();
        assert!(review
            .classify(ClassificationEvent::IncludeInExtraction)
            .is_err());
        assert_eq!(review, before);
    }

    #[test]
    fn test_json_shape() {
        let review = study(7, &["Scopus"]);
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["abstract"], "An abstract");
        assert_eq!(json["selectionStatus"], "UNCLASSIFIED");
        assert_eq!(json["extractionStatus"], "UNCLASSIFIED");
        assert_eq!(json["readingPriority"], "LOW");

        let back: StudyReview = serde_json::from_value(json).unwrap();
        assert_eq!(back, review);
    }

    #[test]
    fn test_reading_priority_parse() {
        assert_eq!("VERY_HIGH".parse::<ReadingPriority>(), Ok(ReadingPriority::VeryHigh));
        assert!("URGENT".parse::<ReadingPriority>().is_err());
    }
}
