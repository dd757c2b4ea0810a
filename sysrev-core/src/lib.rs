pub mod classification;
pub mod ids;
pub mod study;
pub mod systematic_study;

pub use classification::{
    transition, ClassificationEvent, ClassificationStatus, ParseStatusError, Phase,
    StudyClassification, TransitionError, TransitionResult,
};
pub use ids::*;
pub use study::*;
pub use systematic_study::*;
