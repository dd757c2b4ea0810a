//! Systematic studies and their collaborators.
//!
//! The owner is always a collaborator. Only collaborators may read or
//! classify the study reviews of a systematic study.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::ids::{ResearcherId, SystematicStudyId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SystematicStudyError {
    #[error("{field} can not be blank")]
    BlankField { field: &'static str },

    #[error("the owner can not be removed from the collaborators")]
    OwnerRemoval,

    #[error("researcher {0} is not a collaborator")]
    NotCollaborator(ResearcherId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystematicStudy {
    id: SystematicStudyId,
    pub title: String,
    pub description: String,
    owner: ResearcherId,
    collaborators: BTreeSet<ResearcherId>,
}

impl SystematicStudy {
    pub fn new(
        id: SystematicStudyId,
        title: impl Into<String>,
        description: impl Into<String>,
        owner: ResearcherId,
    ) -> Result<Self, SystematicStudyError> {
        let title = title.into();
        let description = description.into();
        if title.trim().is_empty() {
            return Err(SystematicStudyError::BlankField { field: "title" });
        }
        if description.trim().is_empty() {
            return Err(SystematicStudyError::BlankField {
                field: "description",
            });
        }
        Ok(Self {
            id,
            title,
            description,
            owner,
            collaborators: BTreeSet::from([owner]),
        })
    }

    pub fn id(&self) -> SystematicStudyId {
        self.id
    }

    pub fn owner(&self) -> ResearcherId {
        self.owner
    }

    pub fn collaborators(&self) -> &BTreeSet<ResearcherId> {
        &self.collaborators
    }

    pub fn contains_collaborator(&self, researcher: ResearcherId) -> bool {
        self.collaborators.contains(&researcher)
    }

    pub fn add_collaborator(&mut self, researcher: ResearcherId) -> bool {
        self.collaborators.insert(researcher)
    }

    pub fn remove_collaborator(&mut self, researcher: ResearcherId) -> Result<(), SystematicStudyError> {
        if researcher == self.owner {
            return Err(SystematicStudyError::OwnerRemoval);
        }
        if !self.collaborators.remove(&researcher) {
            return Err(SystematicStudyError::NotCollaborator(researcher));
        }
        Ok(())
    }

    /// Hand the study over to another researcher, who becomes a collaborator
    /// if they were not one already.
    pub fn change_owner(&mut self, researcher: ResearcherId) {
        self.collaborators.insert(researcher);
        self.owner = researcher;
    }
}
