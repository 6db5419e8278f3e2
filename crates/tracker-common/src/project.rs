use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorId, ProjectId, SiteId};

pub const PROJECT_KEY_MIN_LEN: usize = 3;
pub const PROJECT_KEY_MAX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectKeyError {
    #[error("Project key must be {min}-{max} characters, got {len}")]
    Length { len: usize, min: usize, max: usize },

    #[error("Project key must start with an uppercase letter")]
    LeadingCharacter,

    #[error("Project key may only contain uppercase letters and digits, found '{0}'")]
    InvalidCharacter(char),
}

/// Short uppercase identifier of a project, unique within its site
/// (e.g. `WEB`, `OPS2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectKey(String);

impl ProjectKey {
    pub fn parse(raw: &str) -> Result<Self, ProjectKeyError> {
        let len = raw.chars().count();
        if !(PROJECT_KEY_MIN_LEN..=PROJECT_KEY_MAX_LEN).contains(&len) {
            return Err(ProjectKeyError::Length {
                len,
                min: PROJECT_KEY_MIN_LEN,
                max: PROJECT_KEY_MAX_LEN,
            });
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit()))
        {
            return Err(ProjectKeyError::InvalidCharacter(bad));
        }
        if !raw.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(ProjectKeyError::LeadingCharacter);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProjectKey {
    type Error = ProjectKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectKey> for String {
    fn from(key: ProjectKey) -> Self {
        key.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub site_id: SiteId,
    pub name: String,
    pub key: ProjectKey,
    pub is_private: bool,
    /// The creator holds PM-equivalent capabilities on this project
    /// regardless of any recorded project role.
    pub created_by: ActorId,
}
