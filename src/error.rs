use serde::Serialize;
use thiserror::Error;

/// One offending record inside a rejected batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn new(index: usize, id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            index,
            id: id.map(str::to_string),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Out-of-domain or malformed input. Never coerced.
    #[error("validation failed: {message}")]
    Validation { message: String, issues: Vec<Issue> },

    /// A referenced entity is missing from the supplied snapshot.
    #[error("incomplete data: {entity} {id} not present in snapshot")]
    IncompleteData { entity: &'static str, id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("professor {professor_id} does not own this subject")]
    NotOwner { professor_id: String },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    /// Stable wire code used by the sidecar.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_failed",
            Self::IncompleteData { .. } => "incomplete_data",
            Self::NotFound { .. } => "not_found",
            Self::NotOwner { .. } => "not_owner",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation { issues, .. } if !issues.is_empty() => {
                serde_json::to_value(issues).ok()
            }
            Self::IncompleteData { entity, id } | Self::NotFound { entity, id } => {
                Some(serde_json::json!({ "entity": entity, "id": id }))
            }
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
