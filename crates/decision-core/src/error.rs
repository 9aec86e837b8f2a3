use thiserror::Error;

use crate::types::DecisionId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing collaborator data: {0}")]
    MissingCollaboratorData(String),

    #[error("Unknown decision: {0}")]
    UnknownDecision(DecisionId),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
}

impl DecisionError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        DecisionError::InvalidConfiguration(msg.into())
    }
}
