//! Error types for deck generation and session persistence.

use thiserror::Error;

use crate::state::AppState;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating or persisting a presentation.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a local file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The document store rejected or failed a load/save.
    #[error("Document store error: {0}")]
    StoreError(String),

    /// Context retrieval failed. Never fatal to a generation run.
    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    /// The drafting collaborator failed.
    #[error("Drafting error for \"{title}\": {message}")]
    DraftingError { title: String, message: String },

    /// The drafting collaborator returned no slide.
    #[error("Drafting returned no slide for \"{0}\"")]
    EmptyDraft(String),

    /// The critique collaborator failed.
    #[error("Critique error for \"{title}\": {message}")]
    CritiqueError { title: String, message: String },

    /// The upload endpoint failed.
    #[error("Upload error: {0}")]
    UploadError(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The requested state change is not part of the state machine.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: AppState, to: AppState },

    /// A field that may only be set once was set again.
    #[error("{0} has already been set")]
    AlreadySet(&'static str),
}

impl Error {
    /// Whether this error ends a generation run (drafting or critique failure).
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            Self::DraftingError { .. } | Self::EmptyDraft(_) | Self::CritiqueError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_failure_classification() {
        let drafting = Error::DraftingError {
            title: "Intro".into(),
            message: "boom".into(),
        };
        assert!(drafting.is_generation_failure());
        assert!(Error::EmptyDraft("Intro".into()).is_generation_failure());
        assert!(!Error::RetrievalError("offline".into()).is_generation_failure());
        assert!(!Error::StoreError("offline".into()).is_generation_failure());
    }

    #[test]
    fn test_transition_message() {
        let err = Error::InvalidTransition {
            from: AppState::Initial,
            to: AppState::Editing,
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition from initial to editing"
        );
    }
}
