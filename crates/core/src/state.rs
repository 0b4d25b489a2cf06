//! The application state machine.
//!
//! A session moves through `initial → clarifying → approving → generating →
//! editing`, with `error` reachable from anywhere and only left by a reset.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Presentation;

/// Stage of the deck pipeline the session is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    #[default]
    Initial,
    Clarifying,
    Approving,
    Generating,
    Editing,
    Error,
}

impl AppState {
    /// Position along the pipeline. `None` for the terminal error state.
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Initial => Some(0),
            Self::Clarifying => Some(1),
            Self::Approving => Some(2),
            Self::Generating => Some(3),
            Self::Editing => Some(4),
            Self::Error => None,
        }
    }

    /// Whether `self → next` is an allowed transition.
    ///
    /// Staying in place is always allowed, as is entering `error`.
    /// `editing → generating` supports regenerating a finished deck.
    pub fn can_transition_to(self, next: AppState) -> bool {
        if self == next || next == Self::Error {
            return true;
        }
        matches!(
            (self, next),
            (Self::Initial, Self::Clarifying)
                | (Self::Clarifying, Self::Approving)
                | (Self::Approving, Self::Generating)
                | (Self::Generating, Self::Editing)
                | (Self::Editing, Self::Generating)
        )
    }

    /// Validate and perform a transition.
    pub fn transition(self, next: AppState) -> Result<AppState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            log::debug!("Rejected AppState transition {} -> {}", self, next);
            Err(Error::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// The state implied by what the document already contains.
    pub fn derive(doc: &Presentation) -> AppState {
        if !doc.slides.is_empty() {
            Self::Editing
        } else if !doc.outline.is_empty() {
            Self::Generating
        } else if doc.clarified_goals.is_some() {
            Self::Approving
        } else if !doc.chat_history.is_empty() {
            Self::Clarifying
        } else {
            Self::Initial
        }
    }

    /// Combine a locally cached state with the document-derived one.
    ///
    /// A cached `error` is kept until the user resets. Once the document
    /// holds an outline or slides it pins the state, so the derived value
    /// wins; before that the further along of the two is taken.
    pub fn reconcile(cached: Option<AppState>, derived: AppState) -> AppState {
        match cached {
            Some(Self::Error) => Self::Error,
            _ if matches!(derived, Self::Generating | Self::Editing) => derived,
            Some(cached) if cached.rank() > derived.rank() => cached,
            _ => derived,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Clarifying => "clarifying",
            Self::Approving => "approving",
            Self::Generating => "generating",
            Self::Editing => "editing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, Role, Slide};

    fn doc_with_slides(n: usize) -> Presentation {
        let mut doc = Presentation::blank();
        doc.outline = (0..n).map(|i| format!("Slide {i}")).collect();
        doc.slides = (0..n).map(|_| Slide::default()).collect();
        doc
    }

    #[test]
    fn test_derive_from_contents() {
        let mut doc = Presentation::blank();
        assert_eq!(AppState::derive(&doc), AppState::Initial);

        doc.chat_history.push(ChatMessage::new(Role::User, "hello"));
        assert_eq!(AppState::derive(&doc), AppState::Clarifying);

        doc.clarified_goals = Some("a talk".into());
        assert_eq!(AppState::derive(&doc), AppState::Approving);

        doc.outline = vec!["Intro".into()];
        assert_eq!(AppState::derive(&doc), AppState::Generating);

        doc.slides.push(Slide::default());
        assert_eq!(AppState::derive(&doc), AppState::Editing);
    }

    #[test]
    fn test_reconcile_slides_beat_stale_cache() {
        let doc = doc_with_slides(5);
        let resolved = AppState::reconcile(Some(AppState::Clarifying), AppState::derive(&doc));
        assert_eq!(resolved, AppState::Editing);

        let resolved = AppState::reconcile(Some(AppState::Initial), AppState::derive(&doc));
        assert_eq!(resolved, AppState::Editing);
    }

    #[test]
    fn test_reconcile_outline_without_slides_resumes_generation() {
        let mut doc = Presentation::blank();
        doc.outline = vec!["Intro".into(), "Body".into()];
        let resolved = AppState::reconcile(Some(AppState::Editing), AppState::derive(&doc));
        assert_eq!(resolved, AppState::Generating);
    }

    #[test]
    fn test_reconcile_prefers_cache_before_outline() {
        let mut doc = Presentation::blank();
        doc.chat_history.push(ChatMessage::new(Role::User, "hello"));
        let resolved = AppState::reconcile(Some(AppState::Approving), AppState::derive(&doc));
        assert_eq!(resolved, AppState::Approving);

        assert_eq!(AppState::reconcile(None, AppState::Clarifying), AppState::Clarifying);
    }

    #[test]
    fn test_reconcile_keeps_error() {
        let doc = doc_with_slides(2);
        let resolved = AppState::reconcile(Some(AppState::Error), AppState::derive(&doc));
        assert_eq!(resolved, AppState::Error);
    }

    #[test]
    fn test_transitions() {
        assert!(AppState::Initial.transition(AppState::Clarifying).is_ok());
        assert!(AppState::Generating.transition(AppState::Editing).is_ok());
        assert!(AppState::Editing.transition(AppState::Generating).is_ok());
        assert!(AppState::Clarifying.transition(AppState::Error).is_ok());
        assert!(AppState::Initial.transition(AppState::Editing).is_err());
        assert!(AppState::Error.transition(AppState::Editing).is_err());
    }
}
