//! Runs generation against a [`Session`] and maps the result onto
//! `AppState`: completed or cancelled runs go to `editing`, failed runs to
//! `error`.

use deck_core::{AppState, Result};
use deck_store::Session;

use crate::orchestrator::{GenerationJob, Orchestrator, RunReport};

/// Generate the session's outline, publishing slides into the session.
///
/// Entering from `approving` or `editing` moves the session to
/// `generating` first; regenerating from `editing` clears existing slides.
pub async fn generate_for_session(session: &Session, orchestrator: &Orchestrator) -> Result<RunReport> {
    let from = session.app_state();
    session.transition(AppState::Generating).await?;
    if from == AppState::Editing {
        session.mutate(|doc| doc.slides.clear());
    }
    session.cancellation().reset();

    let job = GenerationJob::from_presentation(&session.presentation());
    let result = orchestrator.run(&job, session, session.cancellation()).await;

    let next = match &result {
        Ok(_) => AppState::Editing,
        Err(e) => {
            log::error!("Generation for {} failed: {}", job.presentation_id, e);
            AppState::Error
        }
    };
    session.transition(next).await?;
    // Failure is logged by save_now; the session stays usable.
    let _ = session.save_now().await;
    result
}
