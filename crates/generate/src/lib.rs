//! Bounded-concurrency slide generation: turns an approved outline into
//! drafted, critiqued slides and publishes them as they finish.

pub mod driver;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use driver::generate_for_session;
pub use orchestrator::{
    GenerationConfig, GenerationJob, Orchestrator, RunOutcome, RunReport, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_RETRIEVAL_TOP_K,
};
