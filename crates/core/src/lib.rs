//! Core domain types, application state machine, and collaborator
//! contracts for AI-assisted deck generation.

pub mod cancel;
pub mod contract;
pub mod error;
pub mod normalize;
pub mod state;
pub mod types;

pub use cancel::CancellationFlag;
pub use contract::{
    Constraints, ContextChunk, ContextRetriever, CritiqueContext, CritiqueInput, CritiqueResponse,
    DocumentStore, DraftRequest, DraftResponse, GenerationSink, Progress, Review, SlideCritic,
    SlideDraft, SlideDrafter, Uploader,
};
pub use error::{Error, Result};
pub use normalize::DraftNormalizer;
pub use state::AppState;
pub use types::{
    new_id, Asset, AssetKind, Branding, ChatMessage, FileRef, FileUpload, ImageState,
    InitialInput, InitialInputPatch, Presentation, Role, Slide,
};
