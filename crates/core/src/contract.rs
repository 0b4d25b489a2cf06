//! Contracts for the external collaborators the pipeline consumes.
//!
//! Each collaborator sits behind a network boundary; implementations
//! live outside this crate (see `deck-http`) and in test fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Asset, FileRef, FileUpload, Presentation, Slide};

/// A ranked text chunk returned by context retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub name: String,
    pub text: String,
}

/// Audience/tone/length constraints shared by drafting and critique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
}

/// Input to the drafting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    pub presentation_id: String,
    pub outline_titles: Vec<String>,
    pub assets: Vec<Asset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

/// A slide as produced by the drafting collaborator, before critique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlideDraft {
    pub title: String,
    pub content: Vec<String>,
    pub speaker_notes: String,
    pub image_prompt: String,
    pub use_asset_image_url: Option<String>,
}

/// Output of the drafting collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftResponse {
    pub slides: Vec<SlideDraft>,
}

/// Text fields handed to the critique collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CritiqueInput {
    pub title: String,
    pub content: Vec<String>,
    pub speaker_notes: String,
    pub image_prompt: String,
}

impl From<&SlideDraft> for CritiqueInput {
    fn from(draft: &SlideDraft) -> Self {
        Self {
            title: draft.title.clone(),
            content: draft.content.clone(),
            speaker_notes: draft.speaker_notes.clone(),
            image_prompt: draft.image_prompt.clone(),
        }
    }
}

/// Context handed to the critique collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CritiqueContext {
    #[serde(flatten)]
    pub constraints: Constraints,
    pub assets: Vec<Asset>,
}

/// Structured review attached to a critique pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Review {
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Output of the critique collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CritiqueResponse {
    pub title: String,
    pub content: Vec<String>,
    pub speaker_notes: String,
    pub review: Option<Review>,
}

/// Ranked context lookup. Failures are non-fatal to callers.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve_context(
        &self,
        presentation_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ContextChunk>>;
}

/// Drafts slides for outline titles.
#[async_trait]
pub trait SlideDrafter: Send + Sync {
    async fn draft_slide(&self, request: DraftRequest) -> Result<DraftResponse>;
}

/// Revises a drafted slide and reviews it.
#[async_trait]
pub trait SlideCritic: Send + Sync {
    async fn critique_slide(
        &self,
        slide: CritiqueInput,
        context: CritiqueContext,
    ) -> Result<CritiqueResponse>;
}

/// A place presentation documents are persisted.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load a document by id. `Ok(None)` when it does not exist.
    async fn load(&self, id: &str) -> Result<Option<Presentation>>;

    async fn save(&self, doc: &Presentation) -> Result<()>;
}

/// Upload endpoint for source files.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        file: &FileUpload,
        presentation_id: &str,
        category: Option<&str>,
    ) -> Result<FileRef>;
}

/// Completion count reported after each finished slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Receives partial results while a generation run is in progress.
///
/// `publish_slides` is called with the full ordered set of slides finished
/// so far, so publishing the same set twice must leave the receiver
/// unchanged.
pub trait GenerationSink: Send + Sync {
    fn publish_slides(&self, slides: Vec<Slide>);

    fn report_progress(&self, _progress: Progress) {}
}
