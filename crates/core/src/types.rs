//! Domain types for the presentation document and its slides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mint a fresh opaque identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// The root persisted aggregate for one deck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Presentation {
    /// Stable identifier. Empty until the document is bootstrapped.
    pub id: String,

    /// Configuration captured before clarification.
    pub initial_input: InitialInput,

    /// Clarification chat, in order.
    pub chat_history: Vec<ChatMessage>,

    /// Summary of the clarification outcome.
    pub clarified_goals: Option<String>,

    /// Approved slide titles.
    pub outline: Vec<String>,

    /// Generated slides in outline order.
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// Create an empty document under a fresh id.
    pub fn blank() -> Self {
        Self {
            id: new_id(),
            ..Self::default()
        }
    }

    /// Whether the document has been assigned an id.
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Clone this document under a fresh id. The original is untouched.
    pub fn duplicate(&self) -> Self {
        Self {
            id: new_id(),
            ..self.clone()
        }
    }
}

/// Preferences captured before clarification begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialInput {
    /// Free-text notes.
    pub text: String,
    /// Uploaded source files.
    pub files: Vec<FileRef>,
    pub tone: Option<String>,
    pub length: Option<String>,
    pub audience: Option<String>,
    /// Accessibility preferences (e.g. "high-contrast", "large-text").
    pub accessibility: Vec<String>,
    pub branding: Option<Branding>,
}

impl InitialInput {
    /// Assets derived from the uploaded files.
    pub fn base_assets(&self) -> Vec<Asset> {
        self.files.iter().map(Asset::from).collect()
    }

    /// Apply a chat-driven patch. Only fields present in the patch change.
    pub fn apply(&mut self, patch: InitialInputPatch) {
        if let Some(text) = patch.text {
            self.text = text;
        }
        if let Some(tone) = patch.tone {
            self.tone = Some(tone);
        }
        if let Some(length) = patch.length {
            self.length = Some(length);
        }
        if let Some(audience) = patch.audience {
            self.audience = Some(audience);
        }
        if let Some(accessibility) = patch.accessibility {
            self.accessibility = accessibility;
        }
        if let Some(branding) = patch.branding {
            self.branding = Some(branding);
        }
        self.files.extend(patch.add_files);
    }
}

/// Partial update to [`InitialInput`] produced during clarification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialInputPatch {
    pub text: Option<String>,
    pub tone: Option<String>,
    pub length: Option<String>,
    pub audience: Option<String>,
    pub accessibility: Option<Vec<String>>,
    pub branding: Option<Branding>,
    pub add_files: Vec<FileRef>,
}

/// Branding preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Branding {
    pub primary_color: Option<String>,
    pub logo: Option<FileRef>,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One clarification message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Reference to an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileRef {
    pub name: String,
    pub url: String,
    pub path: Option<String>,
    pub category: Option<String>,
    /// MIME type, when known.
    pub mime_type: Option<String>,
}

impl FileRef {
    fn asset_kind(&self) -> AssetKind {
        let is_image = self
            .mime_type
            .as_deref()
            .map(|m| m.starts_with("image/"))
            .unwrap_or_else(|| {
                let lower = self.name.to_lowercase();
                [".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"]
                    .iter()
                    .any(|ext| lower.ends_with(ext))
            });
        if is_image {
            AssetKind::Image
        } else {
            AssetKind::Document
        }
    }
}

/// Kind of contextual asset handed to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Document,
    /// Text chunk returned by context retrieval.
    Context,
}

/// Contextual asset passed to the drafting and critique collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub url: String,
    pub kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl From<&FileRef> for Asset {
    fn from(file: &FileRef) -> Self {
        Self {
            name: file.name.clone(),
            url: file.url.clone(),
            kind: file.asset_kind(),
            text: None,
        }
    }
}

/// Resolution state of a slide image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageState {
    Loading,
    Error,
    Done,
}

/// One deck page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Slide {
    pub id: String,
    pub title: String,
    /// Bullet points, in order.
    pub content: Vec<String>,
    pub speaker_notes: String,
    pub image_prompt: String,
    pub image_url: Option<String>,
    pub image_state: Option<ImageState>,
    pub use_generated_image: bool,
}

/// A file to be uploaded.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}
