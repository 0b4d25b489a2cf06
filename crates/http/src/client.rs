//! reqwest-based implementations of the collaborator contracts.
//!
//! Routes, relative to the configured base URL:
//!
//! ```text
//! GET  presentations/{id}   → Presentation | 404
//! PUT  presentations/{id}   ← Presentation
//! POST retrieve             ← {presentationId, query, limit}  → [{name, text}]
//! POST draft-slide          ← DraftRequest                    → DraftResponse
//! POST critique-slide       ← {slide, ...context}             → CritiqueResponse
//! POST upload               ← multipart {file, presentationId, category?} → FileRef
//! ```

use async_trait::async_trait;
use deck_core::{
    ContextChunk, ContextRetriever, CritiqueContext, CritiqueInput, CritiqueResponse,
    DocumentStore, DraftRequest, DraftResponse, Error, FileRef, FileUpload, Presentation, Result,
    SlideCritic, SlideDrafter, Uploader,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::HttpConfig;

/// Client for the deck backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: HttpConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveBody<'a> {
    presentation_id: &'a str,
    query: &'a str,
    limit: usize,
}

#[derive(Serialize)]
struct CritiqueBody {
    slide: CritiqueInput,
    #[serde(flatten)]
    context: CritiqueContext,
}

impl ApiClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(http_error)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await.map_err(http_error)?;
        response.error_for_status().map_err(http_error)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        log::debug!("POST {}", url);
        let response = self.send(self.client.post(&url).json(body)).await?;
        response.json().await.map_err(http_error)
    }
}

fn http_error(err: reqwest::Error) -> Error {
    Error::HttpError(err.to_string())
}

#[async_trait]
impl DocumentStore for ApiClient {
    async fn load(&self, id: &str) -> Result<Option<Presentation>> {
        let url = self.config.endpoint(&format!("presentations/{}", id));
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| Error::StoreError(e.to_string()))?;
        let doc = response
            .json()
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(Some(doc))
    }

    async fn save(&self, doc: &Presentation) -> Result<()> {
        let url = self.config.endpoint(&format!("presentations/{}", doc.id));
        self.send(self.client.put(&url).json(doc))
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ContextRetriever for ApiClient {
    async fn retrieve_context(
        &self,
        presentation_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ContextChunk>> {
        let body = RetrieveBody {
            presentation_id,
            query,
            limit,
        };
        self.post_json("retrieve", &body)
            .await
            .map_err(|e| Error::RetrievalError(e.to_string()))
    }
}

#[async_trait]
impl SlideDrafter for ApiClient {
    async fn draft_slide(&self, request: DraftRequest) -> Result<DraftResponse> {
        let title = request.outline_titles.join(", ");
        self.post_json("draft-slide", &request)
            .await
            .map_err(|e| Error::DraftingError {
                title,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SlideCritic for ApiClient {
    async fn critique_slide(
        &self,
        slide: CritiqueInput,
        context: CritiqueContext,
    ) -> Result<CritiqueResponse> {
        let title = slide.title.clone();
        let body = CritiqueBody { slide, context };
        self.post_json("critique-slide", &body)
            .await
            .map_err(|e| Error::CritiqueError {
                title,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Uploader for ApiClient {
    async fn upload(
        &self,
        file: &FileUpload,
        presentation_id: &str,
        category: Option<&str>,
    ) -> Result<FileRef> {
        let upload_error = |e: reqwest::Error| Error::UploadError(e.to_string());

        let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone());
        if let Some(mime) = &file.mime_type {
            part = part.mime_str(mime).map_err(upload_error)?;
        }
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("presentationId", presentation_id.to_string());
        if let Some(category) = category {
            form = form.text("category", category.to_string());
        }

        let url = self.config.endpoint("upload");
        log::debug!("Uploading {} to {}", file.name, url);
        let response = self
            .authorize(self.client.post(&url).multipart(form))
            .send()
            .await
            .map_err(upload_error)?
            .error_for_status()
            .map_err(upload_error)?;
        let mut file_ref: FileRef = response.json().await.map_err(upload_error)?;
        if file_ref.category.is_none() {
            file_ref.category = category.map(String::from);
        }
        if file_ref.mime_type.is_none() {
            file_ref.mime_type = file.mime_type.clone();
        }
        Ok(file_ref)
    }
}
