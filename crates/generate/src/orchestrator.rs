//! Bounded-concurrency slide generation.
//!
//! For an approved outline, a small pool of workers drives
//! Retrieval → Draft → Critique for each title and publishes finished
//! slides as they complete.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::run
//!     │
//!     ├── cursor: next unclaimed outline index (shared, atomic)
//!     ├── slots:  one Option<Slide> per outline index
//!     └── workers: min(max_concurrency, N), joined on the calling task
//!
//! Per claimed index:
//!     1. cancellation check, then claim
//!     2. retrieve_context   (failure swallowed, base assets only)
//!     3. cancellation check, then draft_slide
//!     4. cancellation check, then critique_slide
//!     5. write slot, publish filled slots in outline order, report progress
//! ```
//!
//! Cancellation is only observed at the checks above; a call already in
//! flight runs to completion. A drafting or critique failure ends the run:
//! remaining work is dropped and the error is returned, while slides
//! published before the failure stay with the sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use deck_core::{
    new_id, Asset, AssetKind, CancellationFlag, Constraints, ContextRetriever, CritiqueContext,
    CritiqueInput, CritiqueResponse, DraftNormalizer, DraftRequest, Error, GenerationSink,
    ImageState, InitialInput, Presentation, Progress, Result, Slide, SlideCritic, SlideDraft,
    SlideDrafter,
};
use futures::future::try_join_all;

/// Upper bound on simultaneous generation pipelines.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Number of context chunks requested per slide.
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 5;

/// Tuning for a generation run.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_concurrency: usize,
    pub retrieval_top_k: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
        }
    }
}

impl GenerationConfig {
    /// Set the worker count (at least 1).
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers.max(1);
        self
    }

    pub fn with_retrieval_top_k(mut self, k: usize) -> Self {
        self.retrieval_top_k = k;
        self
    }
}

/// What a run generates: the outline plus the context it needs.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub presentation_id: String,
    pub outline: Vec<String>,
    pub initial_input: InitialInput,
}

impl GenerationJob {
    pub fn from_presentation(doc: &Presentation) -> Self {
        Self {
            presentation_id: doc.id.clone(),
            outline: doc.outline.clone(),
            initial_input: doc.initial_input.clone(),
        }
    }

    fn constraints(&self) -> Constraints {
        Constraints {
            audience: self.initial_input.audience.clone(),
            tone: self.initial_input.tone.clone(),
            length: self.initial_input.length.clone(),
        }
    }
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every outline title has a slide.
    Completed,
    /// Stopped early; only the slides finished before cancellation exist.
    Cancelled,
}

/// Summary of a run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub completed: usize,
    pub total: usize,
}

/// Drives the external collaborators for every title of an outline.
pub struct Orchestrator {
    retriever: Option<Arc<dyn ContextRetriever>>,
    drafter: Arc<dyn SlideDrafter>,
    critic: Arc<dyn SlideCritic>,
    normalizer: DraftNormalizer,
    config: GenerationConfig,
}

/// State shared by the workers of one run. Lives only as long as the run.
struct RunContext<'a> {
    job: &'a GenerationJob,
    sink: &'a dyn GenerationSink,
    cancel: &'a CancellationFlag,
    base_assets: Vec<Asset>,
    constraints: Constraints,
    slots: Mutex<Vec<Option<Slide>>>,
    cursor: AtomicUsize,
    completed: AtomicUsize,
}

impl RunContext<'_> {
    fn total(&self) -> usize {
        self.job.outline.len()
    }

    /// Store a finished slide and republish every filled slot in order.
    fn finish(&self, index: usize, slide: Slide) {
        let filled: Vec<Slide> = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots[index] = Some(slide);
            slots.iter().flatten().cloned().collect()
        };
        self.sink.publish_slides(filled);

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.sink.report_progress(Progress {
            completed,
            total: self.total(),
        });
    }
}

impl Orchestrator {
    pub fn new(drafter: Arc<dyn SlideDrafter>, critic: Arc<dyn SlideCritic>) -> Self {
        Self {
            retriever: None,
            drafter,
            critic,
            normalizer: DraftNormalizer::new(),
            config: GenerationConfig::default(),
        }
    }

    /// Enrich drafts with retrieved context.
    pub fn with_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_normalizer(mut self, normalizer: DraftNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate one slide per outline title, publishing into `sink`.
    ///
    /// An empty outline completes immediately without publishing.
    pub async fn run(
        &self,
        job: &GenerationJob,
        sink: &dyn GenerationSink,
        cancel: &CancellationFlag,
    ) -> Result<RunReport> {
        let total = job.outline.len();
        if total == 0 {
            return Ok(RunReport {
                outcome: RunOutcome::Completed,
                completed: 0,
                total,
            });
        }

        let workers = self.config.max_concurrency.max(1).min(total);
        log::info!(
            "Generating {} slides for {} with {} workers",
            total,
            job.presentation_id,
            workers
        );

        let run = RunContext {
            job,
            sink,
            cancel,
            base_assets: job.initial_input.base_assets(),
            constraints: job.constraints(),
            slots: Mutex::new(vec![None; total]),
            cursor: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        };

        if let Err(e) = try_join_all((0..workers).map(|_| self.worker(&run))).await {
            log::error!("Generation for {} failed: {}", job.presentation_id, e);
            return Err(e);
        }

        let completed = run.completed.load(Ordering::SeqCst);
        let outcome = if completed == total {
            RunOutcome::Completed
        } else {
            log::info!(
                "Generation for {} cancelled after {}/{} slides",
                job.presentation_id,
                completed,
                total
            );
            RunOutcome::Cancelled
        };
        Ok(RunReport {
            outcome,
            completed,
            total,
        })
    }

    async fn worker(&self, run: &RunContext<'_>) -> Result<()> {
        loop {
            if run.cancel.is_cancelled() {
                return Ok(());
            }
            let index = run.cursor.fetch_add(1, Ordering::SeqCst);
            if index >= run.total() {
                return Ok(());
            }
            match self.generate_slide(run, index).await? {
                Some(slide) => run.finish(index, slide),
                None => return Ok(()),
            }
        }
    }

    /// Run the pipeline for one index. `None` when cancelled part way.
    async fn generate_slide(&self, run: &RunContext<'_>, index: usize) -> Result<Option<Slide>> {
        let title = &run.job.outline[index];
        let assets = self.assets_for(run, title).await;

        if run.cancel.is_cancelled() {
            return Ok(None);
        }
        let request = DraftRequest {
            presentation_id: run.job.presentation_id.clone(),
            outline_titles: vec![title.clone()],
            assets: assets.clone(),
            constraints: Some(run.constraints.clone()),
        };
        let response = self
            .drafter
            .draft_slide(request)
            .await
            .map_err(|e| drafting_error(title, e))?;
        let draft = response
            .slides
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmptyDraft(title.clone()))?;
        let draft = self.normalizer.normalize_draft(draft);

        if run.cancel.is_cancelled() {
            return Ok(None);
        }
        let context = CritiqueContext {
            constraints: run.constraints.clone(),
            assets,
        };
        let critique = self
            .critic
            .critique_slide(CritiqueInput::from(&draft), context)
            .await
            .map_err(|e| critique_error(title, e))?;
        let critique = self.normalizer.normalize_critique(critique);
        if let Some(review) = &critique.review {
            log::debug!(
                "Critique of \"{}\": {} issues, {} suggestions",
                title,
                review.issues.len(),
                review.suggestions.len()
            );
        }

        Ok(Some(build_slide(draft, critique)))
    }

    /// Base assets plus retrieved context. Retrieval failure is not an error.
    async fn assets_for(&self, run: &RunContext<'_>, title: &str) -> Vec<Asset> {
        let mut assets = run.base_assets.clone();
        let Some(retriever) = &self.retriever else {
            return assets;
        };
        match retriever
            .retrieve_context(
                &run.job.presentation_id,
                title,
                self.config.retrieval_top_k,
            )
            .await
        {
            Ok(chunks) => assets.extend(chunks.into_iter().map(|chunk| Asset {
                name: chunk.name,
                url: String::new(),
                kind: AssetKind::Context,
                text: Some(chunk.text),
            })),
            Err(e) => log::debug!(
                "Context retrieval for \"{}\" failed, using base assets: {}",
                title,
                e
            ),
        }
        assets
    }
}

/// Critique-revised text with draft-sourced image fields. Empty critique
/// fields fall back to the draft.
fn build_slide(draft: SlideDraft, critique: CritiqueResponse) -> Slide {
    let title = if critique.title.is_empty() {
        draft.title
    } else {
        critique.title
    };
    let content = if critique.content.is_empty() {
        draft.content
    } else {
        critique.content
    };
    let speaker_notes = if critique.speaker_notes.is_empty() {
        draft.speaker_notes
    } else {
        critique.speaker_notes
    };

    let (image_url, image_state, use_generated_image) = match draft.use_asset_image_url {
        Some(url) => (Some(url), Some(ImageState::Done), false),
        None => (None, None, true),
    };

    Slide {
        id: new_id(),
        title,
        content,
        speaker_notes,
        image_prompt: draft.image_prompt,
        image_url,
        image_state,
        use_generated_image,
    }
}

fn drafting_error(title: &str, err: Error) -> Error {
    match err {
        Error::DraftingError { .. } | Error::EmptyDraft(_) => err,
        other => Error::DraftingError {
            title: title.to_string(),
            message: other.to_string(),
        },
    }
}

fn critique_error(title: &str, err: Error) -> Error {
    match err {
        Error::CritiqueError { .. } => err,
        other => Error::CritiqueError {
            title: title.to_string(),
            message: other.to_string(),
        },
    }
}
