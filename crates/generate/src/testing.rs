//! In-memory collaborators for exercising generation runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deck_core::{
    CancellationFlag, ContextChunk, ContextRetriever, CritiqueContext, CritiqueInput,
    CritiqueResponse, DraftRequest, DraftResponse, Error, GenerationSink, Progress, Result,
    Review, Slide, SlideCritic, SlideDraft, SlideDrafter,
};

/// Tracks how many pipelines are between retrieval start and critique end.
#[derive(Debug, Default)]
pub struct PipelineGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl PipelineGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct FakeRetriever {
    pub fail: bool,
    pub gauge: Arc<PipelineGauge>,
    pub calls: AtomicUsize,
}

impl FakeRetriever {
    pub fn new(gauge: Arc<PipelineGauge>) -> Self {
        Self {
            fail: false,
            gauge,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(gauge: Arc<PipelineGauge>) -> Self {
        Self {
            fail: true,
            ..Self::new(gauge)
        }
    }
}

#[async_trait]
impl ContextRetriever for FakeRetriever {
    async fn retrieve_context(
        &self,
        _presentation_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ContextChunk>> {
        self.gauge.enter();
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        if self.fail {
            return Err(Error::RetrievalError("index offline".into()));
        }
        Ok((0..limit.min(2))
            .map(|i| ContextChunk {
                name: format!("{query} chunk {i}"),
                text: format!("context for {query}"),
            })
            .collect())
    }
}

/// Drafter with per-title delays, failures, and a cancellation trigger.
#[derive(Default)]
pub struct FakeDrafter {
    pub delays: HashMap<String, Duration>,
    pub fail_titles: HashSet<String>,
    /// Cancel this flag when drafting the given title.
    pub cancel_on: Option<(String, CancellationFlag)>,
    pub requests: Mutex<Vec<DraftRequest>>,
}

#[async_trait]
impl SlideDrafter for FakeDrafter {
    async fn draft_slide(&self, request: DraftRequest) -> Result<DraftResponse> {
        let title = request.outline_titles[0].clone();
        self.requests.lock().unwrap().push(request);
        if let Some((trigger, flag)) = &self.cancel_on {
            if *trigger == title {
                flag.cancel();
            }
        }
        let delay = self
            .delays
            .get(&title)
            .copied()
            .unwrap_or(Duration::from_millis(10));
        tokio::time::sleep(delay).await;
        if self.fail_titles.contains(&title) {
            return Err(Error::HttpError(format!("draft model refused {title}")));
        }
        Ok(DraftResponse {
            slides: vec![SlideDraft {
                title: title.clone(),
                content: vec![format!("- point about {title}")],
                speaker_notes: format!("Talk about {title}"),
                image_prompt: format!("an illustration of {title}"),
                use_asset_image_url: None,
            }],
        })
    }
}

/// Critic that prefixes titles with "Revised: ".
pub struct FakeCritic {
    pub gauge: Arc<PipelineGauge>,
    pub fail_titles: HashSet<String>,
    pub calls: AtomicUsize,
}

impl FakeCritic {
    pub fn new(gauge: Arc<PipelineGauge>) -> Self {
        Self {
            gauge,
            fail_titles: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SlideCritic for FakeCritic {
    async fn critique_slide(
        &self,
        slide: CritiqueInput,
        _context: CritiqueContext,
    ) -> Result<CritiqueResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.gauge.leave();
        if self.fail_titles.contains(&slide.title) {
            return Err(Error::HttpError("critique timed out".into()));
        }
        Ok(CritiqueResponse {
            title: format!("Revised: {}", slide.title),
            content: slide.content,
            speaker_notes: slide.speaker_notes,
            review: Some(Review {
                issues: vec!["too wordy".into()],
                suggestions: vec![],
            }),
        })
    }
}

/// Sink that keeps every publication.
#[derive(Default)]
pub struct RecordingSink {
    pub publications: Mutex<Vec<Vec<Slide>>>,
    pub progress: Mutex<Vec<Progress>>,
}

impl RecordingSink {
    pub fn latest_titles(&self) -> Vec<String> {
        self.publications
            .lock()
            .unwrap()
            .last()
            .map(|slides| slides.iter().map(|s| s.title.clone()).collect())
            .unwrap_or_default()
    }
}

impl GenerationSink for RecordingSink {
    fn publish_slides(&self, slides: Vec<Slide>) {
        self.publications.lock().unwrap().push(slides);
    }

    fn report_progress(&self, progress: Progress) {
        self.progress.lock().unwrap().push(progress);
    }
}

pub fn outline(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("S{i}")).collect()
}

pub fn revised(titles: &[String]) -> Vec<String> {
    titles.iter().map(|t| format!("Revised: {t}")).collect()
}
