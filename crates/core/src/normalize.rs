//! Text normalization for collaborator-drafted slide text.
//!
//! Drafting and critique output arrives as free text: bullets may carry
//! their own markers, whitespace is inconsistent, and unicode may not be
//! in composed form. Slides store the cleaned form.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::contract::{CritiqueResponse, SlideDraft};

/// Regex to collapse multiple whitespace characters into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

/// Regex to match a leading bullet marker ("- ", "* ", "• ", "1. ", "2) ").
static BULLET_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•‣◦▪]|\d{1,2}[.)])(?:\s+|$)").unwrap());

/// Text normalizer for slide titles, bullets and notes.
#[derive(Debug, Clone)]
pub struct DraftNormalizer {
    /// Whether to strip list markers from the start of bullets.
    strip_bullet_markers: bool,
}

impl Default for DraftNormalizer {
    fn default() -> Self {
        Self {
            strip_bullet_markers: true,
        }
    }
}

impl DraftNormalizer {
    /// Create a new normalizer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to strip list markers from bullets.
    pub fn with_strip_bullet_markers(mut self, strip: bool) -> Self {
        self.strip_bullet_markers = strip;
        self
    }

    /// Normalize a single line: NFC, collapsed whitespace, trimmed.
    pub fn normalize_line(&self, text: &str) -> String {
        let composed: String = text.nfc().collect();
        WHITESPACE_COLLAPSE_REGEX
            .replace_all(composed.trim(), " ")
            .to_string()
    }

    /// Normalize multi-line text, keeping line breaks.
    pub fn normalize_block(&self, text: &str) -> String {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        text.lines()
            .map(|line| self.normalize_line(line))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Normalize bullets, dropping any that end up empty.
    pub fn normalize_bullets(&self, bullets: &[String]) -> Vec<String> {
        bullets
            .iter()
            .map(|b| {
                let line = self.normalize_line(b);
                if self.strip_bullet_markers {
                    BULLET_MARKER_REGEX.replace(&line, "").to_string()
                } else {
                    line
                }
            })
            .filter(|b| !b.is_empty())
            .collect()
    }

    /// Normalize every text field of a draft.
    pub fn normalize_draft(&self, draft: SlideDraft) -> SlideDraft {
        SlideDraft {
            title: self.normalize_line(&draft.title),
            content: self.normalize_bullets(&draft.content),
            speaker_notes: self.normalize_block(&draft.speaker_notes),
            image_prompt: self.normalize_line(&draft.image_prompt),
            use_asset_image_url: draft
                .use_asset_image_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        }
    }

    /// Normalize the revised text fields of a critique pass.
    pub fn normalize_critique(&self, critique: CritiqueResponse) -> CritiqueResponse {
        CritiqueResponse {
            title: self.normalize_line(&critique.title),
            content: self.normalize_bullets(&critique.content),
            speaker_notes: self.normalize_block(&critique.speaker_notes),
            review: critique.review,
        }
    }
}
