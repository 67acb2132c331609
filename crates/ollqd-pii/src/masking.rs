//! Masking pass: merge detector and classifier findings, resolve overlaps,
//! and rewrite text with registry tokens.

use std::sync::Arc;

use tracing::debug;

use crate::classifier::LazyClassifier;
use crate::detector::PatternDetector;
use crate::registry::EntityRegistry;
use crate::types::{KindFilter, PiiFinding};

/// Detection + replacement. Cheap to clone; shared across turns.
#[derive(Debug, Clone)]
pub struct MaskingPass {
    detector: PatternDetector,
    classifier: Option<Arc<LazyClassifier>>,
    filter: KindFilter,
}

impl MaskingPass {
    /// Mask with the given kinds, consulting `classifier` when present.
    pub fn new(filter: KindFilter, classifier: Option<Arc<LazyClassifier>>) -> Self {
        Self {
            detector: PatternDetector::with_filter(&filter),
            classifier,
            filter,
        }
    }

    /// Regex-only pass over every structured kind.
    pub fn regex_only() -> Self {
        Self::new(KindFilter::All, None)
    }

    /// Whether entity classification runs as part of this pass.
    pub fn uses_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Non-overlapping findings, ordered by start offset.
    ///
    /// Candidates are ordered by start, then longer span first, then
    /// [`PiiKind::priority`](crate::PiiKind::priority) (structured kinds
    /// before classifier kinds). A candidate is kept only if it starts at or
    /// after the end of the last kept one.
    pub fn findings(&self, text: &str) -> Vec<PiiFinding> {
        let mut findings = self.detector.detect(text);

        if let Some(classifier) = &self.classifier {
            findings.extend(
                classifier
                    .detect_entities(text)
                    .into_iter()
                    .filter(|f| self.filter.allows(f.kind)),
            );
        }

        findings.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.span_len().cmp(&a.span_len()))
                .then(a.kind.priority().cmp(&b.kind.priority()))
        });

        let mut kept: Vec<PiiFinding> = Vec::with_capacity(findings.len());
        let mut last_end = 0;
        for finding in findings {
            if finding.start >= last_end {
                last_end = finding.end;
                kept.push(finding);
            }
        }
        kept
    }

    /// Replace detected PII in `text` with tokens from `registry`.
    ///
    /// Texts shorter than two chars are returned unchanged. Values already in
    /// the registry reuse their token.
    pub fn mask(&self, text: &str, registry: &mut EntityRegistry) -> String {
        if text.chars().nth(1).is_none() {
            return text.to_string();
        }

        let findings = self.findings(text);
        if findings.is_empty() {
            return text.to_string();
        }

        // Issue tokens in reading order so numbering follows the text.
        let tokens: Vec<String> = findings
            .iter()
            .map(|f| registry.get_or_create_token(f.kind, &f.value))
            .collect();

        let mut result = text.to_string();
        for (finding, token) in findings.iter().zip(&tokens).rev() {
            result.replace_range(finding.start..finding.end, token);
        }

        debug!(
            "Masked {} PII spans ({} distinct values in registry)",
            findings.len(),
            registry.len()
        );
        result
    }
}

impl Default for MaskingPass {
    fn default() -> Self {
        Self::regex_only()
    }
}
