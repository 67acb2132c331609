//! Entity classifier seam for unstructured PII (people, organizations, places).
//!
//! A statistical NER model is an external collaborator: it may be missing or
//! fail to load. [`LazyClassifier`] loads it on first use, exactly once, and
//! degrades to "no findings" for the rest of its lifetime if loading fails.
//! [`HeuristicClassifier`] is the built-in fallback used when no model is
//! plugged in.

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::types::{PiiFinding, PiiKind};

/// A named-entity recognizer that reports PERSON, ORG and LOCATION spans.
pub trait EntityClassifier: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Detect entities in `text`. Spans are byte offsets into `text`.
    fn detect_entities(&self, text: &str) -> Vec<PiiFinding>;
}

type Loader = Box<dyn Fn() -> ollqd_core::Result<Arc<dyn EntityClassifier>> + Send + Sync>;

/// Lazily-loaded, memoized classifier handle.
pub struct LazyClassifier {
    loader: Option<Loader>,
    loaded: OnceCell<Option<Arc<dyn EntityClassifier>>>,
}

impl LazyClassifier {
    /// Create a handle that runs `loader` on first use.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> ollqd_core::Result<Arc<dyn EntityClassifier>> + Send + Sync + 'static,
    {
        Self {
            loader: Some(Box::new(loader)),
            loaded: OnceCell::new(),
        }
    }

    /// Handle around an already-constructed classifier.
    pub fn ready(classifier: Arc<dyn EntityClassifier>) -> Self {
        Self {
            loader: None,
            loaded: OnceCell::with_value(Some(classifier)),
        }
    }

    /// Handle that never yields a classifier (regex-only mode).
    pub fn disabled() -> Self {
        Self {
            loader: None,
            loaded: OnceCell::with_value(None),
        }
    }

    fn get(&self) -> Option<&Arc<dyn EntityClassifier>> {
        self.loaded
            .get_or_init(|| {
                let loader = self.loader.as_ref()?;
                match loader() {
                    Ok(classifier) => {
                        info!("Entity classifier '{}' loaded", classifier.name());
                        Some(classifier)
                    }
                    Err(e) => {
                        warn!("Entity classifier unavailable, falling back to regex-only: {}", e);
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Whether a classifier is loaded. Triggers the load on first call.
    pub fn is_available(&self) -> bool {
        self.get().is_some()
    }

    /// Run the classifier and keep only well-formed PERSON/ORG/LOCATION findings.
    pub fn detect_entities(&self, text: &str) -> Vec<PiiFinding> {
        let Some(classifier) = self.get() else {
            return Vec::new();
        };

        let mut findings = classifier.detect_entities(text);
        let before = findings.len();
        findings.retain_mut(|f| accept(text, f));
        if findings.len() < before {
            debug!(
                "Dropped {} malformed findings from classifier '{}'",
                before - findings.len(),
                classifier.name()
            );
        }
        findings
    }
}

impl std::fmt::Debug for LazyClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.loaded.get() {
            None => "pending",
            Some(None) => "unavailable",
            Some(Some(_)) => "loaded",
        };
        f.debug_struct("LazyClassifier").field("state", &state).finish()
    }
}

/// Validate a classifier finding against the source text, trimming its value.
fn accept(text: &str, finding: &mut PiiFinding) -> bool {
    if finding.kind.is_structured() {
        return false;
    }
    if finding.start > finding.end
        || finding.end > text.len()
        || !text.is_char_boundary(finding.start)
        || !text.is_char_boundary(finding.end)
    {
        return false;
    }
    let trimmed = finding.value.trim();
    if trimmed.chars().count() <= 1 {
        return false;
    }
    if trimmed.len() != finding.value.len() {
        // Shrink the span too when it covers exactly the untrimmed value.
        if text[finding.start..finding.end] == finding.value {
            finding.start += finding.value.len() - finding.value.trim_start().len();
            finding.end = finding.start + trimmed.len();
        }
        finding.value = trimmed.to_string();
    }
    true
}

static TITLED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").unwrap()
});
static NAME_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap());
static ORG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*\s+(?:Inc|Corp|Corporation|LLC|Ltd|GmbH)\b\.?")
        .unwrap()
});

/// Capitalized words that open a sentence or phrase but are never a first name.
const NON_NAME_WORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "Please", "Contact", "Call", "Email", "Dear",
    "Hello", "Hi", "Thanks", "Meeting", "Send", "Ask", "Tell", "Our", "Your", "My",
];

/// Pattern-based person/organization recognizer. No model required.
#[derive(Debug, Default, Clone)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    fn organizations(text: &str) -> Vec<PiiFinding> {
        ORG_RE
            .find_iter(text)
            .map(|m| PiiFinding::new(PiiKind::Org, m.as_str(), m.start(), m.end()))
            .collect()
    }

    fn persons(text: &str, orgs: &[PiiFinding]) -> Vec<PiiFinding> {
        let overlaps_org =
            |start: usize, end: usize| orgs.iter().any(|o| start < o.end && o.start < end);

        let mut persons: Vec<PiiFinding> = TITLED_NAME_RE
            .captures_iter(text)
            .filter_map(|cap| cap.get(1))
            .map(|m| PiiFinding::new(PiiKind::Person, m.as_str(), m.start(), m.end()))
            .collect();

        // Two consecutive capitalized words. A pair whose first word is a
        // sentence opener is retried from its second word.
        let mut pos = 0;
        while let Some(m) = NAME_PAIR_RE.find_at(text, pos) {
            let first_word = m.as_str().split_whitespace().next().unwrap_or_default();
            if NON_NAME_WORDS.contains(&first_word) || starts_sentence(text, m.start()) {
                pos = m.start() + first_word.len();
                continue;
            }
            pos = m.end();
            let already = persons.iter().any(|p| p.start < m.end() && m.start() < p.end);
            if !already && !overlaps_org(m.start(), m.end()) {
                persons.push(PiiFinding::new(PiiKind::Person, m.as_str(), m.start(), m.end()));
            }
        }

        persons
    }
}

/// Whether `pos` is the first word of the text or of a sentence.
fn starts_sentence(text: &str, pos: usize) -> bool {
    match text[..pos].trim_end().chars().next_back() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?'),
    }
}

impl EntityClassifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn detect_entities(&self, text: &str) -> Vec<PiiFinding> {
        let orgs = Self::organizations(text);
        let mut findings = Self::persons(text, &orgs);
        findings.extend(orgs);
        findings
    }
}
