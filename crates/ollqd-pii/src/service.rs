//! Process-wide PII masking service shared by all chat turns.

use std::sync::Arc;

use ollqd_core::{Error, PiiConfig, Result};
use parking_lot::RwLock;
use tracing::info;

use crate::classifier::{EntityClassifier, HeuristicClassifier, LazyClassifier};
use crate::masking::MaskingPass;
use crate::registry::EntityRegistry;
use crate::stream::StreamUnmaskBuffer;
use crate::types::{KindFilter, MaskingReport};

/// System instruction prepended to the prompt when a turn masked anything.
pub const PII_SYSTEM_INSTRUCTION: &str = "IMPORTANT: The user query and context below contain \
placeholder tokens (e.g. <PERSON_1>, <EMAIL_1>, <ORG_1>) that replace sensitive information. \
You MUST preserve these tokens exactly as-is in your response. \
Do NOT attempt to guess, decode, or replace the original values. \
Refer to entities by their token (e.g. 'According to <PERSON_1>...').";

/// Masking configuration plus the shared detector/classifier.
///
/// Registries and stream buffers are per turn and are never stored here.
pub struct PiiService {
    state: RwLock<ServiceState>,
    classifier: Arc<LazyClassifier>,
}

/// Config and the pass built from it, swapped together.
#[derive(Debug)]
struct ServiceState {
    config: PiiConfig,
    pass: MaskingPass,
}

impl PiiService {
    /// Service backed by the built-in heuristic classifier.
    pub fn new(config: PiiConfig) -> Result<Self> {
        Self::with_classifier(
            config,
            LazyClassifier::new(|| {
                Ok(Arc::new(HeuristicClassifier::new()) as Arc<dyn EntityClassifier>)
            }),
        )
    }

    /// Service with an injected classifier handle.
    pub fn with_classifier(config: PiiConfig, classifier: LazyClassifier) -> Result<Self> {
        let classifier = Arc::new(classifier);
        let pass = build_pass(&config, &classifier)?;
        info!(
            "PII service ready: enabled={}, classifier={}, types={}",
            config.enabled, config.use_classifier, config.enabled_types
        );
        Ok(Self {
            state: RwLock::new(ServiceState { config, pass }),
            classifier,
        })
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> PiiConfig {
        self.state.read().config.clone()
    }

    /// Default masking switch for turns that don't override it.
    pub fn is_enabled(&self) -> bool {
        self.state.read().config.enabled
    }

    /// Apply runtime overrides. On error nothing changes.
    pub fn update_config(&self, overrides: &serde_json::Value) -> Result<PiiConfig> {
        let mut state = self.state.write();
        let mut next = state.config.clone();
        next.apply_overrides(overrides)?;
        let pass = build_pass(&next, &self.classifier)?;

        *state = ServiceState {
            config: next.clone(),
            pass,
        };
        drop(state);
        info!(
            "PII config updated: enabled={}, classifier={}, types={}",
            next.enabled, next.use_classifier, next.enabled_types
        );
        Ok(next)
    }

    pub fn create_registry(&self) -> EntityRegistry {
        EntityRegistry::new()
    }

    pub fn create_stream_buffer<'r>(&self, registry: &'r EntityRegistry) -> StreamUnmaskBuffer<'r> {
        StreamUnmaskBuffer::new(registry)
    }

    /// Mask `text` into `registry` using the current configuration.
    pub fn mask_text(&self, text: &str, registry: &mut EntityRegistry) -> String {
        // Release the lock before detection; the classifier may load on first use.
        let pass = self.state.read().pass.clone();
        pass.mask(text, registry)
    }

    /// Mask a standalone text with a fresh registry and report the entities.
    pub fn test_masking(&self, text: &str) -> Result<MaskingReport> {
        if text.is_empty() {
            return Err(Error::InvalidInput("text is required".into()));
        }

        let mut registry = self.create_registry();
        let masked = self.mask_text(text, &mut registry);
        let entities = registry.entities();

        info!("PII test masking: {} entities found", entities.len());

        Ok(MaskingReport {
            original: text.to_string(),
            masked,
            entity_count: entities.len(),
            entities,
        })
    }

    /// Whether the classifier is configured and loads. Triggers the load.
    pub fn is_classifier_available(&self) -> bool {
        let use_classifier = self.state.read().config.use_classifier;
        use_classifier && self.classifier.is_available()
    }
}

fn build_pass(config: &PiiConfig, classifier: &Arc<LazyClassifier>) -> Result<MaskingPass> {
    let filter = KindFilter::from_config(config)?;
    let classifier = config.use_classifier.then(|| classifier.clone());
    Ok(MaskingPass::new(filter, classifier))
}
