//! Per-turn bidirectional map between PII values and placeholder tokens.

use std::collections::HashMap;

use crate::stream::StreamUnmaskBuffer;
use crate::types::{MaskedEntity, PiiKind};

/// Value ↔ token map for one chat turn.
///
/// The same (trimmed) value always maps to the same token within a registry.
/// Tokens look like `<EMAIL_1>`, numbered per kind starting at 1.
#[derive(Default)]
pub struct EntityRegistry {
    value_to_token: HashMap<String, String>,
    token_to_value: HashMap<String, String>,
    counters: HashMap<PiiKind, u64>,
    /// Tokens in creation order.
    order: Vec<String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the token for `value`, allocating the next `<KIND_N>` if unseen.
    pub fn get_or_create_token(&mut self, kind: PiiKind, value: &str) -> String {
        let key = value.trim();
        if let Some(token) = self.value_to_token.get(key) {
            return token.clone();
        }

        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        let token = format!("<{}_{}>", kind.label(), counter);

        self.value_to_token.insert(key.to_string(), token.clone());
        self.token_to_value.insert(token.clone(), key.to_string());
        self.order.push(token.clone());
        token
    }

    /// Original value for a token, if this registry issued it.
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.token_to_value.get(token).map(String::as_str)
    }

    /// Replace every known token in `text` with its original value.
    ///
    /// Unknown `<...>` sequences are left as they are. Runs the streaming
    /// decoder over the whole text so both paths produce identical output.
    pub fn unmask(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        let mut buffer = StreamUnmaskBuffer::new(self);
        let mut result = buffer.feed(text);
        result.push_str(&buffer.flush());
        result
    }

    /// Read-only token → value view for diagnostics and tests.
    pub fn token_to_value(&self) -> &HashMap<String, String> {
        &self.token_to_value
    }

    /// Tokens and originals in the order they were issued.
    pub fn entities(&self) -> Vec<MaskedEntity> {
        self.order
            .iter()
            .map(|token| MaskedEntity {
                token: token.clone(),
                original: self.token_to_value[token].clone(),
            })
            .collect()
    }

    /// Whether any value was masked. Callers use this to decide whether to
    /// tell the model to preserve placeholder tokens.
    pub fn has_entities(&self) -> bool {
        !self.value_to_token.is_empty()
    }

    pub fn len(&self) -> usize {
        self.token_to_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_value.is_empty()
    }
}

// Never print original values.
impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("tokens", &self.order)
            .finish_non_exhaustive()
    }
}
