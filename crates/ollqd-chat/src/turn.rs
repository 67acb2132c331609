//! One chat turn: mask the prompt, unmask the streamed reply.

use futures::Stream;
use ollqd_pii::{EntityRegistry, PiiService, StreamUnmaskBuffer, PII_SYSTEM_INSTRUCTION};
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::types::{BoxedStream, ChatEvent, ChatMessage, StreamChunk};

/// PII state for a single request/response exchange.
///
/// Owns the turn's registry; dropping the turn discards every mapping.
#[derive(Debug)]
pub struct PiiTurn {
    registry: Option<EntityRegistry>,
}

impl PiiTurn {
    /// Start a turn. With `pii_enabled == false` text passes through untouched.
    pub fn new(service: &PiiService, pii_enabled: bool) -> Self {
        Self {
            registry: pii_enabled.then(|| service.create_registry()),
        }
    }

    /// Start a turn using the service's configured default.
    pub fn with_default(service: &PiiService) -> Self {
        Self::new(service, service.is_enabled())
    }

    pub fn is_masking(&self) -> bool {
        self.registry.is_some()
    }

    pub fn registry(&self) -> Option<&EntityRegistry> {
        self.registry.as_ref()
    }

    /// Number of distinct values masked so far.
    pub fn entity_count(&self) -> usize {
        self.registry.as_ref().map_or(0, EntityRegistry::len)
    }

    fn has_entities(&self) -> bool {
        self.registry.as_ref().is_some_and(EntityRegistry::has_entities)
    }

    /// Mask `text` into this turn's registry.
    pub fn mask(&mut self, service: &PiiService, text: &str) -> String {
        match self.registry.as_mut() {
            Some(registry) => service.mask_text(text, registry),
            None => text.to_string(),
        }
    }

    /// Build the system + user messages for the model.
    ///
    /// Query and context share the registry, so a value appearing in both
    /// gets one token. The preserve-tokens instruction leads the system
    /// prompt only when something was masked.
    pub fn build_messages(
        &mut self,
        service: &PiiService,
        system_prompt: &str,
        query: &str,
        context: Option<&str>,
    ) -> Vec<ChatMessage> {
        let masked_query = self.mask(service, query);
        let masked_context = match context {
            Some(ctx) if !ctx.is_empty() => self.mask(service, ctx),
            _ => String::new(),
        };

        let mut system_content = if self.has_entities() {
            format!("{}\n\n{}", PII_SYSTEM_INSTRUCTION, system_prompt)
        } else {
            system_prompt.to_string()
        };
        if !masked_context.is_empty() {
            system_content.push_str("\n\n");
            system_content.push_str(&masked_context);
        }

        debug!("Built prompt with {} masked entities", self.entity_count());

        vec![ChatMessage::system(system_content), ChatMessage::user(masked_query)]
    }

    /// Turn the model's token stream into user-facing events.
    ///
    /// Tokens are unmasked incrementally; empty outputs are skipped. Any
    /// partial placeholder still held back is released before `Done` or
    /// `Error`. A transport error is followed by a final `Done` that reports
    /// no PII summary, since the reply never completed.
    pub fn into_event_stream(
        self,
        mut upstream: BoxedStream,
    ) -> impl Stream<Item = ChatEvent> + Send + 'static {
        async_stream::stream! {
            let registry = self.registry.filter(EntityRegistry::has_entities);
            let pii_masked = registry.is_some();
            let pii_entities_count = registry.as_ref().map_or(0, EntityRegistry::len);
            let mut buffer = registry.as_ref().map(StreamUnmaskBuffer::new);
            let mut token_count = 0usize;

            while let Some(chunk) = upstream.next().await {
                match chunk {
                    StreamChunk::Token(text) => {
                        token_count += 1;
                        let content = match buffer.as_mut() {
                            Some(buffer) => buffer.feed(&text),
                            None => text,
                        };
                        if !content.is_empty() {
                            yield ChatEvent::Chunk { content };
                        }
                    }
                    StreamChunk::Done { tokens_used } => {
                        if let Some(content) = flush(&mut buffer) {
                            yield ChatEvent::Chunk { content };
                        }
                        yield ChatEvent::Done { pii_masked, pii_entities_count, tokens_used };
                        return;
                    }
                    StreamChunk::Error(e) => {
                        error!("Chat stream error: {}", e);
                        if let Some(content) = flush(&mut buffer) {
                            yield ChatEvent::Chunk { content };
                        }
                        yield ChatEvent::Error { error: e };
                        yield ChatEvent::Done {
                            pii_masked: false,
                            pii_entities_count: 0,
                            tokens_used: token_count,
                        };
                        return;
                    }
                }
            }

            // Transport ended without an explicit Done.
            if let Some(content) = flush(&mut buffer) {
                yield ChatEvent::Chunk { content };
            }
            yield ChatEvent::Done { pii_masked, pii_entities_count, tokens_used: token_count };
        }
    }
}

fn flush(buffer: &mut Option<StreamUnmaskBuffer<'_>>) -> Option<String> {
    buffer
        .as_mut()
        .map(|b| b.flush())
        .filter(|rest| !rest.is_empty())
}
