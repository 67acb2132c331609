//! Streaming unmask: restores PII values in LLM output that arrives in
//! arbitrary fragments.
//!
//! States:
//! - `Normal`: characters pass through; `<` switches to `Buffering`.
//! - `Buffering`: characters accumulate as a candidate token. `>` closes it
//!   and emits either the original value or the literal text. A second `<`
//!   releases the pending text and starts a new candidate. Candidates longer
//!   than [`MAX_TOKEN_LEN`] are released literally.

use crate::registry::EntityRegistry;
use crate::types::PiiKind;

/// Decimal digits in the largest per-kind counter.
const COUNTER_DIGITS: usize = (u64::MAX.ilog10() + 1) as usize;

/// Longest possible token: `<` + label + `_` + counter + `>`.
pub const MAX_TOKEN_LEN: usize = PiiKind::max_label_len() + COUNTER_DIGITS + 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferState {
    Normal,
    Buffering,
}

/// Per-response decoder. Borrows the turn's registry read-only.
#[derive(Debug)]
pub struct StreamUnmaskBuffer<'r> {
    registry: &'r EntityRegistry,
    state: BufferState,
    pending: String,
    /// Length of `pending` in chars.
    pending_chars: usize,
}

impl<'r> StreamUnmaskBuffer<'r> {
    pub fn new(registry: &'r EntityRegistry) -> Self {
        Self {
            registry,
            state: BufferState::Normal,
            pending: String::new(),
            pending_chars: 0,
        }
    }

    /// Process one fragment; returns only text that is safe to release now.
    pub fn feed(&mut self, chunk: &str) -> String {
        let mut out = String::with_capacity(chunk.len());

        for c in chunk.chars() {
            match self.state {
                BufferState::Normal => {
                    if c == '<' {
                        self.start_candidate();
                    } else {
                        out.push(c);
                    }
                }
                BufferState::Buffering => {
                    if c == '<' {
                        // Tokens never contain '<': what we have is plain text.
                        out.push_str(&self.pending);
                        self.start_candidate();
                        continue;
                    }

                    self.pending.push(c);
                    self.pending_chars += 1;

                    if c == '>' {
                        match self.registry.lookup(&self.pending) {
                            Some(value) => out.push_str(value),
                            None => out.push_str(&self.pending),
                        }
                        self.reset();
                    } else if self.pending_chars > MAX_TOKEN_LEN {
                        out.push_str(&self.pending);
                        self.reset();
                    }
                }
            }
        }

        out
    }

    /// End of stream: release whatever is still pending, verbatim.
    pub fn flush(&mut self) -> String {
        let remaining = std::mem::take(&mut self.pending);
        self.reset();
        remaining
    }

    /// Whether a partial token is currently held back.
    pub fn is_buffering(&self) -> bool {
        self.state == BufferState::Buffering
    }

    fn start_candidate(&mut self) {
        self.state = BufferState::Buffering;
        self.pending.clear();
        self.pending.push('<');
        self.pending_chars = 1;
    }

    fn reset(&mut self) {
        self.state = BufferState::Normal;
        self.pending.clear();
        self.pending_chars = 0;
    }
}
