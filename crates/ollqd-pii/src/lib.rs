//! Reversible PII masking for LLM prompts and streamed responses.
//!
//! Structured PII (email, phone, SSN, card numbers, IP, IBAN, dates of birth)
//! is found by regex; names and organizations come from a pluggable
//! [`EntityClassifier`]. Each chat turn owns an [`EntityRegistry`] that maps
//! values to stable `<KIND_N>` tokens, and a [`StreamUnmaskBuffer`] restores
//! the original values in the model's streamed output, even when a token is
//! split across chunks.

pub mod classifier;
pub mod detector;
pub mod masking;
pub mod registry;
pub mod service;
pub mod stream;
pub mod types;

pub use classifier::{EntityClassifier, HeuristicClassifier, LazyClassifier};
pub use detector::PatternDetector;
pub use masking::MaskingPass;
pub use registry::EntityRegistry;
pub use service::{PiiService, PII_SYSTEM_INSTRUCTION};
pub use stream::{StreamUnmaskBuffer, MAX_TOKEN_LEN};
pub use types::{KindFilter, MaskedEntity, MaskingReport, PiiFinding, PiiKind};
