//! Chat-turn glue for PII masking.
//!
//! A [`PiiTurn`] masks the user query and retrieved context into one
//! per-turn registry, builds the prompt, and turns the model's token stream
//! into user-facing [`ChatEvent`]s with the original values restored.

pub mod turn;
pub mod types;

pub use turn::PiiTurn;
pub use types::*;
