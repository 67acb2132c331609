//! ollqd core — shared error type and PII masking configuration.

pub mod config;
pub mod error;

pub use config::PiiConfig;
pub use error::{Error, Result};
