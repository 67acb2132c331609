//! PII kinds, findings, and masking report types.

use std::collections::HashSet;
use std::str::FromStr;

use ollqd_core::{Error, PiiConfig, Result};
use serde::{Deserialize, Serialize};

/// Kinds of PII the engine can mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiKind {
    Person,
    Org,
    Location,
    Email,
    Phone,
    Ssn,
    CreditCard,
    IpAddress,
    Iban,
    DateOfBirth,
}

impl PiiKind {
    pub const ALL: &'static [PiiKind] = &[
        Self::Person,
        Self::Org,
        Self::Location,
        Self::Email,
        Self::Phone,
        Self::Ssn,
        Self::CreditCard,
        Self::IpAddress,
        Self::Iban,
        Self::DateOfBirth,
    ];

    /// Label used inside placeholder tokens, e.g. `EMAIL` in `<EMAIL_1>`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Org => "ORG",
            Self::Location => "LOCATION",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Ssn => "SSN",
            Self::CreditCard => "CREDIT_CARD",
            Self::IpAddress => "IP_ADDRESS",
            Self::Iban => "IBAN",
            Self::DateOfBirth => "DATE_OF_BIRTH",
        }
    }

    /// Length of the longest label across all kinds.
    pub const fn max_label_len() -> usize {
        let mut max = 0;
        let mut i = 0;
        while i < Self::ALL.len() {
            let len = Self::ALL[i].label().len();
            if len > max {
                max = len;
            }
            i += 1;
        }
        max
    }

    /// Whether this kind is found by regex rather than by the entity classifier.
    pub fn is_structured(self) -> bool {
        !matches!(self, Self::Person | Self::Org | Self::Location)
    }

    /// Tie-break rank for findings with identical spans. Lower wins.
    ///
    /// Structured kinds rank in detector order, ahead of classifier kinds.
    pub fn priority(self) -> u8 {
        match self {
            Self::Email => 0,
            Self::Phone => 1,
            Self::Ssn => 2,
            Self::CreditCard => 3,
            Self::IpAddress => 4,
            Self::Iban => 5,
            Self::DateOfBirth => 6,
            Self::Person => 7,
            Self::Org => 8,
            Self::Location => 9,
        }
    }
}

impl std::fmt::Display for PiiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PiiKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::Config(format!("Unknown PII type: {}", wanted)))
    }
}

/// Which kinds are reported. Built from `PiiConfig::enabled_types`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Only(HashSet<PiiKind>),
}

impl KindFilter {
    pub fn only(kinds: impl IntoIterator<Item = PiiKind>) -> Self {
        Self::Only(kinds.into_iter().collect())
    }

    pub fn allows(&self, kind: PiiKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(kinds) => kinds.contains(&kind),
        }
    }

    /// Parse the configured type list. Unknown labels are a config error.
    pub fn from_config(config: &PiiConfig) -> Result<Self> {
        match config.enabled_type_labels() {
            None => Ok(Self::All),
            Some(labels) => labels
                .iter()
                .map(|l| l.parse::<PiiKind>())
                .collect::<Result<HashSet<_>>>()
                .map(Self::Only),
        }
    }
}

/// A detected PII span. `start`/`end` are byte offsets on char boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PiiFinding {
    #[serde(rename = "type")]
    pub kind: PiiKind,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

impl PiiFinding {
    pub fn new(kind: PiiKind, value: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            start,
            end,
        }
    }

    pub fn span_len(&self) -> usize {
        self.end - self.start
    }
}

/// A token and the value it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedEntity {
    pub token: String,
    pub original: String,
}

/// Result of masking a standalone text with a fresh registry.
#[derive(Debug, Clone, Serialize)]
pub struct MaskingReport {
    pub original: String,
    pub masked: String,
    pub entities: Vec<MaskedEntity>,
    pub entity_count: usize,
}
