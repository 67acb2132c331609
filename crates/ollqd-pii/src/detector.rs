//! Regex detection of structured PII.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{KindFilter, PiiFinding, PiiKind};

// Compiled regex patterns (compiled once, reused).
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});
// Must not touch another digit on either side; see `find_phones`.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}").unwrap()
});
static SSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static CC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").unwrap());
static IP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b")
        .unwrap()
});
static IBAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z]{2}\d{2}\s?[\dA-Z]{4}\s?(?:[\dA-Z]{4}\s?){2,7}[\dA-Z]{1,4}\b").unwrap()
});
static DOB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:0[1-9]|1[0-2])[/-](?:0[1-9]|[12]\d|3[01])[/-](?:19|20)\d{2}\b").unwrap()
});

/// Stateless structured-PII scanner. Safe to share across turns.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    patterns: Vec<(PiiKind, &'static Regex)>,
}

impl PatternDetector {
    /// Detector for every structured kind.
    pub fn new() -> Self {
        Self::with_filter(&KindFilter::All)
    }

    /// Detector limited to the kinds the filter allows.
    pub fn with_filter(filter: &KindFilter) -> Self {
        let all: [(PiiKind, &'static Regex); 7] = [
            (PiiKind::Email, &*EMAIL_RE),
            (PiiKind::Phone, &*PHONE_RE),
            (PiiKind::Ssn, &*SSN_RE),
            (PiiKind::CreditCard, &*CC_RE),
            (PiiKind::IpAddress, &*IP_RE),
            (PiiKind::Iban, &*IBAN_RE),
            (PiiKind::DateOfBirth, &*DOB_RE),
        ];
        Self {
            patterns: all
                .into_iter()
                .filter(|(kind, _)| filter.allows(*kind))
                .collect(),
        }
    }

    /// Kinds this detector reports, in priority order.
    pub fn kinds(&self) -> Vec<PiiKind> {
        self.patterns.iter().map(|(kind, _)| *kind).collect()
    }

    /// Find every match of every pattern. Findings of different kinds may overlap.
    pub fn detect(&self, text: &str) -> Vec<PiiFinding> {
        let mut findings = Vec::new();

        for (kind, regex) in &self.patterns {
            if *kind == PiiKind::Phone {
                find_phones(regex, text, &mut findings);
                continue;
            }
            for m in regex.find_iter(text) {
                findings.push(PiiFinding::new(*kind, m.as_str(), m.start(), m.end()));
            }
        }

        findings
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// One element of the phone grammar, matched with greedy backtracking.
#[derive(Debug, Clone, Copy)]
enum PhoneStep {
    Digits(usize, usize),
    Optional(fn(char) -> bool),
    OptionalGroup(&'static [PhoneStep]),
}

// (?:\+?\d{1,3}[-.\s]?)?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}
const PHONE_STEPS: &[PhoneStep] = &[
    PhoneStep::OptionalGroup(&[
        PhoneStep::Optional(is_plus),
        PhoneStep::Digits(1, 3),
        PhoneStep::Optional(is_separator),
    ]),
    PhoneStep::Optional(is_open_paren),
    PhoneStep::Digits(2, 4),
    PhoneStep::Optional(is_close_paren),
    PhoneStep::Optional(is_separator),
    PhoneStep::Digits(3, 4),
    PhoneStep::Optional(is_separator),
    PhoneStep::Digits(3, 4),
];

/// Longest possible phone match, in chars.
const PHONE_MAX_CHARS: usize = 21;

fn is_digit(c: char) -> bool {
    c.is_numeric()
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '.' || c.is_whitespace()
}

fn is_plus(c: char) -> bool {
    c == '+'
}

fn is_open_paren(c: char) -> bool {
    c == '('
}

fn is_close_paren(c: char) -> bool {
    c == ')'
}

/// Try `steps` at `pos`, greedy first, calling `accept` on each candidate end
/// until it returns true.
fn match_steps(
    steps: &[PhoneStep],
    chars: &[char],
    pos: usize,
    accept: &mut dyn FnMut(usize) -> bool,
) -> bool {
    let Some((step, rest)) = steps.split_first() else {
        return accept(pos);
    };

    match *step {
        PhoneStep::Digits(min, max) => {
            let available = chars[pos..]
                .iter()
                .take(max)
                .take_while(|c| is_digit(**c))
                .count();
            (min..=available)
                .rev()
                .any(|n| match_steps(rest, chars, pos + n, &mut *accept))
        }
        PhoneStep::Optional(accepts) => {
            let here = chars.get(pos).is_some_and(|c| accepts(*c));
            (here && match_steps(rest, chars, pos + 1, &mut *accept))
                || match_steps(rest, chars, pos, accept)
        }
        PhoneStep::OptionalGroup(inner) => {
            let mut then_rest = |end: usize| match_steps(rest, chars, end, &mut *accept);
            if match_steps(inner, chars, pos, &mut then_rest) {
                return true;
            }
            match_steps(rest, chars, pos, accept)
        }
    }
}

/// Byte end of a phone number starting at `start` that is not followed by a digit.
fn match_phone_at(text: &str, start: usize) -> Option<usize> {
    let window: Vec<(usize, char)> = text[start..]
        .char_indices()
        .take(PHONE_MAX_CHARS + 1)
        .collect();
    let chars: Vec<char> = window.iter().map(|(_, c)| *c).collect();

    let mut found = None;
    match_steps(PHONE_STEPS, &chars, 0, &mut |end| {
        if chars.get(end).is_some_and(|c| is_digit(*c)) {
            return false;
        }
        found = Some(end);
        true
    });

    found.map(|end| window.get(end).map_or(text.len(), |(offset, _)| start + offset))
}

/// Phone numbers that neither touch a digit before nor after.
///
/// `regex` has no lookaround, so `PHONE_RE` only locates the leftmost place a
/// number could start; each start is then matched with backtracking so a
/// shorter reading is tried when the longest one runs into a digit.
fn find_phones(regex: &Regex, text: &str, out: &mut Vec<PiiFinding>) {
    let mut pos = 0;
    while pos < text.len() {
        let Some(m) = regex.find_at(text, pos) else {
            break;
        };
        let start = m.start();

        let digit_before = text[..start].chars().next_back().is_some_and(is_digit);
        if !digit_before {
            if let Some(end) = match_phone_at(text, start) {
                out.push(PiiFinding::new(PiiKind::Phone, &text[start..end], start, end));
                pos = end;
                continue;
            }
        }

        pos = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_of(findings: &[PiiFinding]) -> Vec<PiiKind> {
        findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_detect_email() {
        let detector = PatternDetector::new();
        let findings = detector.detect("Contact me at user@example.com for details.");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, PiiKind::Email);
        assert_eq!(findings[0].value, "user@example.com");
        assert_eq!(findings[0].start, 14);
        assert_eq!(findings[0].end, 30);
    }

    #[test]
    fn test_detect_phone() {
        let detector = PatternDetector::new();
        let findings = detector.detect("Call Sarah at +1-555-867-5309 for the meeting.");
        let phones: Vec<_> = findings.iter().filter(|f| f.kind == PiiKind::Phone).collect();
        assert_eq!(phones.len(), 1);
        assert!(phones[0].value.contains("555-867-5309"));
    }

    #[test]
    fn test_phone_rejects_longer_digit_runs() {
        let detector = PatternDetector::with_filter(&KindFilter::only([PiiKind::Phone]));
        assert!(detector.detect("order 12345678901234567890 shipped").is_empty());
    }

    fn phone_spans(text: &str) -> Vec<(usize, usize)> {
        PatternDetector::with_filter(&KindFilter::only([PiiKind::Phone]))
            .detect(text)
            .iter()
            .map(|f| (f.start, f.end))
            .collect()
    }

    #[test]
    fn test_phone_backtracks_to_shorter_reading() {
        // The longest reading from each start runs into a digit; a shorter one fits.
        assert_eq!(phone_spans("87656431 70532"), vec![(0, 8)]);
        assert_eq!(phone_spans("05.856771 666757(9"), vec![(0, 9)]);
        assert_eq!(phone_spans("5+786909262.40143046(0"), vec![(2, 11), (12, 20)]);
        assert_eq!(phone_spans("ref 555123456789 now"), vec![(4, 16)]);
    }

    #[test]
    fn test_phone_common_formats() {
        assert_eq!(phone_spans("call 555 1234 5678 12 today"), vec![(5, 18)]);
        let text = "tel (030) 1234 5678, fax +49 30 123 4567";
        let findings = PatternDetector::with_filter(&KindFilter::only([PiiKind::Phone])).detect(text);
        let values: Vec<&str> = findings.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["(030) 1234 5678", "+49 30 123 4567"]);
    }

    #[test]
    fn test_detect_ssn() {
        let detector = PatternDetector::new();
        let findings = detector.detect("My SSN is 123-45-6789.");
        let ssn: Vec<_> = findings.iter().filter(|f| f.kind == PiiKind::Ssn).collect();
        assert_eq!(ssn.len(), 1);
        assert_eq!(ssn[0].value, "123-45-6789");
    }

    #[test]
    fn test_detect_credit_card() {
        let detector = PatternDetector::new();
        let text = "Card: 4111 1111 1111 1111 expires soon";
        let findings = detector.detect(text);
        let card = findings
            .iter()
            .find(|f| f.kind == PiiKind::CreditCard)
            .expect("card detected");
        assert_eq!(card.value, "4111 1111 1111 1111");
    }

    #[test]
    fn test_detect_ip() {
        let detector = PatternDetector::new();
        let findings = detector.detect("Server at 192.168.1.100 is down.");
        let ip = findings
            .iter()
            .find(|f| f.kind == PiiKind::IpAddress)
            .expect("ip detected");
        assert_eq!(ip.value, "192.168.1.100");
    }

    #[test]
    fn test_detect_iban() {
        let detector = PatternDetector::new();
        let findings = detector.detect("Wire it to DE89 3704 0044 0532 0130 00 today");
        let iban = findings
            .iter()
            .find(|f| f.kind == PiiKind::Iban)
            .expect("iban detected");
        assert_eq!(iban.value, "DE89 3704 0044 0532 0130 00");
    }

    #[test]
    fn test_detect_date_of_birth() {
        let detector = PatternDetector::new();
        let findings = detector.detect("Born 04/17/1985 in a small town");
        assert_eq!(kinds_of(&findings), vec![PiiKind::DateOfBirth]);
        assert_eq!(findings[0].value, "04/17/1985");
    }

    #[test]
    fn test_no_pii() {
        let detector = PatternDetector::new();
        assert!(detector
            .detect("The system processes batches of 32.")
            .is_empty());
    }

    #[test]
    fn test_filter_limits_kinds() {
        let detector = PatternDetector::with_filter(&KindFilter::only([PiiKind::Ssn]));
        assert_eq!(detector.kinds(), vec![PiiKind::Ssn]);
        let findings = detector.detect("a@b.com and 123-45-6789");
        assert_eq!(kinds_of(&findings), vec![PiiKind::Ssn]);
    }

    #[test]
    fn test_offsets_with_multibyte_prefix() {
        let detector = PatternDetector::new();
        let text = "Grüße an jane@example.org";
        let findings = detector.detect(text);
        assert_eq!(findings.len(), 1);
        assert_eq!(&text[findings[0].start..findings[0].end], "jane@example.org");
    }
}
