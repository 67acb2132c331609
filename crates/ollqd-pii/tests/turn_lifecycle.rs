//! End-to-end turn: mask a prompt, stream a fragmented model reply back.

use std::sync::Arc;

use ollqd_core::PiiConfig;
use ollqd_pii::{
    EntityClassifier, EntityRegistry, KindFilter, LazyClassifier, MaskingPass, PiiFinding,
    PiiKind, PiiService,
};

/// Stand-in for an NER model that reports a full name plus its parts.
struct NameTagger;

impl EntityClassifier for NameTagger {
    fn name(&self) -> &str {
        "name-tagger"
    }

    fn detect_entities(&self, text: &str) -> Vec<PiiFinding> {
        let mut findings = Vec::new();
        for name in ["Jane Doe", "Jane", "Doe"] {
            for (start, _) in text.match_indices(name) {
                findings.push(PiiFinding::new(PiiKind::Person, name, start, start + name.len()));
            }
        }
        findings
    }
}

fn service() -> PiiService {
    PiiService::with_classifier(
        PiiConfig::default(),
        LazyClassifier::ready(Arc::new(NameTagger)),
    )
    .unwrap()
}

#[test]
fn test_full_turn_with_fragmented_reply() {
    let svc = service();
    let mut registry = svc.create_registry();

    let masked = svc.mask_text(
        "Summarize the email from Jane Doe (jane@example.com, SSN 123-45-6789).",
        &mut registry,
    );
    assert_eq!(
        masked,
        "Summarize the email from <PERSON_1> (<EMAIL_1>, SSN <SSN_1>)."
    );
    assert!(registry.has_entities());

    let reply = ["<PERSON", "_1> wrote from <", "EMAIL_1", ">. Their SSN <S", "SN_1> is on ", "file", "."];
    let mut buffer = svc.create_stream_buffer(&registry);
    let mut out = String::new();
    for fragment in reply {
        out.push_str(&buffer.feed(fragment));
    }
    out.push_str(&buffer.flush());

    assert_eq!(
        out,
        "Jane Doe wrote from jane@example.com. Their SSN 123-45-6789 is on file."
    );
    assert_eq!(out, registry.unmask(&reply.concat()));
}

#[test]
fn test_split_token_emits_only_when_complete() {
    let mut registry = EntityRegistry::new();
    registry.get_or_create_token(PiiKind::Person, "Jane Doe");
    let svc = service();
    let mut buffer = svc.create_stream_buffer(&registry);
    assert_eq!(buffer.feed("<PER"), "");
    assert_eq!(buffer.feed("SON_1>"), "Jane Doe");
}

#[test]
fn test_stream_ending_mid_token_is_not_dropped() {
    let registry = EntityRegistry::new();
    let svc = service();
    let mut buffer = svc.create_stream_buffer(&registry);
    assert_eq!(buffer.feed("see <PERS"), "see ");
    assert_eq!(buffer.flush(), "<PERS");
}

#[test]
fn test_full_name_masked_as_one_unit() {
    let svc = service();
    let mut registry = svc.create_registry();
    let masked = svc.mask_text("Jane Doe met Jane again", &mut registry);
    assert_eq!(masked, "<PERSON_1> met <PERSON_2> again");
    assert_eq!(registry.lookup("<PERSON_1>"), Some("Jane Doe"));
    assert_eq!(registry.lookup("<PERSON_2>"), Some("Jane"));
}

#[test]
fn test_registries_are_isolated_per_turn() {
    let svc = service();
    let mut first = svc.create_registry();
    let mut second = svc.create_registry();
    svc.mask_text("a@example.com", &mut first);
    let masked = svc.mask_text("b@example.com", &mut second);
    assert_eq!(masked, "<EMAIL_1>");
    assert_eq!(second.unmask("<EMAIL_1>"), "b@example.com");
    assert_eq!(first.unmask("<EMAIL_1>"), "a@example.com");
}

#[test]
fn test_turns_run_in_parallel() {
    let svc = Arc::new(service());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let svc = svc.clone();
            std::thread::spawn(move || {
                let mut registry = svc.create_registry();
                let text = format!("user{}@example.com", i);
                let masked = svc.mask_text(&text, &mut registry);
                assert_eq!(masked, "<EMAIL_1>");
                registry.unmask(&masked) == text
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }
}

#[test]
fn test_regex_only_pass_ignores_names() {
    let pass = MaskingPass::new(KindFilter::All, None);
    let mut registry = EntityRegistry::new();
    assert_eq!(pass.mask("Jane Doe", &mut registry), "Jane Doe");
    assert!(registry.is_empty());
}
