//! Tests for the validation pass.
mod common;
use common::{RESULT_A, add_invoke, customer_repository, service_with_map};
use vmflow::prelude::*;

fn kinds(messages: &[ValidationMessage]) -> Vec<MessageKind> {
    messages.iter().map(|m| m.kind).collect()
}

#[test]
fn test_clean_service_has_no_messages() {
    let repository = customer_repository();
    let (mut service, map) = service_with_map();
    let invoke = add_invoke(&mut service, map, "customers.lookup", RESULT_A, 0);
    service
        .steps
        .add_child(invoke, Step::link("input/name", "input/name"))
        .unwrap();
    service
        .steps
        .add_child(map, Step::drop(RESULT_A))
        .unwrap();

    let config = EditorConfig::default();
    let messages = Validator::new(&config)
        .with_repository(&repository)
        .validate(&mut service);
    assert!(messages.is_empty(), "unexpected messages: {:?}", messages);
}

#[test]
fn test_switch_with_one_default_is_valid() {
    let mut service = VmService::new("svc");
    let root = service.steps.root();
    let switch = service
        .steps
        .add_child(root, Step::switch("input/kind"))
        .unwrap();
    service
        .steps
        .add_child(switch, Step::sequence().with_label("A"))
        .unwrap();
    service.steps.add_child(switch, Step::sequence()).unwrap();
    assert!(!kinds(&validate(&mut service)).contains(&MessageKind::DuplicateCase));

    service.steps.add_child(switch, Step::sequence()).unwrap();
    let messages = validate(&mut service);
    let duplicates: Vec<_> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::DuplicateCase)
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert!(duplicates[0].is_error());
    assert_eq!(service.steps.locate(&duplicates[0].context), Some(switch));
}

#[test]
fn test_switch_with_repeated_labels() {
    let mut service = VmService::new("svc");
    let root = service.steps.root();
    let switch = service
        .steps
        .add_child(root, Step::switch("input/kind"))
        .unwrap();
    for label in ["A", "B", "A"] {
        service
            .steps
            .add_child(switch, Step::sequence().with_label(label))
            .unwrap();
    }
    let messages = validate(&mut service);
    let duplicates: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::DuplicateCase)
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert!(duplicates[0].message.contains("'A'"));
}

#[test]
fn test_duplicate_ids_are_repaired() {
    let mut service = VmService::new("svc");
    let root = service.steps.root();
    let first = service
        .steps
        .add_child(root, Step::map().with_id("dup"))
        .unwrap();
    let second = service
        .steps
        .add_child(root, Step::map().with_id("dup"))
        .unwrap();
    let blank = service
        .steps
        .add_child(root, Step::map().with_id(""))
        .unwrap();

    let messages = validate(&mut service);
    let repaired: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::DuplicateId)
        .collect();
    assert_eq!(repaired.len(), 2);
    assert!(repaired.iter().all(|m| m.severity == Severity::Info));

    let id = |node| service.steps.step(node).unwrap().id.clone();
    assert_eq!(id(first), "dup");
    assert_ne!(id(second), "dup");
    assert!(!id(blank).is_empty());
    assert_ne!(id(second), id(blank));

    // A second pass finds nothing left to repair.
    assert!(!kinds(&validate(&mut service)).contains(&MessageKind::DuplicateId));
}

#[test]
fn test_break_needs_an_enclosing_loop() {
    let mut service = VmService::new("svc");
    let root = service.steps.root();
    let stray = service.steps.add_child(root, Step::break_loop()).unwrap();
    let each = service
        .steps
        .add_child(root, Step::for_each("input/items", "item"))
        .unwrap();
    let body = service.steps.add_child(each, Step::sequence()).unwrap();
    service.steps.add_child(body, Step::break_loop()).unwrap();

    let messages = validate(&mut service);
    let misplaced: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::Misplaced)
        .collect();
    assert_eq!(misplaced.len(), 1);
    assert_eq!(service.steps.locate(&misplaced[0].context), Some(stray));
}

#[test]
fn test_missing_attributes() {
    let (mut service, map) = service_with_map();
    let root = service.steps.root();
    service.steps.add_child(root, Step::throw(None, None)).unwrap();
    service
        .steps
        .add_child(root, Step::for_each("input/items", ""))
        .unwrap();
    service
        .steps
        .add_child(map, Step::link("input/name", ""))
        .unwrap();

    let messages = validate(&mut service);
    let missing: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::MissingAttribute)
        .collect();
    assert_eq!(missing.len(), 3);
    assert!(missing[0].is_error());
    assert!(missing[0].message.contains("'to'"));
    assert_eq!(missing[1].severity, Severity::Warning);
    assert!(missing[2].is_error());
    assert!(missing[2].message.contains("'variable'"));
}

#[test]
fn test_syntax_errors() {
    let (mut service, map) = service_with_map();
    let root = service.steps.root();
    service
        .steps
        .add_child(map, Step::link("input//name", "output/greeting"))
        .unwrap();
    service
        .steps
        .add_child(root, Step::switch("'unterminated"))
        .unwrap();
    service
        .steps
        .add_child(
            root,
            Step::throw(None, Some("='open".to_string())),
        )
        .unwrap();
    service
        .steps
        .add_child(root, Step::throw(None, Some("plain text (not parsed".to_string())))
        .unwrap();

    let messages = validate(&mut service);
    let parse_errors = messages
        .iter()
        .filter(|m| m.kind == MessageKind::ParseError)
        .count();
    assert_eq!(parse_errors, 3);
}

#[test]
fn test_runtime_index_is_informational() {
    let (mut service, map) = service_with_map();
    service
        .steps
        .add_child(map, Step::link("input/items[input/age]/x", "output/greeting"))
        .unwrap();

    let messages = validate(&mut service);
    let runtime: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::RuntimeIndex)
        .collect();
    assert_eq!(runtime.len(), 1);
    assert_eq!(runtime[0].severity, Severity::Info);

    let config = EditorConfig::default().with_index_query_reports(false);
    let messages = Validator::new(&config).validate(&mut service);
    assert!(!kinds(&messages).contains(&MessageKind::RuntimeIndex));
}

#[test]
fn test_repository_checks() {
    let repository = customer_repository()
        .with_interface("customers.api", ServiceSignature::default());
    let (mut service, map) = service_with_map();
    add_invoke(&mut service, map, "customers.missing", "resultmissing", 0);
    add_invoke(&mut service, map, "customers.api", "resultapi", 0);
    let remote = add_invoke(&mut service, map, "customers.lookup", RESULT_A, 0);
    let clustered = add_invoke(&mut service, map, "customers.greet", "resultgreet", 0);
    service
        .steps
        .step_mut(remote)
        .and_then(Step::as_invoke_mut)
        .unwrap()
        .target = Some("runner-us".to_string());
    service
        .steps
        .step_mut(clustered)
        .and_then(Step::as_invoke_mut)
        .unwrap()
        .target = Some("$any".to_string());
    service
        .steps
        .add_child(map, Step::link("input/nickname", "output/greeting"))
        .unwrap();

    // Without a repository none of these can be checked.
    let offline = validate(&mut service);
    assert!(offline.is_empty(), "unexpected messages: {:?}", offline);

    let config = EditorConfig::default();
    let messages = Validator::new(&config)
        .with_repository(&repository)
        .validate(&mut service);
    let unknown_services: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::UnknownService)
        .collect();
    assert_eq!(unknown_services.len(), 2);
    assert!(unknown_services.iter().all(|m| m.is_error()));

    let targets: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::UnknownTarget)
        .collect();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].severity, Severity::Warning);
    assert_eq!(service.steps.locate(&targets[0].context), Some(remote));

    let unresolved: Vec<&ValidationMessage> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::UnresolvedReference)
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message.contains("input/nickname"));
}

#[test]
fn test_message_rendering() {
    let message = ValidationMessage::error(
        MessageKind::DuplicateCase,
        "Switch has 2 default cases",
        vec!["sequence:root".to_string(), "switch:s1".to_string()],
    );
    assert_eq!(
        message.to_string(),
        "[ERROR] Switch has 2 default cases (sequence:root > switch:s1)"
    );

    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["severity"], "ERROR");
    assert_eq!(json["kind"], "duplicateCase");
    assert_eq!(json["context"][1], "switch:s1");

    let bare = ValidationMessage::info(MessageKind::RuntimeIndex, "computed", Vec::new());
    assert_eq!(bare.to_string(), "[INFO] computed");
}
