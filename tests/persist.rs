//! Tests for reading and writing the XML step document.
use proptest::prelude::*;
use vmflow::error::PersistError;
use vmflow::model::{
    CatchStep, DropStep, ForStep, InvokeStep, LinkStep, SequenceStep, StepKind, StepTree,
    SwitchStep, ThrowStep,
};
use vmflow::persist::patch_service_ids;
use vmflow::prelude::*;

/// A graph touching every step type and most attributes.
fn sample_graph() -> StepGraph {
    let mut root = Step::new(StepKind::Sequence(SequenceStep {
        transaction_variable: Some("tx".to_string()),
        nested: false,
    }));
    root.id = "root".to_string();
    let mut graph = StepGraph::with_root(root);
    let root = graph.root();

    let map = graph
        .add_child(root, Step::map().with_id("map").with_comment("Lookups"))
        .unwrap();
    let mut invoke = Step::invoke("customers.lookup").with_id("call");
    if let Some(inner) = invoke.as_invoke_mut() {
        inner.result_name = "resultcall".to_string();
        inner.invocation_order = 2;
        inner.target = Some("$any:$all".to_string());
        inner.asynchronous = true;
        inner.x = 40;
        inner.y = -12;
    }
    let invoke = graph.add_child(map, invoke).unwrap();
    let mut masked = Step::link("input/name", "input/name").with_id("in");
    if let Some(link) = masked.as_link_mut() {
        link.mask = true;
        link.optional = true;
    }
    graph.add_child(invoke, masked).unwrap();
    graph
        .add_child(
            map,
            Step::fixed_value("=concat(resultcall/output/id, '!')", "output/greeting")
                .with_id("fixed"),
        )
        .unwrap();
    graph
        .add_child(map, Step::drop("resultcall").with_id("drop"))
        .unwrap();

    let mut each = Step::for_each("input/items", "item").with_id("loop");
    if let StepKind::For(inner) = &mut each.kind {
        inner.index = Some("i".to_string());
    }
    let each = graph.add_child(root, each).unwrap();
    let switch = graph
        .add_child(each, Step::switch("item/kind").with_id("switch"))
        .unwrap();
    let case = graph
        .add_child(switch, Step::sequence().with_id("caseA").with_label("A"))
        .unwrap();
    graph
        .add_child(case, Step::break_loop().with_id("stop"))
        .unwrap();

    let mut fail = Step::throw(
        Some("E42".to_string()),
        Some("a < b & 'c' \"quoted\"".to_string()),
    )
    .with_id("fail");
    fail.disabled = true;
    graph.add_child(root, fail).unwrap();

    let catch = graph
        .add_child(
            root,
            Step::catch(vec![
                "java.lang.Exception".to_string(),
                "vm.Timeout".to_string(),
            ])
            .with_id("catch"),
        )
        .unwrap();
    graph
        .add_child(catch, Step::sequence().with_id("handler"))
        .unwrap();
    graph
        .add_child(root, Step::finally().with_id("finally"))
        .unwrap();
    graph
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn test_round_trip_preserves_structure() {
    let graph = sample_graph();
    let bytes = serialize(&graph).unwrap();
    let restored = deserialize(&bytes).unwrap();
    assert_eq!(restored.to_tree(), graph.to_tree());
}

#[test]
fn test_serialize_writes_every_attribute() {
    let bytes = serialize(&sample_graph()).unwrap();
    let xml = text(&bytes);
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<sequence id=\"root\" disabled=\"false\" transactionVariable=\"tx\""));
    assert!(xml.contains("invocationOrder=\"2\""));
    assert!(xml.contains("fixedValue=\"true\""));
    assert!(xml.contains("<types>java.lang.Exception</types>"));
    assert!(xml.contains("<break id=\"stop\" disabled=\"false\"/>"));
    assert!(!xml.contains("lineNumber"));
}

#[test]
fn test_pretty_form_drops_false_defaults() {
    let graph = sample_graph();
    let bytes = serialize_pretty(&graph).unwrap();
    let xml = text(&bytes);
    assert!(!xml.contains("disabled=\"false\""));
    assert!(!xml.contains("asynchronous=\"false\""));
    assert!(xml.contains("disabled=\"true\""));
    assert!(xml.contains("mask=\"true\""));
    assert!(xml.contains("<break id=\"stop\"/>"));

    let restored = deserialize(&bytes).unwrap();
    assert_eq!(restored.to_tree(), graph.to_tree());
}

const LEGACY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<steps xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="vm.Sequence" id="root" lineNumber="0" disabled="false">
  <steps xsi:type="vm.Map" id="m1" lineNumber="1">
    <steps xsi:type="vm.steps.Invoke" id="i1" serviceId="customers.lookup" resultName="resultx" invocationOrder="0" asynchronous="false">
      <steps xsi:type="vm.Link" id="l1" from="input/name" to="input/name" mask="false"/>
    </steps>
  </steps>
</steps>
"#;

const MODERN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sequence id="root">
  <map id="m1">
    <invoke id="i1" serviceId="customers.lookup" resultName="resultx" invocationOrder="0">
      <link id="l1" from="input/name" to="input/name"/>
    </invoke>
  </map>
</sequence>
"#;

#[test]
fn test_legacy_documents_read_like_modern_ones() {
    let legacy = deserialize(LEGACY.as_bytes()).unwrap();
    let modern = deserialize(MODERN.as_bytes()).unwrap();
    assert_eq!(legacy.to_tree(), modern.to_tree());

    let map = legacy.find("m1").unwrap();
    assert_eq!(legacy.step(map).unwrap().line_number, Some(1));
}

#[test]
fn test_normalize_rewrites_legacy_tags() {
    let normalized = normalize(LEGACY).unwrap();
    assert!(normalized.contains("<invoke id=\"i1\""));
    assert!(normalized.contains("</invoke>"));
    assert!(normalized.contains("</sequence>"));
    assert!(!normalized.contains("xsi"));
    assert!(!normalized.contains("lineNumber"));
    assert!(!normalized.contains("<steps"));

    let restored = deserialize(normalized.as_bytes()).unwrap();
    let modern = deserialize(MODERN.as_bytes()).unwrap();
    assert_eq!(restored.to_tree(), modern.to_tree());
}

#[test]
fn test_unknown_attributes_are_ignored() {
    let graph = deserialize(br#"<sequence id="r" color="blue"><map id="m" lineNumber="7"/></sequence>"#)
        .unwrap();
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.step(graph.root()).unwrap().id, "r");
}

#[test]
fn test_malformed_values_are_rejected() {
    let result = deserialize(
        br#"<sequence id="r"><map id="m"><invoke id="i" serviceId="s" invocationOrder="first"/></map></sequence>"#,
    );
    assert_eq!(
        result.unwrap_err(),
        PersistError::InvalidAttribute {
            tag: "invoke".to_string(),
            attribute: "invocationOrder".to_string(),
            value: "first".to_string(),
        }
    );

    let result = deserialize(br#"<sequence id="r" disabled="yes"/>"#);
    assert!(matches!(result, Err(PersistError::InvalidAttribute { .. })));
}

#[test]
fn test_structural_errors() {
    assert_eq!(
        deserialize(br#"<sequence id="r"><loop id="x"/></sequence>"#).unwrap_err(),
        PersistError::UnknownStep("loop".to_string())
    );
    assert_eq!(
        deserialize(br#"<sequence id="r"><steps id="x"/></sequence>"#).unwrap_err(),
        PersistError::UnknownStep("steps".to_string())
    );
    assert!(matches!(
        deserialize(br#"<map id="m"/>"#),
        Err(PersistError::Structure(_))
    ));
    assert!(matches!(
        deserialize(br#"<sequence id="r"><types>x</types></sequence>"#),
        Err(PersistError::Structure(_))
    ));
    assert!(matches!(deserialize(b""), Err(PersistError::Structure(_))));
    assert!(matches!(
        deserialize(br#"<sequence id="r"><map id="m"></sequence>"#),
        Err(PersistError::Xml(_))
    ));
    assert!(matches!(
        deserialize(&[0x3c, 0xff, 0xfe]),
        Err(PersistError::Utf8(_))
    ));
}

#[test]
fn test_illegal_nesting_still_loads() {
    let graph = deserialize(br#"<sequence id="r"><invoke id="i" serviceId="s"/></sequence>"#)
        .unwrap();
    assert_eq!(graph.len(), 2);
    let mut service = VmService::new("svc").with_steps(graph);
    let messages = validate(&mut service);
    assert!(messages.iter().any(|m| m.kind == MessageKind::IllegalNesting));
}

#[test]
fn test_patch_service_ids() {
    let xml = r#"<sequence id="r">
  <map id="m">
    <invoke id="a" serviceId="old.svc" resultName="resulta"/>
    <invoke id="b" serviceId="other.svc" resultName="resultb"/>
    <invoke id="c" serviceId="old.svc" resultName="resultc"/>
    <link id="l" from="old.svc" to="output/x"/>
  </map>
</sequence>"#;
    let (patched, count) = patch_service_ids(xml, "old.svc", "new.svc").unwrap();
    assert_eq!(count, 2);

    let graph = deserialize(patched.as_bytes()).unwrap();
    let service_of = |id: &str| {
        graph
            .find(id)
            .and_then(|n| graph.step(n))
            .and_then(Step::as_invoke)
            .map(|i| i.service_id.clone())
    };
    assert_eq!(service_of("a").as_deref(), Some("new.svc"));
    assert_eq!(service_of("b").as_deref(), Some("other.svc"));
    assert_eq!(service_of("c").as_deref(), Some("new.svc"));

    let link = graph.find("l").and_then(|n| graph.step(n)).unwrap();
    assert_eq!(link.as_link().unwrap().from, "old.svc");
}

#[test]
fn test_whitespace_survives_round_trip() {
    let mut graph = StepGraph::new();
    let root = graph.root();
    graph
        .add_child(
            root,
            Step::map().with_id("m").with_comment("line1\nline2\tx\r"),
        )
        .unwrap();
    let catch = Step::catch(vec![" padded ".to_string(), String::new(), "\tx\n".to_string()])
        .with_id("c");
    graph.add_child(root, catch).unwrap();

    let xml = text(&serialize(&graph).unwrap());
    assert!(xml.contains("comment=\"line1&#10;line2&#9;x&#13;\""), "{}", xml);
    assert!(xml.contains("<types> padded </types>"));

    let restored = deserialize(xml.as_bytes()).unwrap();
    assert_eq!(restored.to_tree(), graph.to_tree());
    let pretty = serialize_pretty(&graph).unwrap();
    assert_eq!(deserialize(&pretty).unwrap().to_tree(), graph.to_tree());
}

fn any_text() -> impl Strategy<Value = String> {
    r#"[a-zA-Z0-9 <>&'"=/\n\t\r.é_-]{0,10}"#
}

fn any_step(kind: impl Strategy<Value = StepKind>) -> impl Strategy<Value = Step> {
    (
        kind,
        any_text(),
        proptest::option::of(any_text()),
        proptest::option::of(any_text()),
        proptest::option::of(any_text()),
        any::<bool>(),
    )
        .prop_map(|(kind, id, label, comment, name, disabled)| {
            let mut step = Step::new(kind);
            step.id = id;
            step.label = label;
            step.comment = comment;
            step.name = name;
            step.disabled = disabled;
            step
        })
}

fn wiring() -> impl Strategy<Value = StepTree> {
    let link = (any_text(), any_text(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(from, to, mask, optional, fixed_value)| {
            StepKind::Link(LinkStep {
                from,
                to,
                mask,
                optional,
                fixed_value,
            })
        },
    );
    let drop = any_text().prop_map(|path| StepKind::Drop(DropStep { path }));
    any_step(prop_oneof![link, drop]).prop_map(StepTree::leaf)
}

fn invoke() -> impl Strategy<Value = StepTree> {
    let kind = (
        any_text(),
        any_text(),
        any::<i32>(),
        proptest::option::of(any_text()),
        any::<bool>(),
        any::<i32>(),
        any::<i32>(),
    )
        .prop_map(
            |(service_id, result_name, invocation_order, target, asynchronous, x, y)| {
                StepKind::Invoke(InvokeStep {
                    service_id,
                    result_name,
                    invocation_order,
                    target,
                    asynchronous,
                    x,
                    y,
                })
            },
        );
    (any_step(kind), prop::collection::vec(wiring(), 0..3))
        .prop_map(|(step, children)| StepTree::with_children(step, children))
}

fn map() -> impl Strategy<Value = StepTree> {
    let child = prop_oneof![wiring(), invoke()];
    (
        any_step(Just(StepKind::Map)),
        prop::collection::vec(child, 0..4),
    )
        .prop_map(|(step, children)| StepTree::with_children(step, children))
}

fn flow() -> impl Strategy<Value = StepTree> {
    let throw = (
        any_step(
            (
                proptest::option::of(any_text()),
                proptest::option::of(any_text()),
            )
                .prop_map(|(code, message)| StepKind::Throw(ThrowStep { code, message })),
        ),
        prop::collection::vec(map(), 0..2),
    )
        .prop_map(|(step, children)| StepTree::with_children(step, children));
    let leaf = prop_oneof![
        map(),
        throw,
        any_step(Just(StepKind::Break)).prop_map(StepTree::leaf),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        let sequence = (proptest::option::of(any_text()), any::<bool>()).prop_map(
            |(transaction_variable, nested)| {
                StepKind::Sequence(SequenceStep {
                    transaction_variable,
                    nested,
                })
            },
        );
        let each = (any_text(), any_text(), proptest::option::of(any_text())).prop_map(
            |(query, variable, index)| StepKind::For(ForStep {
                query,
                variable,
                index,
            }),
        );
        let switch = any_text().prop_map(|query| StepKind::Switch(SwitchStep { query }));
        (
            any_step(prop_oneof![sequence, each, switch]),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(step, children)| StepTree::with_children(step, children))
    })
}

fn handler() -> impl Strategy<Value = StepTree> {
    let catch = (
        proptest::option::of(any_text()),
        prop::collection::vec(any_text(), 0..3),
    )
        .prop_map(|(variable, types)| StepKind::Catch(CatchStep { variable, types }));
    (
        any_step(prop_oneof![catch, Just(StepKind::Finally)]),
        prop::collection::vec(flow(), 0..3),
    )
        .prop_map(|(step, children)| StepTree::with_children(step, children))
}

fn any_graph() -> impl Strategy<Value = StepGraph> {
    let child = prop_oneof![3 => flow(), 1 => handler()];
    (
        any_step(
            (proptest::option::of(any_text()), any::<bool>()).prop_map(
                |(transaction_variable, nested)| {
                    StepKind::Sequence(SequenceStep {
                        transaction_variable,
                        nested,
                    })
                },
            ),
        ),
        prop::collection::vec(child, 0..4),
    )
        .prop_map(|(root, children)| StepGraph::from_tree(StepTree::with_children(root, children)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_graph_round_trip(graph in any_graph()) {
        let bytes = serialize(&graph).unwrap();
        prop_assert_eq!(deserialize(&bytes).unwrap().to_tree(), graph.to_tree());

        let pretty = serialize_pretty(&graph).unwrap();
        prop_assert_eq!(deserialize(&pretty).unwrap().to_tree(), graph.to_tree());
    }
}
