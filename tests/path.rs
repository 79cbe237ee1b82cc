//! Tests for the path expression model and the expression tokenizer.
use proptest::prelude::*;
use vmflow::model::Element;
use vmflow::path::{
    ParsedPath, PathIndex, TokenKind, expression_body, loose_variables, root_of, tokenize,
    variables,
};

#[test]
fn test_parse_literal_index() {
    let path = ParsedPath::parse("a/b[2]/c").unwrap();
    assert_eq!(path.name, "a");
    assert_eq!(path.index, None);

    let b = path.child.as_deref().unwrap();
    assert_eq!(b.name, "b");
    assert_eq!(b.index, Some(PathIndex::Literal(2)));

    let c = b.child.as_deref().unwrap();
    assert_eq!(c.name, "c");
    assert_eq!(c.index, None);
    assert!(c.child.is_none());

    assert!(!path.has_index_query());
    assert_eq!(path.depth(), 3);
    assert_eq!(path.names(), vec!["a", "b", "c"]);
}

#[test]
fn test_parse_index_query() {
    let path = ParsedPath::parse("a/b[x+1]/c").unwrap();
    let b = path.child.as_deref().unwrap();
    assert_eq!(b.index, Some(PathIndex::Query("x+1".to_string())));
    assert!(path.has_index_query());
    assert_eq!(path.index_queries().collect::<Vec<_>>(), vec!["x+1"]);
}

#[test]
fn test_non_canonical_numbers_are_queries() {
    let path = ParsedPath::parse("items[01]").unwrap();
    assert_eq!(path.index, Some(PathIndex::Query("01".to_string())));
    assert_eq!(path.to_string(), "items[01]");

    let zero = ParsedPath::parse("items[0]").unwrap();
    assert_eq!(zero.index, Some(PathIndex::Literal(0)));
}

#[test]
fn test_nested_brackets_in_index() {
    let text = "orders[lines[0]/qty]/id";
    let path = ParsedPath::parse(text).unwrap();
    assert_eq!(
        path.index,
        Some(PathIndex::Query("lines[0]/qty".to_string()))
    );
    assert_eq!(path.last().name, "id");
    assert_eq!(path.to_string(), text);
}

#[test]
fn test_parse_errors() {
    for text in ["", "a//b", "/a", "a/", "a[", "a[1]x", "[1]", "a[]", "a]", "a[1][2]"] {
        let error = ParsedPath::parse(text).unwrap_err();
        assert_eq!(error.text, text);
    }
}

#[test]
fn test_rename_root_and_root_of() {
    let mut path = ParsedPath::parse("resultold/output/id").unwrap();
    path.rename_root("resultnew");
    assert_eq!(path.to_string(), "resultnew/output/id");

    assert_eq!(root_of("resultabc/output/id"), "resultabc");
    assert_eq!(root_of("items[2]/name"), "items");
    assert_eq!(root_of("input"), "input");
}

#[test]
fn test_set_default_index() {
    let slots = vec![Element::complex(
        "input",
        vec![Element::complex(
            "orders",
            vec![Element::scalar("lines", "string").as_list()],
        )
        .as_list()],
    )];

    let mut without_last = ParsedPath::parse("input/orders/lines").unwrap();
    without_last.set_default_index(&slots, false);
    assert_eq!(without_last.to_string(), "input/orders[0]/lines");

    let mut with_last = ParsedPath::parse("input/orders/lines").unwrap();
    with_last.set_default_index(&slots, true);
    assert_eq!(with_last.to_string(), "input/orders[0]/lines[0]");

    let mut explicit = ParsedPath::parse("input/orders[3]/lines").unwrap();
    explicit.set_default_index(&slots, true);
    assert_eq!(explicit.to_string(), "input/orders[3]/lines[0]");
}

#[test]
fn test_tokenize_division_and_paths() {
    let tokens = tokenize("input/total / 2").unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Variable, TokenKind::Operator, TokenKind::Number]
    );
    assert_eq!(tokens[0].text, "input/total");
    assert_eq!(tokens[1].text, "/");
}

#[test]
fn test_tokenize_functions_keywords_and_strings() {
    let tokens = tokenize("concat(input/name, 'x') and not true").unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Function,
            TokenKind::Punct,
            TokenKind::Variable,
            TokenKind::Punct,
            TokenKind::String,
            TokenKind::Punct,
            TokenKind::Keyword,
            TokenKind::Keyword,
            TokenKind::Keyword,
        ]
    );
    assert!(tokenize("'unterminated").is_err());
}

#[test]
fn test_variables_include_index_queries() {
    let found = variables("input/items[input/position + 1]/price * rate").unwrap();
    let texts: Vec<String> = found.iter().map(ToString::to_string).collect();
    assert_eq!(
        texts,
        vec![
            "input/items[input/position + 1]/price".to_string(),
            "input/position".to_string(),
            "rate".to_string(),
        ]
    );
}

#[test]
fn test_tokenize_conditional_and_match_operators() {
    let tokens = tokenize("input/age > 17 ? 'adult' : input/code =~ 'A.*'").unwrap();
    let operators: Vec<&str> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Operator)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(operators, vec![">", "?", ":", "=~"]);
    assert!(tokenize("input/a # 1").is_err());
}

#[test]
fn test_loose_variables_skip_strings() {
    let found = loose_variables("input/age # 'input/name' [input/zip");
    let texts: Vec<String> = found.iter().map(ToString::to_string).collect();
    assert_eq!(texts, vec!["input/age".to_string(), "input/zip".to_string()]);

    let unterminated = loose_variables("input/a == 'open");
    let texts: Vec<String> = unterminated.iter().map(ToString::to_string).collect();
    assert_eq!(texts, vec!["input/a".to_string(), "open".to_string()]);
}

#[test]
fn test_expression_body() {
    assert_eq!(expression_body("=input/a + 1"), Some("input/a + 1"));
    assert_eq!(expression_body("literal"), None);
}

fn path_strategy() -> impl Strategy<Value = String> {
    let name = "[a-zA-Z_][a-zA-Z0-9_.]{0,8}";
    let index = prop_oneof![
        Just(None),
        (0usize..50).prop_map(|n| Some(n.to_string())),
        "[a-z]{1,3}(\\+[0-9])?".prop_map(Some),
    ];
    prop::collection::vec((name, index), 1..5).prop_map(|segments| {
        segments
            .into_iter()
            .map(|(name, index)| match index {
                Some(index) => format!("{}[{}]", name, index),
                None => name,
            })
            .collect::<Vec<_>>()
            .join("/")
    })
}

proptest! {
    #[test]
    fn test_path_round_trip(text in path_strategy()) {
        let parsed = ParsedPath::parse(&text).unwrap();
        prop_assert_eq!(parsed.to_string(), text.clone());
        prop_assert_eq!(ParsedPath::parse(&parsed.to_string()).unwrap(), parsed);
    }
}
