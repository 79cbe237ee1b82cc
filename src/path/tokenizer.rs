use super::parsed::{ParsedPath, scan_index};
use crate::error::PathParseError;

/// Kinds of tokens in the query/expression mini-language used by
/// for-loops, switches, fixed-value links and throw messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A path reference such as `input/items[i]/name`.
    Variable,
    Number,
    String,
    /// An identifier immediately followed by `(`.
    Function,
    Keyword,
    Operator,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "true", "false", "null", "div", "mod", "eq", "ne", "lt", "gt", "le", "ge",
];

const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "=~", "!~", "+", "-", "*", "/", "%", "<", ">", "!", "=",
    "~", "?", ":",
];

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$' || c == '@'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '@' | '.' | ':')
}

/// Strips the leading `=` that marks an attribute as an expression.
pub fn expression_body(text: &str) -> Option<&str> {
    text.strip_prefix('=')
}

/// Splits an expression into tokens.
///
/// A `/` glued between two identifiers is a path separator; a `/` with
/// whitespace (or a non-identifier) on either side is division.
pub fn tokenize(expr: &str) -> Result<Vec<Token>, PathParseError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        if c == '\'' || c == '"' {
            pos += 1;
            let mut closed = false;
            while pos < chars.len() {
                if chars[pos] == '\\' {
                    pos += 2;
                    continue;
                }
                if chars[pos] == c {
                    closed = true;
                    break;
                }
                pos += 1;
            }
            if !closed {
                return Err(PathParseError::new(expr, start, "unterminated string"));
            }
            pos += 1;
            tokens.push(token(TokenKind::String, &chars[start..pos], start));
        } else if c.is_ascii_digit() {
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            tokens.push(token(TokenKind::Number, &chars[start..pos], start));
        } else if is_ident_start(c) {
            pos = scan_variable(expr, &chars, pos)?;
            let text: String = chars[start..pos].iter().collect();
            let mut next = pos;
            while next < chars.len() && chars[next].is_whitespace() {
                next += 1;
            }
            let kind = if next < chars.len() && chars[next] == '(' && !text.contains(['/', '[']) {
                TokenKind::Function
            } else if KEYWORDS.contains(&text.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Variable
            };
            tokens.push(Token {
                kind,
                text,
                position: start,
            });
        } else if matches!(c, '(' | ')' | ',' | '[' | ']' | '{' | '}' | ';') {
            pos += 1;
            tokens.push(token(TokenKind::Punct, &chars[start..pos], start));
        } else {
            let rest: String = chars[pos..chars.len().min(pos + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| {
                    PathParseError::new(expr, pos, format!("unexpected character '{}'", c))
                })?;
            pos += op.chars().count();
            tokens.push(Token {
                kind: TokenKind::Operator,
                text: op.to_string(),
                position: start,
            });
        }
    }
    Ok(tokens)
}

/// Every variable referenced by `expr`, including those nested inside the
/// index sub-expressions of other variables. Order is first occurrence.
pub fn variables(expr: &str) -> Result<Vec<ParsedPath>, PathParseError> {
    let mut found = Vec::new();
    collect_variables(expr, &mut found)?;
    Ok(found)
}

fn collect_variables(expr: &str, found: &mut Vec<ParsedPath>) -> Result<(), PathParseError> {
    for token in tokenize(expr)? {
        if token.kind != TokenKind::Variable {
            continue;
        }
        let path = ParsedPath::parse(&token.text)?;
        let nested: Vec<String> = path.index_queries().map(str::to_string).collect();
        found.push(path);
        for query in nested {
            collect_variables(&query, found)?;
        }
    }
    Ok(())
}

/// Best-effort variables of text that does not tokenize.
///
/// Every run of identifiers glued by `/` outside a closed string literal is
/// taken as a path. Brackets end a run; their contents are scanned as runs of
/// their own.
pub fn loose_variables(text: &str) -> Vec<ParsedPath> {
    let chars: Vec<char> = text.chars().collect();
    let mut found = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let c = chars[pos];
        if c == '\'' || c == '"' {
            if let Some(close) = chars[pos + 1..].iter().position(|&q| q == c) {
                pos += close + 2;
                continue;
            }
        }
        let glued_to_previous = pos > 0 && (is_ident_char(chars[pos - 1]) || chars[pos - 1] == '/');
        if !is_ident_start(c) || glued_to_previous {
            pos += 1;
            continue;
        }
        let start = pos;
        loop {
            while pos < chars.len() && is_ident_char(chars[pos]) {
                pos += 1;
            }
            let glued = pos + 1 < chars.len() && chars[pos] == '/' && is_ident_start(chars[pos + 1]);
            if !glued {
                break;
            }
            pos += 1;
        }
        let run: String = chars[start..pos].iter().collect();
        if let Ok(path) = ParsedPath::parse(&run) {
            found.push(path);
        }
    }
    found
}

/// Every variable referenced by a path, including the path itself.
pub fn path_variables(path: &ParsedPath) -> Result<Vec<ParsedPath>, PathParseError> {
    let mut found = vec![path.clone()];
    for query in path.index_queries() {
        collect_variables(query, &mut found)?;
    }
    Ok(found)
}

fn scan_variable(expr: &str, chars: &[char], mut pos: usize) -> Result<usize, PathParseError> {
    loop {
        while pos < chars.len() && is_ident_char(chars[pos]) {
            pos += 1;
        }
        if pos < chars.len() && chars[pos] == '[' {
            pos = scan_index(expr, chars, pos)? + 1;
        }
        let glued = pos + 1 < chars.len() && chars[pos] == '/' && is_ident_start(chars[pos + 1]);
        if !glued {
            return Ok(pos);
        }
        pos += 1;
    }
}

fn token(kind: TokenKind, chars: &[char], position: usize) -> Token {
    Token {
        kind,
        text: chars.iter().collect(),
        position,
    }
}
