use crate::error::PathParseError;
use crate::model::ElementLookup;
use std::fmt;

/// The index attached to a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathIndex {
    /// A canonical non-negative integer, e.g. `[2]`.
    Literal(usize),
    /// Any other bracketed text, evaluated at runtime, e.g. `[x+1]`.
    Query(String),
}

impl PathIndex {
    fn from_text(text: &str) -> Self {
        let canonical = !text.is_empty()
            && text.chars().all(|c| c.is_ascii_digit())
            && (text == "0" || !text.starts_with('0'));
        match text.parse::<usize>() {
            Ok(n) if canonical => PathIndex::Literal(n),
            _ => PathIndex::Query(text.to_string()),
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, PathIndex::Query(_))
    }
}

impl fmt::Display for PathIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathIndex::Literal(n) => write!(f, "{}", n),
            PathIndex::Query(q) => write!(f, "{}", q),
        }
    }
}

/// One segment of a slash-delimited reference plus the rest of the path.
///
/// `a/b[2]/c` parses into `a` -> `b[2]` -> `c`. The structure round-trips:
/// `ParsedPath::parse(&p.to_string()) == Ok(p)` for every parsed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedPath {
    pub name: String,
    pub index: Option<PathIndex>,
    pub child: Option<Box<ParsedPath>>,
}

impl ParsedPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
            child: None,
        }
    }

    /// Parses a path such as `input/items[0]/name`.
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        if text.is_empty() {
            return Err(PathParseError::new(text, 0, "path is empty"));
        }

        let chars: Vec<char> = text.chars().collect();
        let mut segments: Vec<(String, Option<PathIndex>)> = Vec::new();
        let mut name = String::new();
        let mut index: Option<PathIndex> = None;
        let mut pos = 0;

        while pos < chars.len() {
            let c = chars[pos];
            match c {
                '/' => {
                    if name.is_empty() {
                        return Err(PathParseError::new(text, pos, "empty segment"));
                    }
                    segments.push((std::mem::take(&mut name), index.take()));
                    pos += 1;
                }
                '[' => {
                    if name.is_empty() {
                        return Err(PathParseError::new(text, pos, "index without a name"));
                    }
                    if index.is_some() {
                        return Err(PathParseError::new(text, pos, "segment has two indices"));
                    }
                    let end = scan_index(text, &chars, pos)?;
                    let inner: String = chars[pos + 1..end].iter().collect();
                    if inner.trim().is_empty() {
                        return Err(PathParseError::new(text, pos, "empty index"));
                    }
                    index = Some(PathIndex::from_text(&inner));
                    pos = end + 1;
                    if pos < chars.len() && chars[pos] != '/' {
                        return Err(PathParseError::new(
                            text,
                            pos,
                            "unexpected characters after index",
                        ));
                    }
                }
                ']' => return Err(PathParseError::new(text, pos, "unbalanced ']'")),
                _ => {
                    if index.is_some() {
                        return Err(PathParseError::new(
                            text,
                            pos,
                            "unexpected characters after index",
                        ));
                    }
                    name.push(c);
                    pos += 1;
                }
            }
        }

        if name.is_empty() {
            return Err(PathParseError::new(text, chars.len(), "empty segment"));
        }
        segments.push((name, index));

        let mut path: Option<ParsedPath> = None;
        for (name, index) in segments.into_iter().rev() {
            path = Some(ParsedPath {
                name,
                index,
                child: path.map(Box::new),
            });
        }
        // `segments` always holds at least one entry at this point.
        path.ok_or_else(|| PathParseError::new(text, 0, "path is empty"))
    }

    /// The first segment's name, e.g. `input` or a result name.
    pub fn root_name(&self) -> &str {
        &self.name
    }

    /// Iterates the segments from the root to the leaf.
    pub fn segments(&self) -> Segments<'_> {
        Segments {
            current: Some(self),
        }
    }

    pub fn last(&self) -> &ParsedPath {
        let mut current = self;
        while let Some(child) = current.child.as_deref() {
            current = child;
        }
        current
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// True if any segment carries a runtime-evaluated index.
    pub fn has_index_query(&self) -> bool {
        self.segments()
            .any(|s| s.index.as_ref().is_some_and(PathIndex::is_query))
    }

    /// The index sub-expressions of every segment, root first.
    pub fn index_queries(&self) -> impl Iterator<Item = &str> {
        self.segments().filter_map(|s| match &s.index {
            Some(PathIndex::Query(q)) => Some(q.as_str()),
            _ => None,
        })
    }

    /// The segment names without indices.
    pub fn names(&self) -> Vec<&str> {
        self.segments().map(|s| s.name.as_str()).collect()
    }

    pub fn rename_root(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Gives every unindexed list segment the index `0`.
    ///
    /// The terminal segment only receives an index when `include_last` is set,
    /// which callers use when the opposite end of a link is not itself a list.
    pub fn set_default_index(&mut self, tree_root: &dyn ElementLookup, include_last: bool) {
        let Some(element) = tree_root.lookup(&self.name) else {
            return;
        };
        let is_last = self.child.is_none();
        if element.list && self.index.is_none() && (!is_last || include_last) {
            self.index = Some(PathIndex::Literal(0));
        }
        if let Some(child) = self.child.as_deref_mut() {
            child.set_default_index(element, include_last);
        }
    }
}

impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", segment.name)?;
            if let Some(index) = &segment.index {
                write!(f, "[{}]", index)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for ParsedPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParsedPath::parse(s)
    }
}

pub struct Segments<'a> {
    current: Option<&'a ParsedPath>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a ParsedPath;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.child.as_deref();
        Some(current)
    }
}

/// Finds the `]` matching the `[` at `open`, honouring nesting and quotes.
pub(crate) fn scan_index(text: &str, chars: &[char], open: usize) -> Result<usize, PathParseError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut pos = open;
    while pos < chars.len() {
        let c = chars[pos];
        match quote {
            Some(q) => {
                if c == '\\' {
                    pos += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(pos);
                    }
                }
                _ => {}
            },
        }
        pos += 1;
    }
    Err(PathParseError::new(text, open, "unbalanced '['"))
}

/// The first segment name of a path without parsing the rest, e.g. the
/// result name in `result0f3.../output/id`. Tolerates malformed text.
pub fn root_of(text: &str) -> &str {
    text.split(['/', '[']).next().unwrap_or(text).trim()
}
