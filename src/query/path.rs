//! JSONPath compiler and evaluator.
//!
//! Supported syntax, evaluated against an untyped [`serde_json::Value`]:
//!
//! | Expression            | Meaning                                   |
//! |-----------------------|-------------------------------------------|
//! | `$` / `.`             | the document root (both optional)         |
//! | `{ … }`               | surrounding template braces are ignored   |
//! | `.name`, `['name']`   | object member                             |
//! | `.*`, `[*]`           | every member or element                   |
//! | `[n]`                 | array element, negative counts from end   |
//! | `[start:end:step]`    | array slice                               |
//! | `[0,2]`, `['a','b']`  | union                                     |
//! | `..name`, `..*`       | recursive descent                         |
//! | `[?(@.a)]`            | elements where `a` exists                 |
//! | `[?(@.a.b == 'x')]`   | elements matching a comparison            |

use serde_json::Value as JsonValue;

use super::QueryError;

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(Selector),
    Descendant(Selector),
}

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Name(String),
    Wildcard,
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: i64,
    },
    Union(Vec<Key>),
    Filter(Filter),
}

#[derive(Debug, Clone, PartialEq)]
enum Key {
    Name(String),
    Index(i64),
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    path: Vec<String>,
    comparison: Option<(CmpOp, JsonValue)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl JsonPath {
    /// Compile an expression, reporting the position of the first syntax error.
    pub fn compile(expr: &str) -> Result<Self, QueryError> {
        let segments = Parser::new(expr).parse()?;
        Ok(Self {
            source: expr.to_string(),
            segments,
        })
    }

    /// The expression this path was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Every value selected by this path, in document order.
    pub fn select<'a>(&self, root: &'a JsonValue) -> Vec<&'a JsonValue> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    Segment::Child(selector) => apply(selector, value, &mut next),
                    Segment::Descendant(selector) => {
                        let mut nodes = Vec::new();
                        walk(value, &mut nodes);
                        for node in nodes {
                            apply(selector, node, &mut next);
                        }
                    }
                }
            }
            current = next;
        }
        current
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

// ============================================================================
// Evaluation
// ============================================================================

fn walk<'a>(value: &'a JsonValue, acc: &mut Vec<&'a JsonValue>) {
    acc.push(value);
    match value {
        JsonValue::Array(items) => items.iter().for_each(|v| walk(v, acc)),
        JsonValue::Object(map) => map.values().for_each(|v| walk(v, acc)),
        _ => {}
    }
}

fn apply<'a>(selector: &Selector, value: &'a JsonValue, out: &mut Vec<&'a JsonValue>) {
    match selector {
        Selector::Name(name) => out.extend(member(value, name)),
        Selector::Wildcard => out.extend(children(value)),
        Selector::Index(index) => out.extend(element(value, *index)),
        Selector::Slice { start, end, step } => {
            if let JsonValue::Array(items) = value {
                let len = items.len() as i64;
                let start = start.map_or(0, |s| normalize(s, len)).clamp(0, len) as usize;
                let end = end.map_or(len, |e| normalize(e, len)).clamp(0, len) as usize;
                let step = usize::try_from(*step).unwrap_or(usize::MAX).max(1);
                if start < end {
                    out.extend(items[start..end].iter().step_by(step));
                }
            }
        }
        Selector::Union(keys) => {
            for key in keys {
                match key {
                    Key::Name(name) => out.extend(member(value, name)),
                    Key::Index(index) => out.extend(element(value, *index)),
                }
            }
        }
        Selector::Filter(filter) => {
            out.extend(children(value).filter(|child| filter.matches(child)));
        }
    }
}

fn member<'a>(value: &'a JsonValue, name: &str) -> Option<&'a JsonValue> {
    value.as_object().and_then(|map| map.get(name))
}

fn element(value: &JsonValue, index: i64) -> Option<&JsonValue> {
    let items = value.as_array()?;
    let idx = normalize(index, items.len() as i64);
    if idx < 0 {
        return None;
    }
    items.get(idx as usize)
}

fn children(value: &JsonValue) -> Box<dyn Iterator<Item = &JsonValue> + '_> {
    match value {
        JsonValue::Array(items) => Box::new(items.iter()),
        JsonValue::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

fn normalize(index: i64, len: i64) -> i64 {
    if index < 0 {
        len.saturating_add(index)
    } else {
        index
    }
}

impl Filter {
    fn matches(&self, candidate: &JsonValue) -> bool {
        let mut current = Some(candidate);
        for name in &self.path {
            current = current.and_then(|v| member(v, name));
        }
        let Some(found) = current else {
            return false;
        };
        match &self.comparison {
            None => true,
            Some((op, literal)) => compare(found, *op, literal),
        }
    }
}

fn compare(left: &JsonValue, op: CmpOp, right: &JsonValue) -> bool {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    };

    match op {
        CmpOp::Eq => ordering == Some(Ordering::Equal),
        CmpOp::Ne => ordering != Some(Ordering::Equal),
        CmpOp::Lt => ordering == Some(Ordering::Less),
        CmpOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => ordering == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

// ============================================================================
// Parsing
// ============================================================================

struct Parser {
    chars: Vec<char>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(expr: &str) -> Self {
        let chars: Vec<char> = expr.chars().collect();
        let mut pos = 0;
        let mut end = chars.len();

        while pos < end && chars[pos].is_whitespace() {
            pos += 1;
        }
        while end > pos && chars[end - 1].is_whitespace() {
            end -= 1;
        }
        if end - pos >= 2 && chars[pos] == '{' && chars[end - 1] == '}' {
            pos += 1;
            end -= 1;
        }
        while pos < end && chars[pos].is_whitespace() {
            pos += 1;
        }
        while end > pos && chars[end - 1].is_whitespace() {
            end -= 1;
        }

        Self { chars, pos, end }
    }

    fn parse(mut self) -> Result<Vec<Segment>, QueryError> {
        let mut segments = Vec::new();

        if self.peek() == Some('$') {
            self.pos += 1;
        } else if self.peek().is_some_and(is_name_char) {
            // A bare leading name is a child of the root: `plays[0]`.
            segments.push(Segment::Child(Selector::Name(self.name()?)));
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    if self.peek() == Some('.') {
                        self.pos += 1;
                        segments.push(Segment::Descendant(self.dotted_selector()?));
                    } else if self.peek().is_none() {
                        // A lone trailing dot, as in `{.}`, selects the current node.
                    } else {
                        segments.push(Segment::Child(self.dotted_selector()?));
                    }
                }
                '[' => segments.push(Segment::Child(self.bracket()?)),
                other => return Err(self.error(format!("unexpected character '{other}'"))),
            }
        }

        Ok(segments)
    }

    /// Selector following `.` or `..`: a name, `*`, or a bracket.
    fn dotted_selector(&mut self) -> Result<Selector, QueryError> {
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                Ok(Selector::Wildcard)
            }
            Some('[') => self.bracket(),
            Some(c) if is_name_char(c) => Ok(Selector::Name(self.name()?)),
            Some(c) => Err(self.error(format!("expected a field name, found '{c}'"))),
            None => Err(self.error("expected a field name")),
        }
    }

    fn bracket(&mut self) -> Result<Selector, QueryError> {
        self.expect('[')?;
        self.skip_ws();

        let selector = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Selector::Wildcard
            }
            Some('?') => {
                self.pos += 1;
                Selector::Filter(self.filter()?)
            }
            Some('\'' | '"') => {
                let first = self.quoted()?;
                let mut rest = Vec::new();
                self.union_rest(&mut rest)?;
                if rest.is_empty() {
                    Selector::Name(first)
                } else {
                    rest.insert(0, Key::Name(first));
                    Selector::Union(rest)
                }
            }
            Some(c) if c == '-' || c == ':' || c.is_ascii_digit() => self.index_or_slice()?,
            Some(c) => return Err(self.error(format!("unexpected character '{c}' in brackets"))),
            None => return Err(self.error("unterminated '['")),
        };

        self.skip_ws();
        self.expect(']')?;
        Ok(selector)
    }

    fn index_or_slice(&mut self) -> Result<Selector, QueryError> {
        let start = self.optional_int()?;
        self.skip_ws();

        if self.peek() == Some(':') {
            self.pos += 1;
            self.skip_ws();
            let end = self.optional_int()?;
            self.skip_ws();
            let mut step = 1;
            if self.peek() == Some(':') {
                self.pos += 1;
                self.skip_ws();
                if let Some(s) = self.optional_int()? {
                    if s <= 0 {
                        return Err(self.error("slice step must be positive"));
                    }
                    step = s;
                }
            }
            return Ok(Selector::Slice { start, end, step });
        }

        let Some(first) = start else {
            return Err(self.error("expected an index"));
        };

        if self.peek() == Some(',') {
            let mut keys = vec![Key::Index(first)];
            self.union_rest(&mut keys)?;
            return Ok(Selector::Union(keys));
        }

        Ok(Selector::Index(first))
    }

    fn union_rest(&mut self, keys: &mut Vec<Key>) -> Result<(), QueryError> {
        loop {
            self.skip_ws();
            if self.peek() != Some(',') {
                return Ok(());
            }
            self.pos += 1;
            self.skip_ws();
            match self.peek() {
                Some('\'' | '"') => keys.push(Key::Name(self.quoted()?)),
                Some(c) if c == '-' || c.is_ascii_digit() => {
                    let index = self
                        .optional_int()?
                        .ok_or_else(|| self.error("expected an index"))?;
                    keys.push(Key::Index(index));
                }
                _ => return Err(self.error("expected a quoted name or an index after ','")),
            }
        }
    }

    fn filter(&mut self) -> Result<Filter, QueryError> {
        self.expect('(')?;
        self.skip_ws();
        self.expect('@')?;

        let mut path = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    path.push(self.name()?);
                }
                Some('[') => {
                    self.pos += 1;
                    self.skip_ws();
                    path.push(self.quoted()?);
                    self.skip_ws();
                    self.expect(']')?;
                }
                _ => break,
            }
        }

        self.skip_ws();
        let comparison = if self.peek() == Some(')') {
            None
        } else {
            let op = self.operator()?;
            self.skip_ws();
            let literal = self.literal()?;
            self.skip_ws();
            Some((op, literal))
        };

        self.expect(')')?;
        Ok(Filter { path, comparison })
    }

    fn operator(&mut self) -> Result<CmpOp, QueryError> {
        let two: String = self.chars[self.pos..self.end].iter().take(2).collect();
        let (op, len) = match two.as_str() {
            "==" => (CmpOp::Eq, 2),
            "!=" => (CmpOp::Ne, 2),
            "<=" => (CmpOp::Le, 2),
            ">=" => (CmpOp::Ge, 2),
            _ if two.starts_with('<') => (CmpOp::Lt, 1),
            _ if two.starts_with('>') => (CmpOp::Gt, 1),
            _ => return Err(self.error("expected a comparison operator or ')'")),
        };
        self.pos += len;
        Ok(op)
    }

    fn literal(&mut self) -> Result<JsonValue, QueryError> {
        match self.peek() {
            Some('\'' | '"') => Ok(JsonValue::String(self.quoted()?)),
            Some(_) => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.'))
                {
                    self.pos += 1;
                }
                let word: String = self.chars[start..self.pos].iter().collect();
                match word.as_str() {
                    "true" => Ok(JsonValue::Bool(true)),
                    "false" => Ok(JsonValue::Bool(false)),
                    "null" => Ok(JsonValue::Null),
                    _ => serde_json::from_str::<serde_json::Number>(&word)
                        .map(JsonValue::Number)
                        .map_err(|_| QueryError::Syntax {
                            position: start,
                            message: format!("invalid literal '{word}'"),
                        }),
                }
            }
            None => Err(self.error("expected a literal")),
        }
    }

    fn name(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a field name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        let Some(quote) = self.peek().filter(|c| matches!(c, '\'' | '"')) else {
            return Err(self.error("expected a quoted name"));
        };
        self.pos += 1;

        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => match self.peek() {
                    Some(escaped) => {
                        out.push(escaped);
                        self.pos += 1;
                    }
                    None => break,
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }

        Err(QueryError::Syntax {
            position: start,
            message: "unterminated string".to_string(),
        })
    }

    fn optional_int(&mut self) -> Result<Option<i64>, QueryError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse().map(Some).map_err(|_| QueryError::Syntax {
            position: start,
            message: format!("invalid index '{text}'"),
        })
    }

    fn expect(&mut self, expected: char) -> Result<(), QueryError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}'"))),
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        if self.pos < self.end {
            Some(self.chars[self.pos])
        } else {
            None
        }
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::Syntax {
            position: self.pos,
            message: message.into(),
        }
    }
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '.' | '[' | ']' | '(' | ')' | ',' | '\'' | '"' | '*' | '$' | '@' | '=' | '!' | '<' | '>'
                | '{' | '}'
        )
}
