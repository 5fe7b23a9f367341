//! Query language for filtering the pool.
//!
//! A query is whitespace separated clauses. `value` matches any searchable
//! field, `field=value`, `field<value` and `field>value` target one field.
//! Values may be wrapped in `"`, `'` or `` ` `` to carry spaces or operators.

use crate::model::{FieldValue, Item, Pool};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

const QUOTES: [char; 3] = ['"', '\'', '`'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Gt,
}

impl Op {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(Self::Eq),
            '<' => Some(Self::Lt),
            '>' => Some(Self::Gt),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Eq => '=',
            Self::Lt => '<',
            Self::Gt => '>',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// `None` searches every non keyword-only field.
    pub field: Option<String>,
    pub op: Op,
    pub value: String,
}

impl Clause {
    pub fn any(value: &str) -> Self {
        Self {
            field: None,
            op: Op::Eq,
            value: value.to_string(),
        }
    }

    pub fn field(field: &str, op: Op, value: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            op,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    /// Returns `None` for malformed input (unterminated or stray quotes,
    /// empty values). Callers treat that as "matches nothing".
    pub fn parse(input: &str) -> Option<Self> {
        let clauses = split_segments(input)?
            .iter()
            .map(|segment| parse_clause(segment))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, item: &Item, fields: &FieldConfig) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause_matches(clause, item, fields))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{field}{}", self.op.symbol())?;
        }
        f.write_str(&quote_value(&self.value))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, clause) in self.clauses.iter().enumerate() {
            if position > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchField {
    /// Only matched when a clause names the field explicitly.
    pub keyword_only: bool,
    /// Both sides are compared as numbers; `=` is exact equality.
    pub numeric: bool,
}

impl SearchField {
    pub const TEXT: Self = Self {
        keyword_only: false,
        numeric: false,
    };
    pub const KEYWORD: Self = Self {
        keyword_only: true,
        numeric: false,
    };
    pub const NUMBER: Self = Self {
        keyword_only: false,
        numeric: true,
    };
    pub const KEYWORD_NUMBER: Self = Self {
        keyword_only: true,
        numeric: true,
    };

    pub fn is_match(&self, value: &FieldValue, query_value: &str, op: Op) -> bool {
        if self.numeric {
            let (Some(left), Some(right)) = (numeric_value(value), parse_number(query_value))
            else {
                return false;
            };
            return match op {
                Op::Eq => left == right,
                Op::Lt => left < right,
                Op::Gt => left > right,
            };
        }

        let left = fold_text(&value.to_string());
        let right = fold_text(query_value);
        match op {
            Op::Eq => left.contains(&right),
            Op::Lt => left < right,
            Op::Gt => left > right,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldConfig {
    fields: HashMap<String, SearchField>,
    /// Fields without an explicit entry are skipped instead of treated as text.
    pub ignore_rest: bool,
}

impl FieldConfig {
    pub fn songs() -> Self {
        Self::default()
            .with_field("path", SearchField::KEYWORD)
            .with_field("url", SearchField::KEYWORD)
            .with_field("index", SearchField::KEYWORD_NUMBER)
            .with_field("duration", SearchField::NUMBER)
            .with_field("year", SearchField::NUMBER)
    }

    pub fn with_field(mut self, name: &str, field: SearchField) -> Self {
        self.fields.insert(name.to_string(), field);
        self
    }

    fn get(&self, name: &str) -> Option<SearchField> {
        match self.fields.get(name) {
            Some(field) => Some(*field),
            None if self.ignore_rest => None,
            None => Some(SearchField::TEXT),
        }
    }
}

/// Ascending pool indices of the items matching `query`. A missing query
/// (malformed input) matches nothing.
pub fn search(pool: &Pool, query: Option<&Query>, fields: &FieldConfig) -> Vec<usize> {
    let Some(query) = query else {
        return Vec::new();
    };
    pool.items()
        .iter()
        .filter(|item| query.matches(item, fields))
        .map(|item| item.index)
        .collect()
}

fn clause_matches(clause: &Clause, item: &Item, fields: &FieldConfig) -> bool {
    match &clause.field {
        Some(name) => {
            let Some(search_field) = fields.get(name) else {
                return false;
            };
            field_value(item, name)
                .is_some_and(|value| search_field.is_match(&value, &clause.value, clause.op))
        }
        None => item.metadata.iter().any(|(name, value)| {
            fields
                .get(name)
                .filter(|search_field| !search_field.keyword_only)
                .is_some_and(|search_field| search_field.is_match(value, &clause.value, Op::Eq))
        }),
    }
}

fn field_value<'a>(item: &'a Item, name: &str) -> Option<Cow<'a, FieldValue>> {
    if name == "index" {
        return Some(Cow::Owned(FieldValue::Number(item.index as f64)));
    }
    item.metadata.get(name).map(Cow::Borrowed)
}

fn numeric_value(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(number) => Some(*number),
        FieldValue::Text(text) => parse_number(text),
    }
}

/// Reads the longest leading number, so `"201 sec"` is 201.
fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let numeric_len = trimmed
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(trimmed.len());
    (1..=numeric_len)
        .rev()
        .find_map(|len| trimmed[..len].parse::<f64>().ok())
        .filter(|value| !value.is_nan())
}

fn fold_text(raw: &str) -> String {
    raw.nfkc().collect::<String>().to_lowercase()
}

fn is_quote(c: char) -> bool {
    QUOTES.contains(&c)
}

fn is_op(c: char) -> bool {
    Op::from_char(c).is_some()
}

fn split_segments(input: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut open_quote: Option<char> = None;

    for c in input.chars().chain(std::iter::once(' ')) {
        match open_quote {
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            None => {
                if is_quote(c) {
                    open_quote = Some(c);
                }
                current.push(c);
            }
            Some(quote) => {
                current.push(c);
                if c == quote {
                    open_quote = None;
                    segments.push(std::mem::take(&mut current));
                }
            }
        }
    }

    // Whatever is left was swallowed by a quote that never closed.
    if !current.is_empty() {
        return None;
    }
    Some(segments)
}

fn parse_clause(segment: &str) -> Option<Clause> {
    let operator = segment
        .char_indices()
        .find(|(_, c)| is_op(*c))
        .filter(|(at, _)| !segment[..*at].chars().any(is_quote));

    let (field, op, raw_value) = match operator {
        Some((at, c)) => {
            let field = &segment[..at];
            if field.is_empty() {
                return None;
            }
            (
                Some(field.to_string()),
                Op::from_char(c)?,
                &segment[at + c.len_utf8()..],
            )
        }
        None => (None, Op::Eq, segment),
    };

    let value = if !raw_value.chars().any(is_quote) {
        raw_value
    } else {
        let first = raw_value.chars().next()?;
        if !is_quote(first) || raw_value.len() < 2 || !raw_value.ends_with(first) {
            return None;
        }
        &raw_value[1..raw_value.len() - 1]
    };

    if value.is_empty() {
        return None;
    }
    Some(Clause {
        field,
        op,
        value: value.to_string(),
    })
}

fn quote_value(value: &str) -> Cow<'_, str> {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || is_op(c) || is_quote(c));
    if !needs_quotes {
        return Cow::Borrowed(value);
    }
    let quote = QUOTES
        .into_iter()
        .find(|quote| !value.contains(*quote))
        .unwrap_or('"');
    Cow::Owned(format!("{quote}{value}{quote}"))
}
