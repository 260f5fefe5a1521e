//! Row predicates and value comparison.
//!
//! Values are compared the way the emulated backend's client-side mock
//! compares them: numbers numerically regardless of integer/float
//! representation, strings lexicographically, booleans false-before-true.
//! Anything else (type mismatch, missing column) simply does not match; no
//! predicate ever reports an error.

use std::cmp::Ordering;

use serde_json::Value;

use crate::store::Row;

/// A single filter applied to a query builder's working set.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column equals value.
    Equals(String, Value),
    /// Column is present and differs from value.
    NotEquals(String, Value),
    /// Column is strictly greater than value.
    GreaterThan(String, Value),
    /// Column is greater than or equal to value.
    GreaterOrEqual(String, Value),
    /// Column is strictly less than value.
    LessThan(String, Value),
    /// Column is less than or equal to value.
    LessOrEqual(String, Value),
    /// String column matches a `LIKE` pattern (`%` any run, `_` one char,
    /// `\` escapes).
    Like {
        /// Column to test.
        column: String,
        /// Pattern to match against.
        pattern: String,
        /// Fold case on both sides before matching.
        case_insensitive: bool,
    },
    /// Column is exactly value (`null`, `true`, `false`); a missing column
    /// counts as `null`.
    Is(String, Value),
    /// Column equals one of the values.
    In(String, Vec<Value>),
    /// Array column contains every value.
    Contains(String, Vec<Value>),
    /// Every element of the array column is one of the values.
    ContainedBy(String, Vec<Value>),
}

impl Predicate {
    /// Returns `true` if `row` satisfies this predicate.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Equals(column, value) => row
                .get(column)
                .is_some_and(|field| values_equal(field, value)),
            Self::NotEquals(column, value) => row
                .get(column)
                .is_some_and(|field| !values_equal(field, value)),
            Self::GreaterThan(column, value) => {
                compares(row, column, value, |ord| ord == Ordering::Greater)
            }
            Self::GreaterOrEqual(column, value) => {
                compares(row, column, value, |ord| ord != Ordering::Less)
            }
            Self::LessThan(column, value) => {
                compares(row, column, value, |ord| ord == Ordering::Less)
            }
            Self::LessOrEqual(column, value) => {
                compares(row, column, value, |ord| ord != Ordering::Greater)
            }
            Self::Like {
                column,
                pattern,
                case_insensitive,
            } => row
                .get(column)
                .and_then(Value::as_str)
                .is_some_and(|text| like_match(pattern, text, *case_insensitive)),
            Self::Is(column, value) => row.get(column).unwrap_or(&Value::Null) == value,
            Self::In(column, values) => row
                .get(column)
                .is_some_and(|field| values.iter().any(|v| values_equal(field, v))),
            Self::Contains(column, values) => match row.get(column) {
                Some(Value::Array(items)) => values
                    .iter()
                    .all(|needle| items.iter().any(|item| values_equal(item, needle))),
                _ => false,
            },
            Self::ContainedBy(column, values) => match row.get(column) {
                Some(Value::Array(items)) => items
                    .iter()
                    .all(|item| values.iter().any(|allowed| values_equal(item, allowed))),
                _ => false,
            },
        }
    }
}

fn compares(row: &Row, column: &str, value: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    row.get(column)
        .and_then(|field| compare_values(field, value))
        .is_some_and(accept)
}

/// Equality with numeric values compared by magnitude (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Ordering between two scalar values of the same kind.
///
/// Returns `None` for mismatched kinds, `null`, arrays and objects.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Position of a non-null value's kind in `order_by` output: numbers, then
/// strings, then booleans, then arrays and objects.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        Value::Array(_) | Value::Object(_) | Value::Null => 3,
    }
}

/// Sort key comparison for `order_by`: nulls and missing columns sort last
/// ascending and first descending. Mixed kinds are grouped by
/// [`kind_rank`]; arrays and objects keep their relative order.
pub(crate) fn order_fields(a: Option<&Value>, b: Option<&Value>, ascending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ord = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => kind_rank(a)
            .cmp(&kind_rank(b))
            .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal)),
    };
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}

// ── LIKE matching ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    AnyRun,
    AnyChar,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::AnyRun,
            '_' => Token::AnyChar,
            // A trailing backslash matches itself.
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            other => Token::Literal(other),
        });
    }
    tokens
}

/// Anchored SQL `LIKE` match of `text` against `pattern`.
///
/// `%` matches any run of characters (including none), `_` exactly one
/// character, and `\` makes the next character literal.
///
/// ```
/// use data_client_emulator::filter::like_match;
///
/// assert!(like_match("Al%", "Alice", false));
/// assert!(!like_match("al%", "Alice", false));
/// assert!(like_match("al%", "Alice", true));
/// assert!(like_match("100\\%", "100%", false));
/// ```
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_owned(), text.to_owned())
    };
    let tokens = tokenize(&pattern);
    let chars: Vec<char> = text.chars().collect();

    let (mut ti, mut ci) = (0usize, 0usize);
    // Token index just past the last `%`, and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while ci < chars.len() {
        match tokens.get(ti) {
            Some(Token::AnyRun) => {
                backtrack = Some((ti + 1, ci));
                ti += 1;
            }
            Some(Token::AnyChar) => {
                ti += 1;
                ci += 1;
            }
            Some(Token::Literal(expected)) if chars.get(ci) == Some(expected) => {
                ti += 1;
                ci += 1;
            }
            _ => match backtrack {
                Some((resume, start)) => {
                    ti = resume;
                    ci = start + 1;
                    backtrack = Some((resume, start + 1));
                }
                None => return false,
            },
        }
    }

    tokens
        .get(ti..)
        .is_some_and(|rest| rest.iter().all(|t| *t == Token::AnyRun))
}
