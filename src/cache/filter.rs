//! Discriminator extraction from OData filter expressions.
//!
//! Recognized shapes (whole filter, surrounding whitespace ignored):
//!
//! - `startswith(field, 'value')`, likewise `endswith` and `contains`
//! - `field eq 'value'`
//!
//! String literals use OData quoting (`''` is an escaped `'`). Anything else,
//! including compound expressions, yields no discriminator.

use once_cell::sync::Lazy;
use regex::Regex;

static CALL_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?i:(startswith|endswith|contains))\s*\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*,\s*'((?:[^']|'')*)'\s*\)\s*$")
        .expect("call-form filter pattern compiles")
});

static EQ_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s+(?i:eq)\s+'((?:[^']|'')*)'\s*$")
        .expect("eq filter pattern compiles")
});

/// Comparison a recognized filter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    StartsWith,
    EndsWith,
    Contains,
    Eq,
}

impl FilterOp {
    pub const ALL: [FilterOp; 4] = [
        FilterOp::StartsWith,
        FilterOp::EndsWith,
        FilterOp::Contains,
        FilterOp::Eq,
    ];

    fn from_function(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "startswith" => Some(FilterOp::StartsWith),
            "endswith" => Some(FilterOp::EndsWith),
            "contains" => Some(FilterOp::Contains),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            FilterOp::StartsWith => "startswith",
            FilterOp::EndsWith => "endswith",
            FilterOp::Contains => "contains",
            FilterOp::Eq => "eq",
        }
    }
}

/// A single-field comparison parsed out of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub op: FilterOp,
    pub field: String,
    pub value: String,
}

impl FilterClause {
    /// Value the cache key is derived from.
    ///
    /// `startswith` (the lookup form record discovery uses) keys on the bare
    /// value; other operators match different record sets and are tagged.
    pub fn discriminator(&self) -> String {
        discriminator_for(self.op, &self.value)
    }
}

pub(crate) fn discriminator_for(op: FilterOp, value: &str) -> String {
    match op {
        FilterOp::StartsWith => value.to_string(),
        other => format!("{}:{}", other.tag(), value),
    }
}

/// Parse a filter into a single-field clause, if it has a recognized shape.
pub fn parse_filter(filter: &str) -> Option<FilterClause> {
    if let Some(caps) = CALL_FORM.captures(filter) {
        let op = FilterOp::from_function(caps.get(1)?.as_str())?;
        return Some(FilterClause {
            op,
            field: caps.get(2)?.as_str().to_string(),
            value: unquote(caps.get(3)?.as_str()),
        });
    }
    if let Some(caps) = EQ_FORM.captures(filter) {
        return Some(FilterClause {
            op: FilterOp::Eq,
            field: caps.get(1)?.as_str().to_string(),
            value: unquote(caps.get(2)?.as_str()),
        });
    }
    None
}

fn unquote(raw: &str) -> String {
    raw.replace("''", "'")
}
