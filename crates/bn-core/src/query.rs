//! Query expression parser.
//!
//! Parses probability queries like `P(C|A=1,B=0)` into a target variable
//! and a list of hard-evidence assignments.

use std::str::FromStr;

use bn_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// A parsed probability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Variable whose posterior is requested.
    pub target: String,
    /// Single state of interest, when the query names one (`P(C=1|...)`).
    pub target_state: Option<String>,
    /// Evidence in the order written.
    pub evidence: Vec<(String, String)>,
}

impl Query {
    /// Canonical form, e.g. `P(C=1|A=1,B=0)`.
    pub fn canonical(&self) -> String {
        let mut out = format!("P({}", self.target);
        if let Some(state) = &self.target_state {
            out.push('=');
            out.push_str(state);
        }
        for (idx, (variable, state)) in self.evidence.iter().enumerate() {
            out.push(if idx == 0 { '|' } else { ',' });
            out.push_str(variable);
            out.push('=');
            out.push_str(state);
        }
        out.push(')');
        out
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_query(s)
    }
}

/// Parse a query string.
///
/// Supported forms:
/// - `C`
/// - `C|A=1`
/// - `P(C|A=1,B=0)`
/// - `P(C=1|A=1)`
///
/// Whitespace around names and separators is ignored.
pub fn parse_query(input: &str) -> Result<Query> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidQuery("empty query".to_string()));
    }

    let body = strip_probability_wrapper(trimmed)?;
    let (head, tail) = match body.split_once('|') {
        Some((head, tail)) => (head, Some(tail)),
        None => (body, None),
    };

    let (target, target_state) = match head.split_once('=') {
        Some((variable, state)) => (
            parse_name(variable, "target")?,
            Some(parse_name(state, "state")?),
        ),
        None => (parse_name(head, "target")?, None),
    };

    let mut evidence: Vec<(String, String)> = Vec::new();
    if let Some(tail) = tail {
        if tail.trim().is_empty() {
            return Err(Error::InvalidQuery(format!(
                "nothing after '|' in \"{}\"",
                trimmed
            )));
        }
        for term in tail.split(',') {
            let (variable, state) = parse_assignment(term)?;
            if variable == target {
                return Err(Error::InvalidQuery(format!(
                    "target '{}' cannot also be evidence",
                    target
                )));
            }
            match evidence.iter().find(|(v, _)| *v == variable) {
                Some((_, existing)) if *existing != state => {
                    return Err(Error::InvalidQuery(format!(
                        "conflicting evidence for '{}': '{}' and '{}'",
                        variable, existing, state
                    )));
                }
                Some(_) => {}
                None => evidence.push((variable, state)),
            }
        }
    }

    Ok(Query {
        target,
        target_state,
        evidence,
    })
}

/// Parse one `variable=state` term.
pub fn parse_assignment(input: &str) -> Result<(String, String)> {
    let Some((variable, state)) = input.split_once('=') else {
        return Err(Error::InvalidQuery(format!(
            "expected variable=state, got \"{}\"",
            input.trim()
        )));
    };
    let variable = parse_name(variable, "variable")?;
    let state = parse_name(state, "state")?;
    Ok((variable, state))
}

fn strip_probability_wrapper(input: &str) -> Result<&str> {
    let opened = input
        .strip_prefix("P(")
        .or_else(|| input.strip_prefix("p("));
    match opened {
        Some(rest) => rest.strip_suffix(')').ok_or_else(|| {
            Error::InvalidQuery(format!("unbalanced parenthesis in \"{}\"", input))
        }),
        None if input.contains('(') || input.contains(')') => Err(Error::InvalidQuery(format!(
            "unexpected parenthesis in \"{}\"",
            input
        ))),
        None => Ok(input),
    }
}

fn parse_name(raw: &str, what: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidQuery(format!("missing {} name", what)));
    }
    if name.contains(['=', ',', '|', '(', ')']) {
        return Err(Error::InvalidQuery(format!(
            "invalid {} name \"{}\"",
            what, name
        )));
    }
    Ok(name.to_string())
}
