//! Conjunctive `variable = value` conditions.

use serde::{Deserialize, Serialize};

/// A conjunction of `variable = value` terms, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    terms: Vec<(String, String)>,
}

impl Condition {
    /// The empty (always true) condition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Condition::push`].
    pub fn with(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(variable, value);
        self
    }

    /// Add a term. A later term on the same variable replaces the earlier one.
    pub fn push(&mut self, variable: impl Into<String>, value: impl Into<String>) {
        let variable = variable.into();
        let value = value.into();
        if let Some(term) = self.terms.iter_mut().find(|(v, _)| *v == variable) {
            term.1 = value;
        } else {
            self.terms.push((variable, value));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Value required for `variable`, if constrained.
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|(v, _)| v == variable)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms.iter().map(|(v, s)| (v.as_str(), s.as_str()))
    }

    /// One condition per joint assignment of `variables`, odometer order
    /// (last variable varies fastest).
    ///
    /// No variables yields a single empty condition; a variable with no
    /// states yields no conditions at all.
    pub fn cartesian(variables: &[(String, Vec<String>)]) -> Vec<Condition> {
        let mut out = vec![Condition::new()];
        for (name, states) in variables {
            let mut next = Vec::with_capacity(out.len() * states.len());
            for partial in &out {
                for state in states {
                    next.push(partial.clone().with(name.clone(), state.clone()));
                }
            }
            out = next;
        }
        out
    }
}

impl<V: Into<String>, S: Into<String>> FromIterator<(V, S)> for Condition {
    fn from_iter<I: IntoIterator<Item = (V, S)>>(iter: I) -> Self {
        let mut cond = Condition::new();
        for (v, s) in iter {
            cond.push(v, s);
        }
        cond
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, (v, s)) in self.terms.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", v, s)?;
        }
        Ok(())
    }
}
