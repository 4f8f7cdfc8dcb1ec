//! The platform-neutral query shape passed to a [`crate::executor::QueryExecutor`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A common table expression prepended to an ECSQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cte {
    pub name: String,
    pub body: String,
}

/// A bound parameter value. ECSQL supports both positional (`?`) and named
/// (`:name`) bindings; callers pick one style per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bindings {
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Default for Bindings {
    fn default() -> Self {
        Bindings::Positional(Vec::new())
    }
}

/// An ECSQL statement plus its CTEs and bound parameters (§4.1, §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub ecsql: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctes: Vec<Cte>,
    #[serde(default)]
    pub bindings: Bindings,
}

impl Query {
    pub fn new(ecsql: impl Into<String>) -> Self {
        Self {
            ecsql: ecsql.into(),
            ctes: Vec::new(),
            bindings: Bindings::default(),
        }
    }

    pub fn with_ctes(mut self, ctes: Vec<Cte>) -> Self {
        self.ctes = ctes;
        self
    }

    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Render the full statement text, CTEs first, as a `WITH` clause.
    ///
    /// This is a convenience for executors that accept a single SQL string;
    /// executors that support CTEs natively may ignore it and use
    /// [`Query::ctes`] directly.
    pub fn render(&self) -> String {
        if self.ctes.is_empty() {
            return self.ecsql.clone();
        }
        let cte_bodies: Vec<String> = self
            .ctes
            .iter()
            .map(|c| format!("{} AS ({})", c.name, c.body))
            .collect();
        format!("WITH {} {}", cte_bodies.join(", "), self.ecsql)
    }
}

/// A single row as returned by a query executor, in "named row format"
/// (§6: `rowFormat: "named"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row(pub BTreeMap<String, Value>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }
}

/// Per-call row limit, `unbounded` by default (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowLimit {
    Unbounded,
    Bounded(usize),
}

impl Default for RowLimit {
    fn default() -> Self {
        RowLimit::Unbounded
    }
}

impl RowLimit {
    pub fn as_usize(self) -> Option<usize> {
        match self {
            RowLimit::Unbounded => None,
            RowLimit::Bounded(n) => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_prefixes_with_clause_when_ctes_present() {
        let query = Query::new("SELECT * FROM q").with_ctes(vec![Cte {
            name: "q".to_string(),
            body: "SELECT 1".to_string(),
        }]);
        assert_eq!(query.render(), "WITH q AS (SELECT 1) SELECT * FROM q");
    }

    #[test]
    fn render_is_bare_ecsql_without_ctes() {
        let query = Query::new("SELECT 1");
        assert_eq!(query.render(), "SELECT 1");
    }
}
