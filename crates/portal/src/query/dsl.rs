//! Elasticsearch query clause tree.
//!
//! Clauses are plain values; nothing is written into JSON until
//! [`QueryDocument::to_json`] renders the finished tree. Adding filters and
//! adding free-text clauses are separate operations on separate lists, so one
//! can never clobber the other.

use serde_json::{Map, Value, json};

/// A single query clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Exact value match: `{"term": {field: value}}`.
    Term { field: String, value: String },
    /// Query scoped to a nested document path.
    Nested { path: String, query: Box<Clause> },
    /// Field presence check.
    Exists { field: String },
    /// Wildcard pattern match.
    Wildcard {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// Conjunction evaluated in filter context (`bool.filter`).
    BoolAnd(Vec<Clause>),
    /// Disjunction (`bool.should`).
    BoolOr(Vec<Clause>),
}

impl Clause {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    /// Nested query whose inner query is a filter conjunction of `clauses`.
    pub fn nested_filter(path: impl Into<String>, clauses: Vec<Clause>) -> Self {
        Self::Nested {
            path: path.into(),
            query: Box::new(Self::BoolAnd(clauses)),
        }
    }

    /// Case-insensitive "contains" match: `*text*`.
    ///
    /// Wildcard metacharacters in `text` are escaped so they match literally.
    pub fn contains(field: impl Into<String>, text: &str) -> Self {
        Self::Wildcard {
            field: field.into(),
            pattern: format!("*{}*", escape_wildcards(text)),
            case_insensitive: true,
        }
    }

    /// Render to Elasticsearch query DSL.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Term { field, value } => json!({ "term": single(field, json!(value)) }),
            Self::Nested { path, query } => json!({
                "nested": {
                    "path": path,
                    "query": query.to_json(),
                }
            }),
            Self::Exists { field } => json!({ "exists": { "field": field } }),
            Self::Wildcard {
                field,
                pattern,
                case_insensitive,
            } => json!({
                "wildcard": single(
                    field,
                    json!({ "value": pattern, "case_insensitive": case_insensitive }),
                )
            }),
            Self::BoolAnd(clauses) => json!({ "bool": { "filter": render_all(clauses) } }),
            Self::BoolOr(clauses) => json!({ "bool": { "should": render_all(clauses) } }),
        }
    }
}

/// Root boolean query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoolQuery {
    filter: Vec<Clause>,
    must: Vec<Clause>,
}

impl BoolQuery {
    /// Filter conjunction, in insertion order.
    pub fn filter(&self) -> &[Clause] {
        &self.filter
    }

    /// Scoring clauses that every hit must satisfy.
    pub fn must(&self) -> &[Clause] {
        &self.must
    }
}

/// The `query` section of a search request.
///
/// An empty document (no `bool` root) means "match all"; the `query` key is
/// then left out of the request body entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDocument {
    root: Option<BoolQuery>,
}

impl QueryDocument {
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn is_match_all(&self) -> bool {
        self.root.is_none()
    }

    /// Root `bool` query, if any input has been added.
    pub fn root(&self) -> Option<&BoolQuery> {
        self.root.as_ref()
    }

    /// Ensure the `bool` root exists without adding clauses.
    pub fn ensure_bool(&mut self) -> &mut BoolQuery {
        self.root.get_or_insert_with(BoolQuery::default)
    }

    /// Append a clause to the filter conjunction.
    pub fn and_filter(&mut self, clause: Clause) {
        self.ensure_bool().filter.push(clause);
    }

    /// AND a disjunction of `clauses` with the rest of the query.
    ///
    /// Repeated calls extend the same disjunction under `must`; the filter
    /// conjunction is left untouched.
    pub fn must_match_any(&mut self, clauses: Vec<Clause>) {
        if clauses.is_empty() {
            return;
        }
        let root = self.ensure_bool();
        let existing = root.must.iter_mut().find_map(|clause| match clause {
            Clause::BoolOr(should) => Some(should),
            _ => None,
        });
        match existing {
            Some(should) => should.extend(clauses),
            None => root.must.push(Clause::BoolOr(clauses)),
        }
    }

    /// Filter conjunction (empty for match-all).
    pub fn filters(&self) -> &[Clause] {
        self.root.as_ref().map(BoolQuery::filter).unwrap_or_default()
    }

    /// Render the `query` section, or `None` for match-all.
    pub fn to_json(&self) -> Option<Value> {
        let root = self.root.as_ref()?;
        let mut bool_query = Map::new();
        if !root.filter.is_empty() {
            bool_query.insert("filter".to_string(), render_all(&root.filter));
        }
        if !root.must.is_empty() {
            bool_query.insert("must".to_string(), render_all(&root.must));
        }
        Some(json!({ "bool": Value::Object(bool_query) }))
    }
}

fn render_all(clauses: &[Clause]) -> Value {
    Value::Array(clauses.iter().map(Clause::to_json).collect())
}

/// One-entry object with a dynamic key.
fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Escape wildcard query metacharacters (`*`, `?`, `\`).
fn escape_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('*', "\\*")
        .replace('?', "\\?")
}
