//! Filtered queries over stored entity bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EntityKind, StoredEntity};

/// A filter applied to an entity's JSON body. Field names may be dotted
/// paths (`workflow.version`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryFilter {
    /// Exact match on a string, number, or boolean field.
    Exact { field: String, value: Value },
    /// Case-insensitive substring match on a string field.
    Contains { field: String, value: String },
    /// RFC 3339 timestamp range (inclusive bounds), either side optional.
    DateRange {
        field: String,
        start: Option<String>,
        end: Option<String>,
    },
}

impl QueryFilter {
    pub fn exact(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Exact {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Check if an entity body matches this filter.
    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Self::Exact { field, value } => lookup(body, field) == Some(value),
            Self::Contains { field, value } => lookup(body, field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&value.to_lowercase())),
            Self::DateRange { field, start, end } => {
                // RFC 3339 in UTC compares correctly as strings
                let Some(actual) = lookup(body, field).and_then(Value::as_str) else {
                    return false;
                };
                if let Some(start) = start {
                    if actual < start.as_str() {
                        return false;
                    }
                }
                if let Some(end) = end {
                    if actual > end.as_str() {
                        return false;
                    }
                }
                true
            }
        }
    }
}

/// Look up a dotted field path inside a JSON body.
pub(crate) fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = body;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// A query over one entity kind, with pagination and optional sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub filters: Vec<QueryFilter>,
    #[serde(default)]
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    #[serde(default)]
    pub sort_descending: bool,
}

impl Query {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            offset: 0,
            limit: 100,
            sort_field: None,
            sort_descending: false,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn with_pagination(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_field = Some(field.into());
        self.sort_descending = descending;
        self
    }

    /// Whether a stored entity matches every filter.
    pub fn matches(&self, entity: &StoredEntity) -> bool {
        entity.kind == self.kind && self.filters.iter().all(|f| f.matches(&entity.body))
    }
}

/// Query result with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Total number of matching entities across all pages.
    pub total: usize,
    /// Entities in this page.
    pub entries: Vec<StoredEntity>,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl QueryResult {
    pub fn new(total: usize, entries: Vec<StoredEntity>, offset: usize, limit: usize) -> Self {
        let has_more = offset + entries.len() < total;
        Self {
            total,
            entries,
            offset,
            limit,
            has_more,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(body: Value) -> StoredEntity {
        StoredEntity::new("e-1", EntityKind::Encounter, body)
    }

    #[test]
    fn test_exact_filter() {
        let e = entity(json!({"status": "signed", "workflow": {"version": 3}}));
        assert!(QueryFilter::exact("status", "signed").matches(&e.body));
        assert!(QueryFilter::exact("workflow.version", 3).matches(&e.body));
        assert!(!QueryFilter::exact("status", "draft").matches(&e.body));
        assert!(!QueryFilter::exact("missing", "x").matches(&e.body));
    }

    #[test]
    fn test_contains_filter() {
        let e = entity(json!({"reason": "Persistent Cough"}));
        assert!(QueryFilter::contains("reason", "cough").matches(&e.body));
        assert!(!QueryFilter::contains("reason", "fever").matches(&e.body));
    }

    #[test]
    fn test_date_range_filter() {
        let e = entity(json!({"started_at": "2024-03-10T09:15:00Z"}));
        let filter = QueryFilter::DateRange {
            field: "started_at".into(),
            start: Some("2024-03-01T00:00:00Z".into()),
            end: Some("2024-03-31T23:59:59Z".into()),
        };
        assert!(filter.matches(&e.body));

        let filter = QueryFilter::DateRange {
            field: "started_at".into(),
            start: Some("2024-04-01T00:00:00Z".into()),
            end: None,
        };
        assert!(!filter.matches(&e.body));
    }

    #[test]
    fn test_query_matches_kind_and_all_filters() {
        let e = entity(json!({"status": "signed", "patient_id": "pat-1"}));
        let q = Query::new(EntityKind::Encounter)
            .with_filter(QueryFilter::exact("status", "signed"))
            .with_filter(QueryFilter::exact("patient_id", "pat-1"));
        assert!(q.matches(&e));

        let q = Query::new(EntityKind::Patient);
        assert!(!q.matches(&e));
    }

    #[test]
    fn test_query_result_has_more() {
        let r = QueryResult::new(10, vec![], 0, 5);
        assert!(r.has_more);
        let entries = vec![entity(json!({}))];
        let r = QueryResult::new(1, entries, 0, 5);
        assert!(!r.has_more);
    }
}
