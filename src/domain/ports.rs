use crate::domain::league::League;
use crate::domain::ml::FeatureVector;
use crate::domain::prediction::InputData;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::time::Duration;

/// Context handed to feature extraction alongside the raw input
#[derive(Debug, Clone)]
pub struct FeatureContext {
    pub league: League,
    pub typical_score: f64,
}

impl FeatureContext {
    pub fn for_league(league: League) -> Self {
        Self {
            league,
            typical_score: league.typical_score(),
        }
    }
}

/// Turns raw request attributes into a model-ready vector. Must be pure.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, raw_input: &InputData, context: &FeatureContext) -> FeatureVector;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }
}

/// Equality filter over top-level document fields
pub type DocumentFilter = Map<String, Value>;

/// Read access to stored historical documents (games, results)
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        sort: Option<&SortSpec>,
        limit: usize,
    ) -> Result<Vec<Value>>;

    async fn insert(&self, collection: &str, document: Value) -> Result<()>;
}

/// String key/value backend with per-entry TTL (cache markers, rate limits)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Drop expired entries. Backends with native expiry have nothing to do.
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Filter, sort and truncate documents in memory. Shared by store
/// implementations that cannot push the query down.
pub fn apply_query(
    documents: impl IntoIterator<Item = Value>,
    filter: &DocumentFilter,
    sort: Option<&SortSpec>,
    limit: usize,
) -> Vec<Value> {
    let mut matched: Vec<Value> = documents
        .into_iter()
        .filter(|doc| {
            filter
                .iter()
                .all(|(field, expected)| doc.get(field) == Some(expected))
        })
        .collect();

    if let Some(spec) = sort {
        matched.sort_by(|a, b| {
            let ord = compare_values(a.get(&spec.field), b.get(&spec.field));
            match spec.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }

    matched.truncate(limit);
    matched
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
