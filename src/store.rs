//!
//! picnic document store
//! ----------------------
//! Narrow interface over the external document store that holds bookings, reviews and
//! mirrored user profiles. Documents are JSON objects keyed by an opaque id inside a
//! named collection. Handlers only ever go through `collection(name)`:
//!
//! ```ignore
//! let pending = store.collection("reviews")
//!     .query(&Query::new().where_eq("status", "pending").order_by_desc("createdAt"))?;
//! ```
//!
//! Backends:
//! - `MemoryStore`: process-local maps; can be switched offline to exercise fallbacks.
//! - `FileStore`: one JSON file per collection under a data directory.
//! - `UnavailableStore`: always unavailable (builds without a configured store).

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod file;

pub use memory::MemoryStore;
pub use file::FileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document must be a JSON object")]
    NotAnObject,
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    /// Flatten into a single object with `id` alongside the stored fields.
    pub fn into_json(self) -> Value {
        let mut data = self.data;
        data.insert("id".to_string(), Value::String(self.id));
        Value::Object(data)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> { self.data.get(field).and_then(|v| v.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction { Asc, Desc }

/// Equality filters, one optional sort key and an optional limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self { Self::default() }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by_asc(mut self, field: &str) -> Self { self.order_by = Some((field.to_string(), Direction::Asc)); self }

    pub fn order_by_desc(mut self, field: &str) -> Self { self.order_by = Some((field.to_string(), Direction::Desc)); self }

    pub fn limit(mut self, n: usize) -> Self { self.limit = Some(n); self }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        self.filters.iter().all(|(k, v)| data.get(k) == Some(v))
    }

    /// Filter, sort and truncate an unordered scan. Backends without native query
    /// support call this over their full collection; ties keep id order.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some((field, dir)) = &self.order_by {
            out.sort_by(|a, b| {
                let ord = compare_values(a.data.get(field), b.data.get(field));
                if *dir == Direction::Desc { ord.reverse() } else { ord }
            });
        }
        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

fn as_timestamp(s: &str) -> Option<DateTime<FixedOffset>> { DateTime::parse_from_rfc3339(s).ok() }

/// Total order over optional JSON scalars:
/// missing < null < bool < number < RFC 3339 timestamp < other string.
/// Timestamps compare as instants, whatever their fractional-second precision.
/// Arrays and objects compare equal to each other.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(s)) if as_timestamp(s).is_some() => 4,
            Some(Value::String(_)) => 5,
            Some(_) => 6,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => match (as_timestamp(x), as_timestamp(y)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => x.cmp(y),
        },
        _ => rank(a).cmp(&rank(b)),
    }
}

pub trait DocumentStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Store a new document under a freshly generated id.
    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<Document>;

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Shallow-merge `patch` into an existing document. `None` if the id is unknown.
    fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> StoreResult<Option<Document>>;

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;
}

impl<'s> dyn DocumentStore + 's {
    pub fn collection<'a>(&'a self, name: &'a str) -> Collection<'a> {
        Collection { store: self, name }
    }
}

/// Handle on one named collection.
pub struct Collection<'a> {
    store: &'a (dyn DocumentStore + 'a),
    name: &'a str,
}

impl<'a> Collection<'a> {
    pub fn name(&self) -> &str { self.name }

    pub fn add(&self, data: Map<String, Value>) -> StoreResult<Document> { self.store.insert(self.name, data) }

    /// Serialize a typed record and store it. The record must serialize to an object.
    pub fn add_record<T: Serialize>(&self, record: &T) -> StoreResult<Document> {
        match serde_json::to_value(record)? {
            Value::Object(map) => self.add(map),
            _ => Err(StoreError::NotAnObject),
        }
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<Document>> { self.store.get(self.name, id) }

    pub fn update(&self, id: &str, patch: Map<String, Value>) -> StoreResult<Option<Document>> { self.store.update(self.name, id, patch) }

    pub fn delete(&self, id: &str) -> StoreResult<bool> { self.store.delete(self.name, id) }

    pub fn query(&self, query: &Query) -> StoreResult<Vec<Document>> { self.store.query(self.name, query) }

    pub fn all(&self) -> StoreResult<Vec<Document>> { self.query(&Query::new()) }
}

/// Store that is never reachable. Every read and write degrades to the caller's
/// fallback path.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn err<T>() -> StoreResult<T> { Err(StoreError::Unavailable("no document store configured".into())) }
}

impl DocumentStore for UnavailableStore {
    fn backend_name(&self) -> &'static str { "none" }
    fn insert(&self, _: &str, _: Map<String, Value>) -> StoreResult<Document> { Self::err() }
    fn get(&self, _: &str, _: &str) -> StoreResult<Option<Document>> { Self::err() }
    fn update(&self, _: &str, _: &str, _: Map<String, Value>) -> StoreResult<Option<Document>> { Self::err() }
    fn delete(&self, _: &str, _: &str) -> StoreResult<bool> { Self::err() }
    fn query(&self, _: &str, _: &Query) -> StoreResult<Vec<Document>> { Self::err() }
}

pub(crate) fn new_document_id() -> String { uuid::Uuid::new_v4().simple().to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, v: Value) -> Document {
        Document { id: id.into(), data: v.as_object().cloned().unwrap() }
    }

    #[test]
    fn query_filters_sorts_and_limits() {
        let docs = vec![
            doc("a", json!({"status":"approved","createdAt":"2025-06-01T10:00:00Z","rating":5})),
            doc("b", json!({"status":"pending","createdAt":"2025-06-03T10:00:00Z","rating":4})),
            doc("c", json!({"status":"approved","createdAt":"2025-06-02T10:00:00Z","rating":3})),
        ];
        let q = Query::new().where_eq("status", "approved").order_by_desc("createdAt");
        let ids: Vec<String> = q.apply(docs.clone()).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let q = Query::new().order_by_asc("rating").limit(2);
        let ids: Vec<String> = q.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn timestamps_sort_as_instants() {
        // chrono drops trailing zero groups, so precision varies between records
        let docs = vec![
            doc("millis", json!({"createdAt":"2025-06-01T10:00:05.123Z"})),
            doc("micros", json!({"createdAt":"2025-06-01T10:00:05.123456Z"})),
            doc("whole", json!({"createdAt":"2025-06-01T10:00:05Z"})),
            doc("offset", json!({"createdAt":"2025-06-01T13:00:06+03:00"})),
        ];
        let ids: Vec<String> = Query::new().order_by_desc("createdAt").apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["offset", "micros", "millis", "whole"]);
    }

    #[test]
    fn plain_strings_sort_after_timestamps() {
        let docs = vec![doc("t", json!({"k":"zzz"})), doc("d", json!({"k":"2025-06-01T10:00:00Z"})), doc("a", json!({"k":"aaa"}))];
        let ids: Vec<String> = Query::new().order_by_asc("k").apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["d", "a", "t"]);
    }

    #[test]
    fn missing_sort_keys_order_first() {
        let docs = vec![doc("x", json!({"n":1})), doc("y", json!({}))];
        let ids: Vec<String> = Query::new().order_by_asc("n").apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["y", "x"]);
    }

    #[test]
    fn into_json_carries_id() {
        let v = doc("abc", json!({"title":"Puiku"})).into_json();
        assert_eq!(v["id"], "abc");
        assert_eq!(v["title"], "Puiku");
    }

    #[test]
    fn unavailable_store_always_fails() {
        let store: Box<dyn DocumentStore> = Box::new(UnavailableStore);
        assert!(matches!(store.collection("reviews").all(), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.collection("reviews").add(Map::new()), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn add_record_rejects_non_objects() {
        let store: Box<dyn DocumentStore> = Box::new(MemoryStore::new());
        assert!(matches!(store.collection("x").add_record(&3), Err(StoreError::NotAnObject)));
    }
}
