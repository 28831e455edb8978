use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{new_document_id, Document, DocumentStore, Query, StoreError, StoreResult};

type Collection = BTreeMap<String, Map<String, Value>>;

/// Process-local document store. `set_online(false)` simulates an outage.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn set_online(&self, online: bool) { self.offline.store(!online, Ordering::SeqCst); }

    fn check(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str { "memory" }

    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<Document> {
        self.check()?;
        let id = new_document_id();
        self.collections.write().entry(collection.to_string()).or_default().insert(id.clone(), data.clone());
        Ok(Document { id, data })
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.check()?;
        let map = self.collections.read();
        Ok(map.get(collection).and_then(|c| c.get(id)).map(|data| Document { id: id.to_string(), data: data.clone() }))
    }

    fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> StoreResult<Option<Document>> {
        self.check()?;
        let mut map = self.collections.write();
        let Some(data) = map.get_mut(collection).and_then(|c| c.get_mut(id)) else { return Ok(None); };
        for (k, v) in patch {
            data.insert(k, v);
        }
        Ok(Some(Document { id: id.to_string(), data: data.clone() }))
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.check()?;
        Ok(self.collections.write().get_mut(collection).map(|c| c.remove(id).is_some()).unwrap_or(false))
    }

    fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.check()?;
        let map = self.collections.read();
        let Some(c) = map.get(collection) else { return Ok(Vec::new()); };
        Ok(query.apply(c.iter().map(|(id, data)| Document { id: id.clone(), data: data.clone() })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> { v.as_object().cloned().unwrap() }

    #[test]
    fn crud_round() {
        let s = MemoryStore::new();
        let d = s.insert("reviews", obj(json!({"status":"pending"}))).unwrap();
        assert_eq!(s.get("reviews", &d.id).unwrap().unwrap().get_str("status"), Some("pending"));

        let up = s.update("reviews", &d.id, obj(json!({"status":"approved"}))).unwrap().unwrap();
        assert_eq!(up.get_str("status"), Some("approved"));
        assert!(s.update("reviews", "missing", Map::new()).unwrap().is_none());

        assert!(s.delete("reviews", &d.id).unwrap());
        assert!(!s.delete("reviews", &d.id).unwrap());
        assert!(s.get("reviews", &d.id).unwrap().is_none());
    }

    #[test]
    fn unknown_collection_queries_empty() {
        let s = MemoryStore::new();
        assert!(s.query("nothing", &Query::new()).unwrap().is_empty());
    }

    #[test]
    fn offline_store_reports_unavailable() {
        let s = MemoryStore::new();
        s.set_online(false);
        assert!(matches!(s.query("reviews", &Query::new()), Err(StoreError::Unavailable(_))));
        s.set_online(true);
        assert!(s.query("reviews", &Query::new()).is_ok());
    }
}
