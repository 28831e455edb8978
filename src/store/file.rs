//! JSON-file document store: `<root>/<collection>.json` holds an `{id: document}`
//! object. Writes go to a temp file and are renamed into place. Any I/O failure is
//! reported as unavailability so callers degrade the same way they do for a remote
//! store outage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{new_document_id, Document, DocumentStore, Query, StoreError, StoreResult};

type Collection = BTreeMap<String, Map<String, Value>>;

pub struct FileStore {
    root: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

fn unavailable(e: impl std::fmt::Display) -> StoreError { StoreError::Unavailable(e.to_string()) }

fn valid_collection_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).with_context(|| format!("creating data dir {}", root.display()))?;
        Ok(Self { root, lock: Mutex::new(()) })
    }

    pub fn root_path(&self) -> &Path { &self.root }

    fn path_for(&self, collection: &str) -> StoreResult<PathBuf> {
        if !valid_collection_name(collection) {
            return Err(StoreError::Unavailable(format!("invalid collection name '{collection}'")));
        }
        Ok(self.root.join(format!("{collection}.json")))
    }

    fn load(&self, collection: &str) -> StoreResult<Collection> {
        let path = self.path_for(collection)?;
        if !path.exists() {
            return Ok(Collection::new());
        }
        let text = fs::read_to_string(&path).map_err(unavailable)?;
        if text.trim().is_empty() {
            return Ok(Collection::new());
        }
        serde_json::from_str(&text).map_err(|e| unavailable(format!("{}: {}", path.display(), e)))
    }

    fn save(&self, collection: &str, docs: &Collection) -> StoreResult<()> {
        let path = self.path_for(collection)?;
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(docs)?;
        fs::write(&tmp, text).map_err(unavailable)?;
        fs::rename(&tmp, &path).map_err(unavailable)?;
        debug!(target: "picnic::store", "saved {} documents to {}", docs.len(), path.display());
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn backend_name(&self) -> &'static str { "file" }

    fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<Document> {
        let _g = self.lock.lock();
        let mut docs = self.load(collection)?;
        let id = new_document_id();
        docs.insert(id.clone(), data.clone());
        self.save(collection, &docs)?;
        Ok(Document { id, data })
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let _g = self.lock.lock();
        let docs = self.load(collection)?;
        Ok(docs.get(id).map(|data| Document { id: id.to_string(), data: data.clone() }))
    }

    fn update(&self, collection: &str, id: &str, patch: Map<String, Value>) -> StoreResult<Option<Document>> {
        let _g = self.lock.lock();
        let mut docs = self.load(collection)?;
        let Some(data) = docs.get_mut(id) else { return Ok(None); };
        for (k, v) in patch {
            data.insert(k, v);
        }
        let out = Document { id: id.to_string(), data: data.clone() };
        self.save(collection, &docs)?;
        Ok(Some(out))
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let _g = self.lock.lock();
        let mut docs = self.load(collection)?;
        if docs.remove(id).is_none() {
            return Ok(false);
        }
        self.save(collection, &docs)?;
        Ok(true)
    }

    fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let _g = self.lock.lock();
        let docs = self.load(collection)?;
        Ok(query.apply(docs.into_iter().map(|(id, data)| Document { id, data })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn obj(v: Value) -> Map<String, Value> { v.as_object().cloned().unwrap() }

    #[test]
    fn documents_survive_reopen() {
        let tmp = tempdir().unwrap();
        let id = {
            let s = FileStore::open(tmp.path()).unwrap();
            s.insert("bookings", obj(json!({"location":"nida"}))).unwrap().id
        };
        let s = FileStore::open(tmp.path()).unwrap();
        let d = s.get("bookings", &id).unwrap().unwrap();
        assert_eq!(d.get_str("location"), Some("nida"));
        assert_eq!(s.query("bookings", &Query::new()).unwrap().len(), 1);
    }

    #[test]
    fn update_and_delete_persist() {
        let tmp = tempdir().unwrap();
        let s = FileStore::open(tmp.path()).unwrap();
        let id = s.insert("reviews", obj(json!({"status":"pending"}))).unwrap().id;
        s.update("reviews", &id, obj(json!({"status":"rejected"}))).unwrap();
        assert_eq!(s.get("reviews", &id).unwrap().unwrap().get_str("status"), Some("rejected"));
        assert!(s.delete("reviews", &id).unwrap());
        assert!(s.get("reviews", &id).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_unavailable_not_empty() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("reviews.json"), "{not json").unwrap();
        let s = FileStore::open(tmp.path()).unwrap();
        assert!(matches!(s.query("reviews", &Query::new()), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn path_traversal_names_are_refused() {
        let tmp = tempdir().unwrap();
        let s = FileStore::open(tmp.path()).unwrap();
        assert!(s.query("../etc", &Query::new()).is_err());
    }
}
