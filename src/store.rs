use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{IdeologyError, Result};

pub const BILL_ANALYSES: &str = "bill_analyses";
pub const MEMBER_VOTES: &str = "member_votes";
pub const LEGISLATORS: &str = "legislators";
pub const LEGISLATOR_PROFILES: &str = "legislator_profiles";
pub const AGGREGATED_STATS: &str = "aggregated_stats";
pub const LEGISLATOR_STAKEHOLDERS: &str = "legislator_stakeholders";

/// Upsert key: ordered `(field, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordKey(Vec<(String, String)>);

impl RecordKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl ToString) -> Self {
        self.0.push((field.to_string(), value.to_string()));
        self
    }

    /// `field=value|field=value`
    pub fn canonical(&self) -> String {
        self.0
            .iter()
            .map(|(f, v)| format!("{}={}", f, v))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Stable document name.
    pub fn digest(&self) -> String {
        format!("{:016x}", xxh3_64(self.canonical().as_bytes()))
    }
}

pub trait RecordStore: Send + Sync {
    /// Every document in `collection`, in a stable order. A missing
    /// collection is empty.
    fn find(&self, collection: &str) -> Result<Vec<Value>>;

    /// Replace the document under `key`, stamping `last_modified`.
    fn upsert(&self, collection: &str, key: &RecordKey, document: Value) -> Result<()>;
}

/// Serialize and upsert in one step.
pub fn upsert_record<S, T>(store: &S, collection: &str, key: &RecordKey, record: &T) -> Result<()>
where
    S: RecordStore + ?Sized,
    T: Serialize + ?Sized,
{
    let document = serde_json::to_value(record).map_err(|e| IdeologyError::store(collection, e))?;
    store.upsert(collection, key, document)
}

fn stamp(mut document: Value) -> Value {
    if let Value::Object(map) = &mut document {
        map.insert(
            "last_modified".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    document
}

/* -------------------------------------------------------------------------- */
/* JSON directory                                                             */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| IdeologyError::store(&root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }
}

impl RecordStore for JsonDirStore {
    fn find(&self, collection: &str) -> Result<Vec<Value>> {
        let dir = self.collection_dir(collection);
        if !dir.is_dir() {
            debug!("Collection directory missing, treating as empty - path={}", dir.display());
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| IdeologyError::store(collection, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            let bytes = fs::read(&path).map_err(|e| IdeologyError::store(collection, e))?;
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Array(items)) => documents.extend(items),
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Unreadable document skipped - path={}, error={}", path.display(), e),
            }
        }

        debug!("Collection read - collection={}, documents={}", collection, documents.len());
        Ok(documents)
    }

    fn upsert(&self, collection: &str, key: &RecordKey, document: Value) -> Result<()> {
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir).map_err(|e| IdeologyError::store(collection, e))?;

        let path = dir.join(format!("{}.json", key.digest()));
        let tmp = dir.join(format!("{}.json.tmp", key.digest()));
        let bytes = serde_json::to_vec_pretty(&stamp(document)).map_err(|e| IdeologyError::store(collection, e))?;

        // Readers never see a partial document
        fs::write(&tmp, bytes).map_err(|e| IdeologyError::store(collection, e))?;
        fs::rename(&tmp, &path).map_err(|e| IdeologyError::store(collection, e))?;
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* In memory                                                                  */
/* -------------------------------------------------------------------------- */

type Collection = Vec<(String, Value)>;

/// Insertion-ordered in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw documents without a key, as an upstream producer would.
    pub fn seed(&self, collection: &str, documents: impl IntoIterator<Item = Value>) -> Result<()> {
        let mut guard = self
            .collections
            .lock()
            .map_err(|_| IdeologyError::store(collection, "lock poisoned"))?;
        let docs = guard.entry(collection.to_string()).or_default();
        for doc in documents {
            let name = format!("seed-{:08}", docs.len());
            docs.push((name, doc));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn find(&self, collection: &str) -> Result<Vec<Value>> {
        let guard = self
            .collections
            .lock()
            .map_err(|_| IdeologyError::store(collection, "lock poisoned"))?;
        Ok(guard
            .get(collection)
            .map(|docs| docs.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default())
    }

    fn upsert(&self, collection: &str, key: &RecordKey, document: Value) -> Result<()> {
        let name = key.digest();
        let document = stamp(document);
        let mut guard = self
            .collections
            .lock()
            .map_err(|_| IdeologyError::store(collection, "lock poisoned"))?;
        let docs = guard.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = document,
            None => docs.push((name, document)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(member: &str) -> RecordKey {
        RecordKey::new().with("member_id", member).with("spec_hash", "m1_3_all_all_all")
    }

    #[test]
    fn test_key_digest_is_stable_and_order_sensitive() {
        assert_eq!(key("A").digest(), key("A").digest());
        assert_ne!(key("A").digest(), key("B").digest());
        assert_eq!(key("A").canonical(), "member_id=A|spec_hash=m1_3_all_all_all");

        let swapped = RecordKey::new().with("spec_hash", "m1_3_all_all_all").with("member_id", "A");
        assert_ne!(key("A").digest(), swapped.digest());
    }

    #[test]
    fn test_memory_upsert_replaces() {
        let store = MemoryStore::new();
        store.upsert(LEGISLATOR_PROFILES, &key("A"), json!({"score": 1})).unwrap();
        store.upsert(LEGISLATOR_PROFILES, &key("B"), json!({"score": 2})).unwrap();
        store.upsert(LEGISLATOR_PROFILES, &key("A"), json!({"score": 3})).unwrap();

        let docs = store.find(LEGISLATOR_PROFILES).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["score"], 3);
        assert!(docs[0]["last_modified"].is_string());
    }

    #[test]
    fn test_memory_seed_keeps_order() {
        let store = MemoryStore::new();
        store.seed(BILL_ANALYSES, vec![json!({"n": 1}), json!({"n": 2})]).unwrap();
        store.seed(BILL_ANALYSES, vec![json!({"n": 3})]).unwrap();

        let ns: Vec<i64> = store
            .find(BILL_ANALYSES)
            .unwrap()
            .iter()
            .map(|d| d["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![1, 2, 3]);
        assert!(store.find(MEMBER_VOTES).unwrap().is_empty());
    }

    #[test]
    fn test_json_dir_upsert_and_find() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();

        store.upsert(AGGREGATED_STATS, &key("A"), json!({"v": 1})).unwrap();
        store.upsert(AGGREGATED_STATS, &key("A"), json!({"v": 2})).unwrap();

        let docs = store.find(AGGREGATED_STATS).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["v"], 2);

        let file = tmp
            .path()
            .join(AGGREGATED_STATS)
            .join(format!("{}.json", key("A").digest()));
        assert!(file.exists());
    }

    #[test]
    fn test_json_dir_flattens_arrays_and_skips_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(MEMBER_VOTES);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.json"), r#"[{"member_id": "A"}, {"member_id": "B"}]"#).unwrap();
        std::fs::write(dir.join("b.json"), r#"{"member_id": "C"}"#).unwrap();
        std::fs::write(dir.join("c.json"), "not json").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = JsonDirStore::open(tmp.path()).unwrap();
        let ids: Vec<String> = store
            .find(MEMBER_VOTES)
            .unwrap()
            .iter()
            .map(|d| d["member_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_json_dir_missing_collection_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();
        assert!(store.find(LEGISLATORS).unwrap().is_empty());
    }
}
