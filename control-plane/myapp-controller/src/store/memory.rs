use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use tokio::sync::RwLock;

use super::{ObjectStore, StoreError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteCounts {
    pub creates: usize,
    pub replaces: usize,
}

impl WriteCounts {
    pub fn total(&self) -> usize {
        self.creates + self.replaces
    }
}

struct State<K> {
    objects: BTreeMap<(String, String), K>,
    next_rv: u64,
    writes: WriteCounts,
    replace_conflicts: usize,
    get_failures: usize,
    create_race: Option<K>,
}

/// In-memory store with resourceVersion semantics and fault injection.
pub struct MemoryStore<K> {
    state: RwLock<State<K>>,
}

fn unavailable() -> StoreError {
    StoreError::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: "etcdserver: request timed out".to_string(),
        reason: "ServiceUnavailable".to_string(),
        code: 503,
    }))
}

fn key_of<K: Resource>(obj: &K) -> (String, String) {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> MemoryStore<K> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                objects: BTreeMap::new(),
                next_rv: 1,
                writes: WriteCounts::default(),
                replace_conflicts: 0,
                get_failures: 0,
                create_race: None,
            }),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone,
{
    /// Seed an object as if another actor wrote it; assigns uid/resourceVersion.
    pub async fn insert(&self, mut obj: K) -> K {
        let mut st = self.state.write().await;
        let rv = st.next_rv;
        st.next_rv += 1;
        let meta = obj.meta_mut();
        meta.resource_version = Some(rv.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}-{}", meta.name.clone().unwrap_or_default(), rv));
        }
        st.objects.insert(key_of(&obj), obj.clone());
        obj
    }

    pub async fn remove(&self, ns: &str, name: &str) {
        let mut st = self.state.write().await;
        st.objects.remove(&(ns.to_string(), name.to_string()));
    }

    pub async fn peek(&self, ns: &str, name: &str) -> Option<K> {
        let st = self.state.read().await;
        st.objects.get(&(ns.to_string(), name.to_string())).cloned()
    }

    pub async fn writes(&self) -> WriteCounts {
        self.state.read().await.writes
    }

    /// The next `n` replace calls fail with a conflict, each time after a
    /// concurrent writer bumps the stored resourceVersion.
    pub async fn conflict_next_replaces(&self, n: usize) {
        self.state.write().await.replace_conflicts = n;
    }

    pub async fn fail_next_gets(&self, n: usize) {
        self.state.write().await.get_failures = n;
    }

    /// The next create loses a race: `winner` lands first and the create
    /// fails with AlreadyExists.
    pub async fn race_next_create(&self, winner: K) {
        self.state.write().await.create_race = Some(winner);
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Send + Sync,
{
    async fn get(&self, ns: &str, name: &str) -> Result<Option<K>, StoreError> {
        let mut st = self.state.write().await;
        if st.get_failures > 0 {
            st.get_failures -= 1;
            return Err(unavailable());
        }
        Ok(st.objects.get(&(ns.to_string(), name.to_string())).cloned())
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let mut st = self.state.write().await;
        let key = key_of(obj);
        if let Some(mut winner) = st.create_race.take() {
            let rv = st.next_rv;
            st.next_rv += 1;
            winner.meta_mut().resource_version = Some(rv.to_string());
            winner.meta_mut().uid = Some(format!("uid-{}-{}", key.1, rv));
            st.objects.insert(key_of(&winner), winner);
        }
        if st.objects.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{}/{} already exists", key.0, key.1)));
        }
        let mut stored = obj.clone();
        let rv = st.next_rv;
        st.next_rv += 1;
        let meta = stored.meta_mut();
        meta.resource_version = Some(rv.to_string());
        meta.uid = Some(format!("uid-{}-{}", key.1, rv));
        st.objects.insert(key, stored.clone());
        st.writes.creates += 1;
        Ok(stored)
    }

    async fn replace(&self, obj: &K) -> Result<K, StoreError> {
        let mut guard = self.state.write().await;
        let st = &mut *guard;
        let key = key_of(obj);
        let rv = st.next_rv;
        let Some(current) = st.objects.get_mut(&key) else {
            return Err(StoreError::Kube(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{}/{} not found", key.0, key.1),
                reason: "NotFound".to_string(),
                code: 404,
            })));
        };
        if st.replace_conflicts > 0 {
            // a concurrent writer got there first
            current.meta_mut().resource_version = Some(rv.to_string());
            st.next_rv += 1;
            st.replace_conflicts -= 1;
            return Err(StoreError::Conflict("object has been modified".to_string()));
        }
        if current.meta().resource_version != obj.meta().resource_version {
            return Err(StoreError::Conflict("stale resourceVersion".to_string()));
        }
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(rv.to_string());
        *current = stored.clone();
        st.next_rv += 1;
        st.writes.replaces += 1;
        Ok(stored)
    }
}
