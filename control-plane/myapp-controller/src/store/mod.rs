//! Resource-store seam between the reconcile engine and the cluster API.
//!
//! The engine only needs `get`, `create` and `replace` on a single kind, so
//! each child kind gets its own `ObjectStore<K>`. Production code uses
//! [`KubeStore`]; engine tests run against an in-memory store.

mod kube_store;
#[cfg(test)]
pub(crate) mod memory;

pub use kube_store::KubeStore;

use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Optimistic-concurrency violation (HTTP 409 / stale resourceVersion).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("kubernetes api error: {0}")]
    Kube(#[source] kube::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) if ae.code == 409 => {
                StoreError::Conflict(ae.message)
            }
            other => StoreError::Kube(other),
        }
    }
}

#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    /// Fetch by identity; `Ok(None)` when the object does not exist.
    async fn get(&self, ns: &str, name: &str) -> Result<Option<K>, StoreError>;
    async fn create(&self, obj: &K) -> Result<K, StoreError>;
    /// Replace guarded by the `metadata.resourceVersion` carried on `obj`.
    async fn replace(&self, obj: &K) -> Result<K, StoreError>;
}
