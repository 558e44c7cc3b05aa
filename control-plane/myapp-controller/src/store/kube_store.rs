use std::fmt::Debug;

use async_trait::async_trait;
use kube::{
    Api, Client, Resource, ResourceExt,
    api::PostParams,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::trace;

use super::{ObjectStore, StoreError};

/// `ObjectStore` backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore<K> {
    client: Client,
    field_manager: String,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
            _kind: std::marker::PhantomData,
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
{
    fn api(&self, ns: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), ns)
    }
}

fn namespace_of<K: Resource<DynamicType = ()>>(obj: &K) -> Result<String, StoreError> {
    obj.namespace().ok_or_else(|| {
        StoreError::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} {} has no namespace", K::kind(&()), obj.name_any()),
            reason: "Invalid".to_string(),
            code: 422,
        }))
    })
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, ns: &str, name: &str) -> Result<Option<K>, StoreError> {
        trace!(%ns, %name, kind = %K::kind(&()), "store: get");
        Ok(self.api(ns).get_opt(name).await?)
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let ns = namespace_of(obj)?;
        trace!(%ns, name = %obj.name_any(), kind = %K::kind(&()), "store: create");
        Ok(self.api(&ns).create(&self.post_params(), obj).await?)
    }

    async fn replace(&self, obj: &K) -> Result<K, StoreError> {
        let ns = namespace_of(obj)?;
        let name = obj.name_any();
        trace!(%ns, %name, kind = %K::kind(&()), rv = ?obj.resource_version(), "store: replace");
        Ok(self.api(&ns).replace(&name, &self.post_params(), obj).await?)
    }
}
