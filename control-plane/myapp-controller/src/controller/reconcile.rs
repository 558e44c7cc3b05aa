use std::fmt;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Client, Resource, runtime::reflector::ObjectRef};
use tracing::{debug, info, instrument, warn};

use super::mutate::{
    mutate_deployment, mutate_service, selector_matches_template,
};
use super::owner::bind_owner;
use super::{ReconcileErr, store_err};
use crate::crd::my_app::MyApp;
use crate::store::{KubeStore, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationResult::Created => write!(f, "created"),
            OperationResult::Updated => write!(f, "updated"),
            OperationResult::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Parent is gone or being deleted; garbage collection owns cleanup.
    ParentGone,
    Converged {
        deployment: OperationResult,
        service: OperationResult,
    },
}

/// Result of the fetch step; drives create vs replace explicitly.
#[derive(Debug, Clone)]
pub enum Fetched<K> {
    Found(K),
    Absent,
}

pub struct Reconciler {
    apps: Arc<dyn ObjectStore<MyApp>>,
    deployments: Arc<dyn ObjectStore<Deployment>>,
    services: Arc<dyn ObjectStore<Service>>,
}

impl Reconciler {
    pub fn new(
        apps: Arc<dyn ObjectStore<MyApp>>,
        deployments: Arc<dyn ObjectStore<Deployment>>,
        services: Arc<dyn ObjectStore<Service>>,
    ) -> Self {
        Self {
            apps,
            deployments,
            services,
        }
    }

    pub fn from_client(client: Client, field_manager: &str) -> Self {
        Self::new(
            Arc::new(KubeStore::<MyApp>::new(client.clone(), field_manager)),
            Arc::new(KubeStore::<Deployment>::new(
                client.clone(),
                field_manager,
            )),
            Arc::new(KubeStore::<Service>::new(client, field_manager)),
        )
    }

    /// Drive the Deployment and Service of one MyApp toward its spec.
    ///
    /// Safe to re-run from scratch at any point: every step starts from the
    /// freshly fetched object.
    #[instrument(skip_all, fields(ns = %key.namespace.as_deref().unwrap_or("default"), name = %key.name))]
    pub async fn reconcile(
        &self,
        key: &ObjectRef<MyApp>,
    ) -> Result<ReconcileOutcome, ReconcileErr> {
        let ns = key.namespace.as_deref().unwrap_or("default");
        let name = key.name.as_str();

        let app = match self
            .apps
            .get(ns, name)
            .await
            .map_err(store_err("MyApp", ns, name))?
        {
            Some(app) => app,
            None => {
                debug!(%ns, %name, "reconcile: parent not found; nothing to do");
                return Ok(ReconcileOutcome::ParentGone);
            }
        };
        if app.meta().deletion_timestamp.is_some() {
            debug!(%ns, %name, "reconcile: parent is being deleted; leaving children to gc");
            return Ok(ReconcileOutcome::ParentGone);
        }

        let deployment =
            create_or_update(self.deployments.as_ref(), ns, name, |base| {
                desired_deployment(&app, base)
            })
            .await?;
        info!(%ns, %name, kind = "Deployment", result = %deployment, "CreateOrUpdate");

        let service =
            create_or_update(self.services.as_ref(), ns, name, |base| {
                desired_service(&app, base)
            })
            .await?;
        info!(%ns, %name, kind = "Service", result = %service, "CreateOrUpdate");

        Ok(ReconcileOutcome::Converged {
            deployment,
            service,
        })
    }
}

pub fn desired_deployment(
    app: &MyApp,
    base: Deployment,
) -> Result<Deployment, ReconcileErr> {
    let mut desired = mutate_deployment(&app.spec, base);
    if !selector_matches_template(&desired) {
        let meta = &desired.metadata;
        let selector = desired
            .spec
            .as_ref()
            .and_then(|ds| ds.selector.match_labels.as_ref())
            .map(|m| {
                m.iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();
        return Err(ReconcileErr::SelectorMismatch {
            key: format!(
                "{}/{}",
                meta.namespace.as_deref().unwrap_or_default(),
                meta.name.as_deref().unwrap_or_default()
            ),
            selector,
        });
    }
    desired.metadata = bind_owner(app, desired.metadata)?;
    Ok(desired)
}

pub fn desired_service(
    app: &MyApp,
    base: Service,
) -> Result<Service, ReconcileErr> {
    let mut desired = mutate_service(&app.spec, base);
    desired.metadata = bind_owner(app, desired.metadata)?;
    Ok(desired)
}

/// Empty object carrying only the child identity.
fn empty<K>(ns: &str, name: &str) -> K
where
    K: Resource + Default,
{
    let mut obj = K::default();
    let meta = obj.meta_mut();
    meta.name = Some(name.to_string());
    meta.namespace = Some(ns.to_string());
    obj
}

pub async fn fetch<K>(
    store: &dyn ObjectStore<K>,
    ns: &str,
    name: &str,
) -> Result<Fetched<K>, ReconcileErr>
where
    K: Resource<DynamicType = ()>,
{
    let found = store
        .get(ns, name)
        .await
        .map_err(store_err(&K::kind(&()), ns, name))?;
    Ok(match found {
        Some(obj) => Fetched::Found(obj),
        None => Fetched::Absent,
    })
}

/// Create the object if absent, replace it if `desire` changes it, otherwise
/// leave it alone. A write conflict triggers exactly one re-fetch and retry.
#[instrument(skip_all, fields(kind = %K::kind(&()), ns = %ns, name = %name))]
pub async fn create_or_update<K, F>(
    store: &dyn ObjectStore<K>,
    ns: &str,
    name: &str,
    desire: F,
) -> Result<OperationResult, ReconcileErr>
where
    K: Resource<DynamicType = ()> + Default + Clone + PartialEq,
    F: Fn(K) -> Result<K, ReconcileErr>,
{
    let kind = K::kind(&()).to_string();
    let mut retried = false;
    loop {
        let attempt = match fetch(store, ns, name).await? {
            Fetched::Absent => {
                let desired = desire(empty(ns, name))?;
                store
                    .create(&desired)
                    .await
                    .map(|_| OperationResult::Created)
            }
            Fetched::Found(current) => {
                let desired = desire(current.clone())?;
                if desired == current {
                    return Ok(OperationResult::Unchanged);
                }
                store
                    .replace(&desired)
                    .await
                    .map(|_| OperationResult::Updated)
            }
        };
        match attempt {
            Ok(result) => return Ok(result),
            Err(e) if e.is_conflict() && !retried => {
                warn!(%ns, %name, %kind, error = %e, "CreateOrUpdate: conflict; re-fetching once");
                retried = true;
            }
            Err(e) => return Err(store_err(&kind, ns, name)(e)),
        }
    }
}
