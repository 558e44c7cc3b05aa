//! Trigger registration: which watch events map to which MyApp key.
//!
//! Three sources feed the same queue:
//! - MyApp itself, keyed by its own identity;
//! - Deployments controlled by a MyApp, keyed by that owner;
//! - Services controlled by a MyApp, keyed by that owner.
//!
//! Edits made directly to a child therefore re-run the owner's reconcile.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    Api, Client, Resource, ResourceExt,
    runtime::{Controller, reflector::ObjectRef, watcher::Config},
};
use serde::de::DeserializeOwned;

use super::owner::group_of;
use crate::crd::my_app::MyApp;

pub fn parent_key(app: &MyApp) -> ObjectRef<MyApp> {
    ObjectRef::from_obj(app)
}

/// Key of the MyApp controlling `child`, if any.
pub fn owner_key<K: Resource>(child: &K) -> Option<ObjectRef<MyApp>> {
    let group = MyApp::group(&());
    let kind = MyApp::kind(&());
    let oref = child.owner_references().iter().find(|r| {
        r.controller == Some(true)
            && r.kind == kind.as_ref()
            && group_of(&r.api_version) == group.as_ref()
    })?;
    let key = ObjectRef::new(&oref.name);
    Some(match child.namespace() {
        Some(ns) => key.within(&ns),
        None => key,
    })
}

fn scoped<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + DeserializeOwned,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Attach the child watches to a MyApp controller.
pub fn register(
    controller: Controller<MyApp>,
    client: Client,
    namespace: Option<&str>,
) -> Controller<MyApp> {
    let deployments: Api<Deployment> = scoped(client.clone(), namespace);
    let services: Api<Service> = scoped(client, namespace);
    controller
        .watches(deployments, Config::default(), |d: Deployment| owner_key(&d))
        .watches(services, Config::default(), |s: Service| owner_key(&s))
}
