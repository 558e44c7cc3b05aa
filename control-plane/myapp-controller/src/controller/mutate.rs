//! Desired-state mutators.
//!
//! Each mutator takes the parent spec and the prior child value (or an empty
//! baseline) and returns the child with only the fields this controller owns
//! brought in line. Everything else on the baseline is carried through as-is.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::my_app::MyAppSpec;

pub const APP_LABEL: &str = "app";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "myapp-controller";
pub const HTTP_PORT_NAME: &str = "http";

pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), name.to_string())])
}

fn merge_labels(target: &mut Option<BTreeMap<String, String>>, name: &str) {
    let labels = target.get_or_insert_with(BTreeMap::new);
    labels.insert(APP_LABEL.to_string(), name.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
}

fn render_env(spec: &MyAppSpec) -> Option<Vec<EnvVar>> {
    let env = spec.env.as_ref().filter(|e| !e.is_empty())?;
    Some(
        env.iter()
            .map(|(k, v)| EnvVar {
                name: k.clone(),
                value: Some(v.clone()),
                ..Default::default()
            })
            .collect(),
    )
}

fn name_of(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

/// Bring the Deployment's owned fields in line with `spec`.
///
/// The selector is only written while empty; the API server rejects
/// selector changes on an existing Deployment.
pub fn mutate_deployment(spec: &MyAppSpec, mut deploy: Deployment) -> Deployment {
    let name = name_of(&deploy.metadata);
    merge_labels(&mut deploy.metadata.labels, &name);

    let ds = deploy.spec.get_or_insert_with(DeploymentSpec::default);
    ds.replicas = Some(spec.replicas);
    if ds
        .selector
        .match_labels
        .as_ref()
        .map(|m| m.is_empty())
        .unwrap_or(true)
        && ds.selector.match_expressions.is_none()
    {
        ds.selector.match_labels = Some(selector_labels(&name));
    }

    let tmpl_meta = ds.template.metadata.get_or_insert_with(ObjectMeta::default);
    merge_labels(&mut tmpl_meta.labels, &name);

    let pod = ds.template.spec.get_or_insert_with(PodSpec::default);
    let idx = match pod.containers.iter().position(|c| c.name == name) {
        Some(i) => i,
        None => {
            pod.containers.push(Container {
                name: name.clone(),
                ..Default::default()
            });
            pod.containers.len() - 1
        }
    };
    let container = &mut pod.containers[idx];
    container.image = Some(spec.image.clone());
    container.env = render_env(spec);

    let ports = container.ports.get_or_insert_with(Vec::new);
    match ports
        .iter_mut()
        .find(|p| p.name.as_deref() == Some(HTTP_PORT_NAME))
    {
        Some(p) => p.container_port = spec.target_port(),
        None => ports.push(ContainerPort {
            name: Some(HTTP_PORT_NAME.to_string()),
            container_port: spec.target_port(),
            ..Default::default()
        }),
    }

    deploy
}

/// Whether every `matchLabels` entry of the selector is carried by the pod
/// template. The API server rejects a Deployment where this does not hold.
pub fn selector_matches_template(deploy: &Deployment) -> bool {
    let Some(ds) = deploy.spec.as_ref() else {
        return true;
    };
    let Some(selector) = ds.selector.match_labels.as_ref() else {
        return true;
    };
    let template = ds
        .template
        .metadata
        .as_ref()
        .and_then(|m| m.labels.as_ref());
    selector
        .iter()
        .all(|(k, v)| template.and_then(|t| t.get(k)) == Some(v))
}

/// Bring the Service's owned fields in line with `spec`. Platform-assigned
/// fields such as `clusterIP` and `nodePort` survive untouched.
pub fn mutate_service(spec: &MyAppSpec, mut svc: Service) -> Service {
    let name = name_of(&svc.metadata);
    merge_labels(&mut svc.metadata.labels, &name);

    let ss = svc.spec.get_or_insert_with(ServiceSpec::default);
    ss.selector = Some(selector_labels(&name));

    let ports = ss.ports.get_or_insert_with(Vec::new);
    let target = IntOrString::Int(spec.target_port());
    let http = match ports
        .iter()
        .position(|p| p.name.as_deref() == Some(HTTP_PORT_NAME))
    {
        Some(i) => Some(i),
        // A lone unnamed port is taken over; a second port would need both
        // to be named.
        None if ports.len() == 1 && ports[0].name.is_none() => Some(0),
        None => None,
    };
    match http {
        Some(i) => {
            let p = &mut ports[i];
            p.name = Some(HTTP_PORT_NAME.to_string());
            p.port = spec.port;
            p.target_port = Some(target);
        }
        None => ports.push(ServicePort {
            name: Some(HTTP_PORT_NAME.to_string()),
            port: spec.port,
            target_port: Some(target),
            ..Default::default()
        }),
    }

    svc
}
