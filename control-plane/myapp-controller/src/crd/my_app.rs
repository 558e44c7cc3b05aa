use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    group = "app.shimo.im",
    version = "v1beta1",
    kind = "MyApp",
    plural = "myapps",
    namespaced,
    status = "MyAppStatus",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MyAppSpec {
    /// Desired replica count of the workload
    pub replicas: i32,
    /// OCI image for the app container
    pub image: String,
    /// Port exposed by the Service
    pub port: i32,
    /// Container port the Service targets; defaults to `port`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_port: Option<i32>,
    /// Plain environment variables for the app container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

impl MyAppSpec {
    pub fn target_port(&self) -> i32 {
        self.container_port.unwrap_or(self.port)
    }
}

/// Reserved for higher-level tooling; the reconciler does not write it.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MyAppStatus {
    pub observed_generation: Option<i64>,
}
