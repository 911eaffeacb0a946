use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as DynamicObject;

use crate::Env;

/// Pod spec as embedded in workload templates.
///
/// Only the fields the operator reads or builds in tests are typed; anything
/// else a user puts into a template is kept in `extra` and written back
/// untouched, so copying a template never drops fields.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<PodRestartPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<HashMap<String, String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, DynamicObject>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum PodRestartPolicy {
    Always,
    Never,
    OnFailure,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<ImagePullPolicy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPortSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<Env>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, DynamicObject>,
}

impl ContainerSpec {
    pub fn new<T: Into<String>>(name: T, image: T) -> Self {
        Self {
            name: name.into(),
            image: Some(image.into()),
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ImagePullPolicy {
    Always,
    Never,
    IfNotPresent,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceRequirements {
    pub limits: DynamicObject,
    pub requests: DynamicObject,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPortSpec {
    pub container_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    pub name: String,
    #[serde(flatten)]
    pub source: BTreeMap<String, DynamicObject>,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub mount_path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use super::PodSpec;

    #[test]
    fn test_untyped_fields_survive() {
        let raw = json!({
            "containers": [{
                "name": "web",
                "image": "nginx:1.17",
                "livenessProbe": { "httpGet": { "path": "/healthz", "port": 80 } }
            }],
            "dnsPolicy": "ClusterFirst"
        });

        let pod: PodSpec = serde_json::from_value(raw.clone()).expect("pod spec");
        assert_eq!(pod.containers[0].image.as_deref(), Some("nginx:1.17"));
        assert!(pod.extra.contains_key("dnsPolicy"));
        assert!(pod.containers[0].extra.contains_key("livenessProbe"));

        assert_eq!(serde_json::to_value(&pod).expect("json"), raw);
    }
}
