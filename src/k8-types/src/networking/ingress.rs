use serde::Deserialize;
use serde::Serialize;

use crate::Crd;
use crate::CrdNames;
use crate::DefaultHeader;
use crate::IntOrString;
use crate::Spec;
use crate::Status;

const INGRESS_API: Crd = Crd {
    group: "networking.k8s.io",
    version: "v1beta1",
    names: CrdNames {
        kind: "Ingress",
        plural: "ingresses",
        singular: "ingress",
    },
};

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<IngressBackend>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTLS>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,
}

impl Spec for IngressSpec {
    type Status = IngressStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &INGRESS_API
    }
}

impl IngressSpec {
    /// iterate mutably over every backend reachable through http rules
    pub fn http_backends_mut(&mut self) -> impl Iterator<Item = &mut IngressBackend> {
        self.rules
            .iter_mut()
            .filter_map(|rule| rule.http.as_mut())
            .flat_map(|http| http.paths.iter_mut())
            .map(|path| &mut path.backend)
    }
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    pub service_name: String,
    pub service_port: IntOrString,
}

impl IngressBackend {
    pub fn new<T: Into<String>, P: Into<IntOrString>>(service_name: T, service_port: P) -> Self {
        Self {
            service_name: service_name.into(),
            service_port: service_port.into(),
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressTLS {
    pub hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HTTPIngressRuleValue>,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct HTTPIngressRuleValue {
    pub paths: Vec<HTTPIngressPath>,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HTTPIngressPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_type: Option<String>,
    pub backend: IngressBackend,
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressStatus {
    pub load_balancer: crate::core::service::LoadBalancerStatus,
}

impl Status for IngressStatus {}
