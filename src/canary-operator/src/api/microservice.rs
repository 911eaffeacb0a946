use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::service::ServiceSpec;
use k8_types::networking::ingress::IngressSpec;
use k8_types::{Crd, CrdNames, DefaultHeader, Spec, Status};

use super::canary_annotations;
use super::Condition;
use super::GROUP;
use super::V1;

const MICRO_SERVICE_API: Crd = Crd {
    group: GROUP,
    version: V1,
    names: CrdNames {
        kind: "MicroService",
        plural: "microservices",
        singular: "microservice",
    },
};

/// Multi-version deployable unit with optional load balancing
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MicroServiceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balance: Option<LoadBalance>,
    pub versions: Vec<DeployVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version_name: Option<String>,
}

impl Spec for MicroServiceSpec {
    type Status = MicroServiceStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &MICRO_SERVICE_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployVersion {
    pub name: String,
    pub template: DeploymentSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary: Option<Canary>,
}

impl DeployVersion {
    pub fn new<N: Into<String>>(name: N, template: DeploymentSpec) -> Self {
        Self {
            name: name.into(),
            template,
            ..Default::default()
        }
    }

    /// labels selecting the pods of this version
    pub fn pod_selector(&self) -> &HashMap<String, String> {
        &self.template.selector.match_labels
    }

    /// declared service name or `<ms>-<version>`
    pub fn service_name_or_default(&self, ms_name: &str) -> String {
        match &self.service_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}-{}", ms_name, self.name),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Canary {
    /// percentage of traffic, 0 to 100
    pub weight: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub header: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub header_value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cookie: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary_ingress_name: Option<String>,
}

impl Canary {
    pub fn weighted(weight: i32) -> Self {
        Self {
            weight,
            ..Default::default()
        }
    }

    /// declared ingress name or `<ms>-<version>-canary`
    pub fn ingress_name_or_default(&self, ms_name: &str, version_name: &str) -> String {
        match &self.canary_ingress_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}-{}-canary", ms_name, version_name),
        }
    }

    /// routing rules for the nginx ingress controller
    pub fn annotations(&self) -> HashMap<String, String> {
        let mut annotations = HashMap::new();
        annotations.insert(canary_annotations::CANARY.to_owned(), "true".to_owned());
        annotations.insert(canary_annotations::WEIGHT.to_owned(), self.weight.to_string());
        if !self.header.is_empty() {
            annotations.insert(canary_annotations::BY_HEADER.to_owned(), self.header.clone());
            annotations.insert(
                canary_annotations::BY_HEADER_VALUE.to_owned(),
                self.header_value.clone(),
            );
        }
        if !self.cookie.is_empty() {
            annotations.insert(canary_annotations::BY_COOKIE.to_owned(), self.cookie.clone());
        }
        annotations
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceLoadBalance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressLoadBalance>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceLoadBalance {
    pub name: String,
    pub spec: ServiceSpec,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressLoadBalance {
    pub name: String,
    pub spec: IngressSpec,
}

impl MicroServiceSpec {
    /// version whose name is `currentVersionName`, if declared and present
    pub fn named_current_version(&self) -> Option<&DeployVersion> {
        let current = self.current_version_name.as_deref()?;
        self.versions.iter().find(|version| version.name == current)
    }

    pub fn service_lb(&self) -> Option<&ServiceLoadBalance> {
        self.load_balance.as_ref()?.service.as_ref()
    }

    pub fn ingress_lb(&self) -> Option<&IngressLoadBalance> {
        self.load_balance.as_ref()?.ingress.as_ref()
    }

    /// write generated per-version service and canary ingress names into the MicroService spec,
    /// the same names the MicroService controller generates and persists
    pub fn fill_default_names(&mut self, ms_name: &str) {
        let service_enabled = self.service_lb().is_some();
        let ingress_enabled = self.ingress_lb().is_some();
        for version in self.versions.iter_mut() {
            if service_enabled {
                version.service_name = Some(version.service_name_or_default(ms_name));
            }
            if ingress_enabled {
                let version_name = version.name.clone();
                if let Some(canary) = version.canary.as_mut() {
                    canary.canary_ingress_name =
                        Some(canary.ingress_name_or_default(ms_name, &version_name));
                }
            }
        }
    }

    /// first duplicated version name, if any
    pub fn duplicate_version(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.versions
            .iter()
            .map(|version| version.name.as_str())
            .find(|name| !seen.insert(*name))
    }

    /// first version whose canary weight is outside 0..=100
    pub fn invalid_canary_weight(&self) -> Option<(&str, i32)> {
        self.versions.iter().find_map(|version| {
            let weight = version.canary.as_ref()?.weight;
            if (0..=100).contains(&weight) {
                None
            } else {
                Some((version.name.as_str(), weight))
            }
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MicroServiceStatus {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    pub available_versions: i32,
    pub total_versions: i32,
}

impl Status for MicroServiceStatus {}

#[cfg(test)]
mod test {

    use super::Canary;
    use super::DeployVersion;
    use super::IngressLoadBalance;
    use super::LoadBalance;
    use super::MicroServiceSpec;
    use super::ServiceLoadBalance;
    use crate::api::canary_annotations;

    fn two_versions() -> MicroServiceSpec {
        let mut canary_version = DeployVersion::new("v2", Default::default());
        canary_version.canary = Some(Canary::weighted(10));
        MicroServiceSpec {
            versions: vec![DeployVersion::new("v1", Default::default()), canary_version],
            ..Default::default()
        }
    }

    #[test]
    fn test_current_version() {
        let mut spec = two_versions();
        assert!(spec.named_current_version().is_none());

        spec.current_version_name = Some("v2".to_owned());
        assert_eq!(spec.named_current_version().map(|v| v.name.as_str()), Some("v2"));

        spec.current_version_name = Some("v9".to_owned());
        assert!(spec.named_current_version().is_none());
    }

    #[test]
    fn test_header_canary_annotations() {
        let canary = Canary {
            weight: 0,
            header: "x-user".to_owned(),
            header_value: "beta".to_owned(),
            ..Default::default()
        };
        let annotations = canary.annotations();
        assert_eq!(annotations.len(), 4);
        assert_eq!(annotations[canary_annotations::WEIGHT], "0");
        assert_eq!(annotations[canary_annotations::BY_HEADER], "x-user");
        assert_eq!(annotations[canary_annotations::BY_HEADER_VALUE], "beta");
        assert!(!annotations.contains_key(canary_annotations::BY_COOKIE));
    }

    #[test]
    fn test_cookie_canary_annotations() {
        let canary = Canary {
            weight: 30,
            cookie: "beta_user".to_owned(),
            ..Default::default()
        };
        let annotations = canary.annotations();
        assert_eq!(annotations[canary_annotations::CANARY], "true");
        assert_eq!(annotations[canary_annotations::WEIGHT], "30");
        assert_eq!(annotations[canary_annotations::BY_COOKIE], "beta_user");
        assert!(!annotations.contains_key(canary_annotations::BY_HEADER));
    }

    #[test]
    fn test_fill_default_names() {
        let mut spec = two_versions();
        spec.fill_default_names("shop-web");
        assert!(spec.versions.iter().all(|v| v.service_name.is_none()));

        spec.load_balance = Some(LoadBalance {
            service: Some(ServiceLoadBalance {
                name: "shop-web-svc".to_owned(),
                ..Default::default()
            }),
            ingress: Some(IngressLoadBalance {
                name: "shop-web-ing".to_owned(),
                ..Default::default()
            }),
        });
        spec.versions[0].service_name = Some("web-stable".to_owned());
        spec.fill_default_names("shop-web");
        assert_eq!(spec.versions[0].service_name.as_deref(), Some("web-stable"));
        assert_eq!(spec.versions[1].service_name.as_deref(), Some("shop-web-v2"));
        assert_eq!(
            spec.versions[1]
                .canary
                .as_ref()
                .and_then(|c| c.canary_ingress_name.as_deref()),
            Some("shop-web-v2-canary")
        );
    }

    #[test]
    fn test_duplicate_version() {
        let mut spec = two_versions();
        assert!(spec.duplicate_version().is_none());
        spec.versions.push(DeployVersion::new("v1", Default::default()));
        assert_eq!(spec.duplicate_version(), Some("v1"));
    }

    #[test]
    fn test_canary_weight_bounds() {
        let mut spec = two_versions();
        let mut canary = DeployVersion::new("v3", Default::default());
        canary.canary = Some(Canary::weighted(100));
        spec.versions.push(canary);
        assert!(spec.invalid_canary_weight().is_none());

        spec.versions[2].canary = Some(Canary::weighted(150));
        assert_eq!(spec.invalid_canary_weight(), Some(("v3", 150)));
        spec.versions[2].canary = Some(Canary::weighted(-1));
        assert_eq!(spec.invalid_canary_weight(), Some(("v3", -1)));
    }

    #[test]
    fn test_spec_json_names() {
        let json = serde_json::json!({
            "currentVersionName": "v1",
            "versions": [
                {
                    "name": "v1",
                    "template": { "selector": { "matchLabels": { "version": "v1" } } },
                    "canary": { "weight": 10, "headerValue": "beta", "canaryIngressName": "c" }
                }
            ],
            "loadBalance": { "service": { "name": "svc" } }
        });
        let spec: MicroServiceSpec = serde_json::from_value(json).expect("spec");
        assert_eq!(spec.versions[0].pod_selector()["version"], "v1");
        let canary = spec.versions[0].canary.as_ref().expect("canary");
        assert_eq!(canary.header_value, "beta");
        assert_eq!(canary.canary_ingress_name.as_deref(), Some("c"));
        assert_eq!(spec.service_lb().map(|lb| lb.name.as_str()), Some("svc"));
        assert!(spec.ingress_lb().is_none());
    }
}
