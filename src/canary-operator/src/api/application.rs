use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use k8_types::{Crd, CrdNames, DefaultHeader, Spec, Status};

use super::Condition;
use super::MicroServiceSpec;
use super::GROUP;
use super::V1;

const APP_API: Crd = Crd {
    group: GROUP,
    version: V1,
    names: CrdNames {
        kind: "App",
        plural: "apps",
        singular: "app",
    },
};

/// Bundle of MicroServices managed as a unit
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub micro_services: Vec<MicroServiceTemplate>,
}

impl Spec for ApplicationSpec {
    type Status = ApplicationStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &APP_API
    }
}

impl ApplicationSpec {
    /// first duplicated template name, if any
    pub fn duplicate_template(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.micro_services
            .iter()
            .map(|template| template.name.as_str())
            .find(|name| !seen.insert(*name))
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MicroServiceTemplate {
    pub name: String,
    #[serde(default)]
    pub spec: MicroServiceSpec,
}

impl MicroServiceTemplate {
    pub fn new<N: Into<String>>(name: N, spec: MicroServiceSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// `<app>-<template>`
    pub fn child_name(&self, app_name: &str) -> String {
        format!("{}-{}", app_name, self.name)
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationStatus {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    pub available_micro_services: i32,
    pub total_micro_services: i32,
}

impl Status for ApplicationStatus {}

#[cfg(test)]
mod test {

    use k8_types::Spec;

    use super::ApplicationSpec;
    use super::ApplicationStatus;
    use super::MicroServiceTemplate;

    #[test]
    fn test_app_kind() {
        assert_eq!(ApplicationSpec::api_version(), "app.o0w0o.cn/v1");
        assert_eq!(ApplicationSpec::kind(), "App");
    }

    #[test]
    fn test_status_field_names() {
        let status = ApplicationStatus {
            available_micro_services: 1,
            total_micro_services: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).expect("json");
        assert_eq!(json["availableMicroServices"], 1);
        assert_eq!(json["totalMicroServices"], 2);
    }

    #[test]
    fn test_duplicate_template() {
        let mut spec = ApplicationSpec {
            micro_services: vec![
                MicroServiceTemplate::new("web", Default::default()),
                MicroServiceTemplate::new("api", Default::default()),
            ],
        };
        assert!(spec.duplicate_template().is_none());
        assert_eq!(spec.micro_services[1].child_name("shop"), "shop-api");

        spec.micro_services
            .push(MicroServiceTemplate::new("web", Default::default()));
        assert_eq!(spec.duplicate_template(), Some("web"));
    }
}
