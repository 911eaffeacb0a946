#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use k8_metadata_client::InMemoryClient;
use k8_metadata_client::MetadataClient;
use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::pod::ContainerSpec;
use k8_types::core::pod::PodSpec;
use k8_types::core::service::ServicePort;
use k8_types::core::service::ServiceSpec;
use k8_types::networking::ingress::HTTPIngressPath;
use k8_types::networking::ingress::HTTPIngressRuleValue;
use k8_types::networking::ingress::IngressBackend;
use k8_types::networking::ingress::IngressRule;
use k8_types::networking::ingress::IngressSpec;
use k8_types::{K8Obj, LabelSelector, ObjectMeta, Spec, TemplateMeta, TemplateSpec};

use canary_operator::api::ApplicationSpec;
use canary_operator::api::Canary;
use canary_operator::api::DeployVersion;
use canary_operator::api::IngressLoadBalance;
use canary_operator::api::LoadBalance;
use canary_operator::api::MicroServiceSpec;
use canary_operator::api::ServiceLoadBalance;
use canary_operator::reconcile::ObjectKey;
use canary_operator::reconcile::ReconcileRequest;
use canary_operator::ControllerRegistry;
use canary_operator::OperatorConfig;
use canary_operator::ReconcileError;

pub const NS: &str = "canary";

pub fn new_client() -> Arc<InMemoryClient> {
    Arc::new(InMemoryClient::new())
}

pub fn new_registry(client: &Arc<InMemoryClient>) -> ControllerRegistry {
    ControllerRegistry::from_config(OperatorConfig::default(), client.clone()).expect("registry")
}

/// deployment template selecting `app=web,version=<version>` pods
pub fn web_template(version: &str) -> DeploymentSpec {
    let mut labels = HashMap::new();
    labels.insert("app".to_owned(), "web".to_owned());
    labels.insert("version".to_owned(), version.to_owned());

    DeploymentSpec {
        replicas: Some(1),
        selector: LabelSelector {
            match_labels: labels.clone(),
        },
        template: TemplateSpec {
            metadata: Some(TemplateMeta {
                labels,
                ..Default::default()
            }),
            spec: PodSpec {
                containers: vec![ContainerSpec::new("web", &*format!("shop/web:{}", version))],
                ..Default::default()
            },
        },
        ..Default::default()
    }
}

pub fn version(name: &str) -> DeployVersion {
    DeployVersion::new(name, web_template(name))
}

pub fn canary_version(name: &str, canary: Canary) -> DeployVersion {
    let mut version = version(name);
    version.canary = Some(canary);
    version
}

pub fn service_lb(name: &str) -> ServiceLoadBalance {
    ServiceLoadBalance {
        name: name.to_owned(),
        spec: ServiceSpec {
            ports: vec![ServicePort {
                name: Some("http".to_owned()),
                port: 80,
                target_port: Some(8080.into()),
                ..Default::default()
            }],
            ..Default::default()
        },
    }
}

/// ingress with one http rule whose backend is `service`
pub fn ingress_lb(name: &str, service: &str) -> IngressLoadBalance {
    IngressLoadBalance {
        name: name.to_owned(),
        spec: IngressSpec {
            rules: vec![IngressRule {
                host: Some("shop.example.com".to_owned()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_owned()),
                        backend: IngressBackend::new(service, 80),
                        ..Default::default()
                    }],
                }),
            }],
            ..Default::default()
        },
    }
}

/// v1 stable, v2 canary with weight 10, service and ingress load balancing
pub fn canary_micro_service() -> MicroServiceSpec {
    MicroServiceSpec {
        versions: vec![version("v1"), canary_version("v2", Canary::weighted(10))],
        current_version_name: Some("v1".to_owned()),
        load_balance: Some(LoadBalance {
            service: Some(service_lb("shop-web-svc")),
            ingress: Some(ingress_lb("shop-web-ing", "shop-web-svc")),
        }),
    }
}

pub fn insert<S: Spec>(client: &InMemoryClient, name: &str, spec: S) -> K8Obj<S> {
    let mut obj = K8Obj::new(name, spec);
    obj.metadata.namespace = NS.to_owned();
    client.insert_item(obj).expect("insert")
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NS, name)
}

pub async fn reconcile_app(registry: &ControllerRegistry, name: &str) -> Result<(), ReconcileError> {
    registry
        .dispatch(&ReconcileRequest::new(ApplicationSpec::kind(), key(name)))
        .await
}

pub async fn reconcile_ms(registry: &ControllerRegistry, name: &str) -> Result<(), ReconcileError> {
    registry
        .dispatch(&ReconcileRequest::new(MicroServiceSpec::kind(), key(name)))
        .await
}

/// one pass over every App, then every MicroService in the namespace
pub async fn reconcile_all(client: &InMemoryClient, registry: &ControllerRegistry) -> Result<(), ReconcileError> {
    let apps = client
        .retrieve_items::<ApplicationSpec, _>(NS)
        .await
        .expect("apps");
    for app in apps.items {
        reconcile_app(registry, &app.metadata.name).await?;
    }
    let micro_services = client
        .retrieve_items::<MicroServiceSpec, _>(NS)
        .await
        .expect("micro services");
    for ms in micro_services.items {
        reconcile_ms(registry, &ms.metadata.name).await?;
    }
    Ok(())
}

/// enough passes for status and children to settle
pub async fn settle(client: &InMemoryClient, registry: &ControllerRegistry) -> Result<(), ReconcileError> {
    for _ in 0..4 {
        reconcile_all(client, registry).await?;
    }
    Ok(())
}

pub async fn names<S: Spec>(client: &InMemoryClient) -> Vec<String> {
    client
        .retrieve_items::<S, _>(NS)
        .await
        .expect("list")
        .items
        .into_iter()
        .map(|item| item.metadata.name)
        .collect()
}

pub async fn get<S: Spec>(client: &InMemoryClient, name: &str) -> K8Obj<S> {
    client
        .retrieve_item::<S, _>(&ObjectMeta::new(name, NS))
        .await
        .expect("item")
}
