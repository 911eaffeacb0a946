mod common;

use std::time::Duration;

use fluvio_future::test_async;

use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::service::ServiceSpec;
use k8_types::networking::ingress::IngressSpec;
use k8_types::{K8Obj, K8Watch, ObjectMeta, Spec};

use canary_operator::api::ApplicationSpec;
use canary_operator::api::MicroServiceSpec;
use canary_operator::config::ControllersConfig;
use canary_operator::config::CONFIG_ENV;
use canary_operator::config::RequeueConfig;
use canary_operator::reconcile::ObjectKey;
use canary_operator::reconcile::ReconcileRequest;
use canary_operator::ConfigError;
use canary_operator::ControllerRegistry;
use canary_operator::OperatorConfig;
use canary_operator::ReconcileError;

use common::*;

fn owned_by<P: Spec, S: Spec>(owner: &K8Obj<P>, name: &str) -> K8Obj<S> {
    let mut child = K8Obj::new(name, S::default());
    child.metadata.namespace = NS.to_owned();
    child.metadata.owner_references = vec![owner.metadata.make_owner_reference::<P>()];
    child
}

fn parent<S: Spec>(name: &str, uid: &str) -> K8Obj<S> {
    let mut obj = K8Obj::new(name, S::default());
    obj.metadata = ObjectMeta::new(name, NS);
    obj.metadata.uid = uid.to_owned();
    obj
}

#[test]
fn test_route_child_to_owner() {
    let client = new_client();
    let registry = new_registry(&client);
    assert_eq!(registry.kinds(), vec!["App", "MicroService"]);

    let ms = parent::<MicroServiceSpec>("shop-web", "ms-uid");
    let deployment: K8Obj<DeploymentSpec> = owned_by(&ms, "shop-web-v1");
    let requests = registry.requests_for(&K8Watch::MODIFIED(deployment));
    assert_eq!(
        requests,
        vec![ReconcileRequest::new("MicroService", ObjectKey::new(NS, "shop-web"))]
    );

    let ingress: K8Obj<IngressSpec> = owned_by(&ms, "shop-web-ing");
    assert_eq!(registry.requests_for(&K8Watch::DELETED(ingress)).len(), 1);
}

#[test]
fn test_route_micro_service_to_self_and_app() {
    let client = new_client();
    let registry = new_registry(&client);

    let app = parent::<ApplicationSpec>("shop", "app-uid");
    let ms: K8Obj<MicroServiceSpec> = owned_by(&app, "shop-web");
    let requests = registry.requests_for(&K8Watch::ADDED(ms));
    assert_eq!(
        requests,
        vec![
            ReconcileRequest::new("MicroService", ObjectKey::new(NS, "shop-web")),
            ReconcileRequest::new("App", ObjectKey::new(NS, "shop")),
        ]
    );
}

#[test]
fn test_route_ignores_unowned_children() {
    let client = new_client();
    let registry = new_registry(&client);

    let mut service = K8Obj::new("loose", ServiceSpec::default());
    service.metadata.namespace = NS.to_owned();
    assert!(registry.requests_for(&K8Watch::ADDED(service)).is_empty());

    // app does not own deployments
    let app = parent::<ApplicationSpec>("shop", "app-uid");
    let deployment: K8Obj<DeploymentSpec> = owned_by(&app, "shop-v1");
    assert!(registry.requests_for(&K8Watch::ADDED(deployment)).is_empty());

    // owner reference without controller flag
    let ms = parent::<MicroServiceSpec>("shop-web", "ms-uid");
    let mut ingress: K8Obj<IngressSpec> = owned_by(&ms, "shop-web-ing");
    ingress.metadata.owner_references[0].controller = None;
    assert!(registry.requests_for(&K8Watch::ADDED(ingress)).is_empty());
}

#[test]
fn test_disabled_controller() {
    let client = new_client();
    let config = OperatorConfig {
        controllers: ControllersConfig {
            app: false,
            micro_service: true,
        },
        ..Default::default()
    };
    let registry = ControllerRegistry::from_config(config, client).expect("registry");
    assert_eq!(registry.kinds(), vec!["MicroService"]);

    let app = parent::<ApplicationSpec>("shop", "app-uid");
    let ms: K8Obj<MicroServiceSpec> = owned_by(&app, "shop-web");
    let requests = registry.requests_for(&K8Watch::ADDED(ms));
    assert_eq!(
        requests,
        vec![ReconcileRequest::new("MicroService", ObjectKey::new(NS, "shop-web"))]
    );
}

#[test]
fn test_invalid_config_rejected() {
    let client = new_client();
    let config = OperatorConfig {
        requeue: RequeueConfig {
            base_delay_ms: 0,
            max_delay_ms: 1000,
        },
        ..Default::default()
    };
    let err = ControllerRegistry::from_config(config, client)
        .err()
        .expect("zero base delay");
    assert!(matches!(err, ConfigError::InvalidRequeue { base_ms: 0, max_ms: 1000 }));
}

#[test]
fn test_from_env_defaults() {
    std::env::remove_var(CONFIG_ENV);
    let registry = ControllerRegistry::from_env(new_client()).expect("registry");
    assert_eq!(registry.kinds(), vec!["App", "MicroService"]);
    assert_eq!(registry.config(), &OperatorConfig::default());
}

#[test]
fn test_requeue_after() {
    let client = new_client();
    let config = OperatorConfig {
        requeue: RequeueConfig {
            base_delay_ms: 100,
            max_delay_ms: 1000,
        },
        ..Default::default()
    };
    let registry = ControllerRegistry::from_config(config, client).expect("registry");
    assert_eq!(registry.requeue_after(1), Duration::from_millis(100));
    assert_eq!(registry.requeue_after(3), Duration::from_millis(400));
    assert_eq!(registry.requeue_after(10), Duration::from_millis(1000));
}

#[test_async]
async fn test_dispatch_unknown_kind() -> Result<(), ReconcileError> {
    let client = new_client();
    let registry = new_registry(&client);
    let err = registry
        .dispatch(&ReconcileRequest::new("Deployment", key("shop-web-v1")))
        .await
        .expect_err("unknown");
    assert!(matches!(err, ReconcileError::UnknownKind(kind) if kind == "Deployment"));
    Ok(())
}

#[test_async]
async fn test_dispatch_missing_parent() -> Result<(), ReconcileError> {
    let client = new_client();
    let registry = new_registry(&client);
    reconcile_app(&registry, "gone").await?;
    reconcile_ms(&registry, "gone").await?;
    assert_eq!(client.write_count(), 0);
    Ok(())
}

#[test_async]
async fn test_unwatched_namespace_skipped() -> Result<(), ReconcileError> {
    let client = new_client();
    let config = OperatorConfig {
        watch_namespace: Some("elsewhere".to_owned()),
        ..Default::default()
    };
    let registry = ControllerRegistry::from_config(config, client.clone()).expect("registry");
    insert(&client, "shop-web", canary_micro_service());

    reconcile_ms(&registry, "shop-web").await?;
    assert_eq!(client.write_count(), 0);
    assert!(names::<DeploymentSpec>(&client).await.is_empty());

    // unknown kinds in unwatched namespaces are ignored too
    registry
        .dispatch(&ReconcileRequest::new("Deployment", key("shop-web-v1")))
        .await?;
    Ok(())
}
