use std::collections::HashMap;
use std::collections::HashSet;

use tracing::debug;
use tracing::info;

use k8_metadata_client::MetadataClient;
use k8_types::core::service::ServiceSpec;
use k8_types::networking::ingress::IngressSpec;
use k8_types::K8Obj;

use crate::api::MicroServiceSpec;
use crate::api::SERVICE_LABEL;
use crate::reconcile::child_labels;
use crate::reconcile::owned_child;
use crate::reconcile::sweep_orphans;
use crate::reconcile::upsert_spec;
use crate::reconcile::upsert_spec_and_annotations;
use crate::ReconcileError;

use super::canary::make_canary_ingress;

/// Services and ingresses of a MicroService kept by one pass
#[derive(Debug, Default)]
struct KeepSet {
    services: HashSet<String>,
    ingresses: HashSet<String>,
}

/// Primary service and ingress, per-version services and canary ingresses.
/// Generated per-version service and canary ingress names are stored on `ms.spec`.
pub async fn reconcile_load_balance<C>(
    client: &C,
    ms: &mut K8Obj<MicroServiceSpec>,
) -> Result<(), ReconcileError>
where
    C: MetadataClient,
{
    let mut keep = KeepSet::default();
    let owner = ms.metadata.clone();
    let ms_name = owner.name.as_str();
    let labels = child_labels(&owner.labels, &[(SERVICE_LABEL, ms_name)]);

    let service_lb = ms.spec.service_lb().cloned();
    let ingress_lb = ms.spec.ingress_lb().cloned();

    if ms.spec.load_balance.is_none() || ms.spec.versions.is_empty() {
        info!(ms = %owner, "no load balance or no versions, clearing load balancers");
        return clear_up(client, &owner.namespace, ms_name, &keep).await;
    }
    let current_selector = match current_selector(&ms.spec) {
        Some(selector) => selector,
        None => return clear_up(client, &owner.namespace, ms_name, &keep).await,
    };

    if let Some(lb) = &service_lb {
        let mut spec = lb.spec.clone();
        spec.selector = Some(current_selector);
        let service = owned_child::<MicroServiceSpec, ServiceSpec>(&owner, lb.name.clone(), labels.clone(), spec);
        upsert_spec(client, service).await?;
        keep.services.insert(lb.name.clone());
    }

    if let Some(lb) = &ingress_lb {
        let ingress = owned_child::<MicroServiceSpec, IngressSpec>(&owner, lb.name.clone(), labels.clone(), lb.spec.clone());
        upsert_spec_and_annotations(client, ingress).await?;
        keep.ingresses.insert(lb.name.clone());
    }

    if let Some(lb) = &service_lb {
        for version in ms.spec.versions.iter_mut() {
            let name = version.service_name_or_default(ms_name);
            let mut spec = lb.spec.clone();
            spec.selector = Some(version.pod_selector().clone());
            debug!(version = %version.name, service = %name, "version service");
            let service = owned_child::<MicroServiceSpec, ServiceSpec>(&owner, name.clone(), labels.clone(), spec);
            upsert_spec(client, service).await?;
            version.service_name = Some(name.clone());
            keep.services.insert(name);
        }
    }

    if let Some(lb) = &ingress_lb {
        let primary_service = service_lb.as_ref().map(|service| service.name.as_str());
        for version in ms.spec.versions.iter_mut() {
            let canary = match make_canary_ingress(ms_name, &lb.spec, primary_service, version) {
                Some(canary) => canary,
                None => continue,
            };
            debug!(version = %version.name, ingress = %canary.name, "canary ingress");
            let mut ingress = owned_child::<MicroServiceSpec, IngressSpec>(
                &owner,
                canary.name.clone(),
                labels.clone(),
                canary.spec,
            );
            ingress.metadata.annotations = canary.annotations;
            upsert_spec_and_annotations(client, ingress).await?;
            keep.ingresses.insert(canary.name);
        }
    }

    clear_up(client, &owner.namespace, ms_name, &keep).await
}

/// pod selector of `currentVersionName`, first version when not found
fn current_selector(spec: &MicroServiceSpec) -> Option<HashMap<String, String>> {
    if let Some(current) = spec.named_current_version() {
        return Some(current.pod_selector().clone());
    }
    let first = spec.versions.first()?;
    info!(
        version = %first.name,
        declared = ?spec.current_version_name,
        "current version not set or not found, using first version"
    );
    Some(first.pod_selector().clone())
}

async fn clear_up<C>(client: &C, namespace: &str, ms_name: &str, keep: &KeepSet) -> Result<(), ReconcileError>
where
    C: MetadataClient,
{
    let mut selector = HashMap::new();
    selector.insert(SERVICE_LABEL.to_owned(), ms_name.to_owned());
    sweep_orphans::<ServiceSpec, _>(client, namespace, &selector, &keep.services).await?;
    sweep_orphans::<IngressSpec, _>(client, namespace, &selector, &keep.ingresses).await?;
    Ok(())
}
