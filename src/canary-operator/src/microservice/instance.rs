use std::collections::HashMap;
use std::collections::HashSet;

use tracing::debug;

use k8_metadata_client::MetadataClient;
use k8_types::app::deployment::DeploymentSpec;
use k8_types::K8Obj;

use crate::api::MicroServiceSpec;
use crate::api::SERVICE_LABEL;
use crate::api::VERSION_LABEL;
use crate::reconcile::child_labels;
use crate::reconcile::owned_child;
use crate::reconcile::sweep_orphans;
use crate::reconcile::upsert_spec;
use crate::ReconcileError;

/// `<ms>-<version>`
pub fn deployment_name(ms_name: &str, version_name: &str) -> String {
    format!("{}-{}", ms_name, version_name)
}

/// one deployment per version, orphans removed
pub async fn reconcile_instances<C>(
    client: &C,
    ms: &K8Obj<MicroServiceSpec>,
) -> Result<(), ReconcileError>
where
    C: MetadataClient,
{
    let ms_name = ms.metadata.name.as_str();
    let mut keep = HashSet::new();

    for version in &ms.spec.versions {
        let name = deployment_name(ms_name, &version.name);
        let labels = child_labels(
            &ms.metadata.labels,
            &[(SERVICE_LABEL, ms_name), (VERSION_LABEL, version.name.as_str())],
        );
        let deployment = owned_child::<MicroServiceSpec, DeploymentSpec>(
            &ms.metadata,
            name.clone(),
            labels,
            version.template.clone(),
        );
        upsert_spec(client, deployment).await?;
        keep.insert(name);
    }

    let mut selector = HashMap::new();
    selector.insert(SERVICE_LABEL.to_owned(), ms_name.to_owned());
    let deleted =
        sweep_orphans::<DeploymentSpec, _>(client, ms.metadata.namespace(), &selector, &keep).await?;
    debug!(ms = %ms.metadata, deployments = keep.len(), deleted, "instances reconciled");
    Ok(())
}
