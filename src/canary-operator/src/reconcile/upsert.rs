use std::collections::HashMap;
use std::collections::HashSet;

use tracing::debug;
use tracing::info;

use k8_metadata_client::DiffableK8Obj;
use k8_metadata_client::ListArg;
use k8_metadata_client::MetadataClient;
use k8_metadata_client::MetadataClientError;
use k8_types::{InputK8Obj, ObjectMeta, Spec};

use crate::ReconcileError;

/// child of `owner` named `name`, controlled by owner, carrying `labels`
pub fn owned_child<P, S>(
    owner: &ObjectMeta,
    name: String,
    labels: HashMap<String, String>,
    spec: S,
) -> InputK8Obj<S>
where
    P: Spec,
    S: Spec,
{
    let mut metadata = owner.make_child_input_metadata::<P>(name);
    metadata.labels = labels;
    InputK8Obj::new(spec, metadata)
}

/// parent labels plus the given ones
pub fn child_labels(parent: &HashMap<String, String>, extra: &[(&str, &str)]) -> HashMap<String, String> {
    let mut labels = parent.clone();
    for (key, value) in extra {
        labels.insert((*key).to_owned(), (*value).to_owned());
    }
    labels
}

/// create child, or replace its spec when it differs from desired.
/// fields the cluster owns are carried over first (see `Spec::make_same`)
pub async fn upsert_spec<S, C>(client: &C, desired: InputK8Obj<S>) -> Result<(), ReconcileError>
where
    S: Spec,
    C: MetadataClient,
{
    upsert(client, desired, false).await
}

/// same as `upsert_spec`, annotations are compared and replaced as well
pub async fn upsert_spec_and_annotations<S, C>(
    client: &C,
    desired: InputK8Obj<S>,
) -> Result<(), ReconcileError>
where
    S: Spec,
    C: MetadataClient,
{
    upsert(client, desired, true).await
}

async fn upsert<S, C>(
    client: &C,
    desired: InputK8Obj<S>,
    with_annotations: bool,
) -> Result<(), ReconcileError>
where
    S: Spec,
    C: MetadataClient,
{
    let found = match client.retrieve_item::<S, _>(&desired.metadata).await {
        Ok(found) => found,
        Err(err) if err.not_founded() => {
            let created = client.create_item(desired).await.map_err(ReconcileError::client)?;
            info!(kind = S::label(), item = %created.metadata, "created");
            return Ok(());
        }
        Err(err) => return Err(ReconcileError::client(err)),
    };

    let mut spec = desired.spec;
    spec.make_same(&found.spec);

    let mut current = DiffableK8Obj::new(&found.spec);
    let mut wanted = DiffableK8Obj::new(&spec);
    if with_annotations {
        current = current.with_annotations(&found.metadata.annotations);
        wanted = wanted.with_annotations(&desired.metadata.annotations);
    }
    if current.is_same_as::<ReconcileError>(&wanted)? {
        debug!(kind = S::label(), item = %found.metadata, "unchanged");
        return Ok(());
    }

    let mut update = found.as_update();
    update.spec = spec;
    if with_annotations {
        update.metadata.annotations = desired.metadata.annotations;
    }
    let replaced = client.replace_item(update).await.map_err(ReconcileError::client)?;
    info!(kind = S::label(), item = %replaced.metadata, "replaced");
    Ok(())
}

/// delete children selected by `selector` whose name is not in `keep`
pub async fn sweep_orphans<S, C>(
    client: &C,
    namespace: &str,
    selector: &HashMap<String, String>,
    keep: &HashSet<String>,
) -> Result<usize, ReconcileError>
where
    S: Spec,
    C: MetadataClient,
{
    let existing = client
        .retrieve_items_with_option::<S, _>(namespace, Some(ListArg::match_labels(selector)))
        .await
        .map_err(ReconcileError::client)?;

    let mut deleted = 0;
    for item in existing.items {
        if keep.contains(&item.metadata.name) {
            continue;
        }
        client
            .delete_item::<S, _>(&item.metadata)
            .await
            .map_err(ReconcileError::client)?;
        info!(kind = S::label(), item = %item.metadata, "deleted orphan");
        deleted += 1;
    }
    Ok(deleted)
}
