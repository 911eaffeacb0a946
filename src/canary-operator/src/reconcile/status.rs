use std::collections::HashMap;

use tracing::debug;
use tracing::info;
use tracing::warn;

use k8_metadata_client::ListArg;
use k8_metadata_client::MetadataClient;
use k8_types::{K8Obj, Spec, Status};

use crate::api::ChildCount;
use crate::api::Condition;
use crate::api::Reasons;
use crate::ReconcileError;

/// Status carrying a child count and an append-only condition list
pub trait CountedStatus: Status {
    fn child_count(&self) -> ChildCount;

    fn record(&mut self, count: ChildCount, condition: Condition);
}

/// Recount children selected by `selector` and append a condition,
/// unless status already shows a converged non empty parent.
pub async fn sync_status<P, Child, C>(
    client: &C,
    parent: &mut K8Obj<P>,
    selector: &HashMap<String, String>,
    total: usize,
    reasons: &Reasons,
) -> Result<(), ReconcileError>
where
    P: Spec,
    P::Status: CountedStatus,
    Child: Spec,
    C: MetadataClient,
{
    if parent.status.child_count().is_settled() {
        debug!(parent = %parent.metadata, "status settled");
        return Ok(());
    }

    let children = client
        .retrieve_items_with_option::<Child, _>(
            parent.metadata.namespace(),
            Some(ListArg::match_labels(selector)),
        )
        .await
        .map_err(ReconcileError::client)?;

    let count = ChildCount::new(children.items.len(), total);
    if count.is_over() {
        warn!(
            parent = %parent.metadata,
            available = count.available,
            total = count.total,
            "more {} than declared",
            Child::label()
        );
    }

    let mut status = parent.status.clone();
    status.record(count, count.condition(reasons));
    let updated = client
        .update_status(&parent.as_status_update(status))
        .await
        .map_err(ReconcileError::client)?;
    info!(
        parent = %parent.metadata,
        available = count.available,
        total = count.total,
        "status updated"
    );

    parent.status = updated.status;
    parent.metadata.resource_version = updated.metadata.resource_version;
    Ok(())
}
