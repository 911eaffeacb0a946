//! MicroService controller: per-version deployments, services and
//! ingresses, with one canary ingress per canary version.

mod canary;
mod instance;
mod loadbalance;

pub use self::canary::*;
pub use self::instance::*;
pub use self::loadbalance::*;

use std::collections::HashMap;

use async_trait::async_trait;

use k8_metadata_client::MetadataClient;
use k8_metadata_client::SharedClient;
use k8_types::app::deployment::DeploymentSpec;
use k8_types::core::service::ServiceSpec;
use k8_types::networking::ingress::IngressSpec;
use k8_types::{K8Obj, Spec};

use crate::api::ChildCount;
use crate::api::Condition;
use crate::api::MicroServiceSpec;
use crate::api::MicroServiceStatus;
use crate::api::Reasons;
use crate::api::SERVICE_LABEL;
use crate::reconcile::sync_status;
use crate::reconcile::CountedStatus;
use crate::reconcile::ReconcileStep;
use crate::ReconcileError;

const VERSION_REASONS: Reasons = Reasons {
    converged: "All deploy have updated.",
    too_many: "Some deploys got to be deleted.",
    too_few: "Some deploys got to be created.",
};

impl CountedStatus for MicroServiceStatus {
    fn child_count(&self) -> ChildCount {
        ChildCount {
            available: self.available_versions,
            total: self.total_versions,
        }
    }

    fn record(&mut self, count: ChildCount, condition: Condition) {
        self.available_versions = count.available;
        self.total_versions = count.total;
        self.conditions.push(condition);
    }
}

pub struct MicroServiceController<C> {
    client: SharedClient<C>,
}

impl<C> MicroServiceController<C> {
    pub fn new(client: SharedClient<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C> ReconcileStep for MicroServiceController<C>
where
    C: MetadataClient,
{
    type Parent = MicroServiceSpec;
    type Client = C;

    fn client(&self) -> &C {
        &self.client
    }

    fn owned_kinds(&self) -> Vec<&'static str> {
        vec![DeploymentSpec::label(), ServiceSpec::label(), IngressSpec::label()]
    }

    async fn body(&self, ms: &mut K8Obj<MicroServiceSpec>) -> Result<(), ReconcileError> {
        if let Some(version) = ms.spec.duplicate_version() {
            return Err(ReconcileError::invalid_spec(
                &ms.metadata,
                format!("version {} declared more than once", version),
            ));
        }
        if let Some((version, weight)) = ms.spec.invalid_canary_weight() {
            return Err(ReconcileError::invalid_spec(
                &ms.metadata,
                format!("canary weight {} of version {} is not within 0..=100", weight, version),
            ));
        }

        let mut selector = HashMap::new();
        selector.insert(SERVICE_LABEL.to_owned(), ms.metadata.name.clone());
        let total = ms.spec.versions.len();
        sync_status::<_, DeploymentSpec, _>(self.client(), ms, &selector, total, &VERSION_REASONS)
            .await?;

        reconcile_instances(self.client(), ms).await?;
        reconcile_load_balance(self.client(), ms).await
    }
}
