//! App controller: one MicroService per template.

use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use k8_metadata_client::MetadataClient;
use k8_metadata_client::SharedClient;
use k8_types::{K8Obj, Spec};

use crate::api::ApplicationSpec;
use crate::api::ApplicationStatus;
use crate::api::ChildCount;
use crate::api::Condition;
use crate::api::MicroServiceSpec;
use crate::api::Reasons;
use crate::api::APP_LABEL;
use crate::reconcile::child_labels;
use crate::reconcile::owned_child;
use crate::reconcile::sweep_orphans;
use crate::reconcile::sync_status;
use crate::reconcile::upsert_spec;
use crate::reconcile::CountedStatus;
use crate::reconcile::ReconcileStep;
use crate::ReconcileError;

const MICRO_SERVICE_REASONS: Reasons = Reasons {
    converged: "All deploy have updated.",
    too_many: "Some microservices got to be deleted.",
    too_few: "Some microservices got to be created.",
};

impl CountedStatus for ApplicationStatus {
    fn child_count(&self) -> ChildCount {
        ChildCount {
            available: self.available_micro_services,
            total: self.total_micro_services,
        }
    }

    fn record(&mut self, count: ChildCount, condition: Condition) {
        self.available_micro_services = count.available;
        self.total_micro_services = count.total;
        self.conditions.push(condition);
    }
}

pub struct AppController<C> {
    client: SharedClient<C>,
}

impl<C> AppController<C> {
    pub fn new(client: SharedClient<C>) -> Self {
        Self { client }
    }
}

fn app_selector(app_name: &str) -> HashMap<String, String> {
    let mut selector = HashMap::new();
    selector.insert(APP_LABEL.to_owned(), app_name.to_owned());
    selector
}

impl<C> AppController<C>
where
    C: MetadataClient,
{
    /// create or update MicroService of every template, remove the rest
    async fn reconcile_micro_services(&self, app: &K8Obj<ApplicationSpec>) -> Result<(), ReconcileError> {
        let app_name = app.metadata.name.as_str();
        let labels = child_labels(&app.metadata.labels, &[(APP_LABEL, app_name)]);
        let mut keep = HashSet::new();

        for template in &app.spec.micro_services {
            let name = template.child_name(app_name);
            // carry the names the MicroService controller would generate, so
            // its write back does not make the child diverge from the template
            let mut spec = template.spec.clone();
            spec.fill_default_names(&name);

            let child = owned_child::<ApplicationSpec, MicroServiceSpec>(
                &app.metadata,
                name.clone(),
                labels.clone(),
                spec,
            );
            upsert_spec(self.client(), child).await?;
            keep.insert(name);
        }

        let deleted = sweep_orphans::<MicroServiceSpec, _>(
            self.client(),
            app.metadata.namespace(),
            &app_selector(app_name),
            &keep,
        )
        .await?;
        debug!(app = %app.metadata, micro_services = keep.len(), deleted, "micro services reconciled");
        Ok(())
    }
}

#[async_trait]
impl<C> ReconcileStep for AppController<C>
where
    C: MetadataClient,
{
    type Parent = ApplicationSpec;
    type Client = C;

    fn client(&self) -> &C {
        &self.client
    }

    fn owned_kinds(&self) -> Vec<&'static str> {
        vec![MicroServiceSpec::label()]
    }

    async fn body(&self, app: &mut K8Obj<ApplicationSpec>) -> Result<(), ReconcileError> {
        if let Some(template) = app.spec.duplicate_template() {
            return Err(ReconcileError::invalid_spec(
                &app.metadata,
                format!("micro service {} declared more than once", template),
            ));
        }

        let selector = app_selector(&app.metadata.name);
        let total = app.spec.micro_services.len();
        sync_status::<_, MicroServiceSpec, _>(self.client(), app, &selector, total, &MICRO_SERVICE_REASONS)
            .await?;

        self.reconcile_micro_services(app).await
    }
}
