use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;
use tracing::trace;

use k8_metadata_client::MetadataClient;
use k8_metadata_client::SharedClient;
use k8_types::{K8Watch, Spec};

use crate::app::AppController;
use crate::microservice::MicroServiceController;
use crate::reconcile::Controller;
use crate::reconcile::ObjectKey;
use crate::reconcile::ReconcileRequest;
use crate::reconcile::Reconciler;
use crate::ConfigError;
use crate::OperatorConfig;
use crate::ReconcileError;

/// Routes watch events to reconcile requests and requests to reconcilers
pub struct ControllerRegistry {
    config: OperatorConfig,
    reconcilers: HashMap<&'static str, Box<dyn Reconciler>>,
}

impl ControllerRegistry {
    pub fn new(config: OperatorConfig) -> Self {
        Self {
            config,
            reconcilers: HashMap::new(),
        }
    }

    /// controllers as configured by the file `CANARY_OPERATOR_CONFIG` points at
    pub fn from_env<C>(client: SharedClient<C>) -> Result<Self, ConfigError>
    where
        C: MetadataClient + 'static,
    {
        Self::from_config(OperatorConfig::load()?, client)
    }

    /// App and MicroService controllers, as enabled by config
    pub fn from_config<C>(config: OperatorConfig, client: SharedClient<C>) -> Result<Self, ConfigError>
    where
        C: MetadataClient + 'static,
    {
        config.validate()?;
        let app_enabled = config.controllers.app;
        let micro_service_enabled = config.controllers.micro_service;
        let mut registry = Self::new(config);
        if app_enabled {
            registry.register(Controller::new(AppController::new(client.clone())));
        }
        if micro_service_enabled {
            registry.register(Controller::new(MicroServiceController::new(client)));
        }
        Ok(registry)
    }

    /// replaces reconciler already registered for the same kind
    pub fn register<R>(&mut self, reconciler: R)
    where
        R: Reconciler + 'static,
    {
        debug!(kind = reconciler.kind(), owns = ?reconciler.owns(), "register reconciler");
        self.reconcilers.insert(reconciler.kind(), Box::new(reconciler));
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.reconcilers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// A parent kind enqueues itself. A child enqueues its controlling owner
    /// when the owner kind is registered and declares it owns the child kind.
    pub fn requests_for<S>(&self, event: &K8Watch<S>) -> Vec<ReconcileRequest>
    where
        S: Spec,
    {
        let obj = event.object();
        let mut requests = vec![];

        if self.reconcilers.contains_key(S::label()) {
            requests.push(ReconcileRequest::new(S::label(), ObjectKey::from(&obj.metadata)));
        }

        if let Some(owner) = obj.metadata.controller_owner() {
            let owned = self
                .reconcilers
                .get(owner.kind.as_str())
                .map(|reconciler| reconciler.owns().contains(&S::label()))
                .unwrap_or(false);
            if owned {
                requests.push(ReconcileRequest::new(
                    owner.kind.clone(),
                    ObjectKey::new(obj.metadata.namespace.clone(), owner.name.clone()),
                ));
            }
        }

        trace!(kind = S::label(), object = %obj.metadata, ?requests, "routed event");
        requests
    }

    pub async fn dispatch(&self, request: &ReconcileRequest) -> Result<(), ReconcileError> {
        if !self.config.watches(&request.key.namespace) {
            debug!(key = %request.key, "namespace not watched, skipping");
            return Ok(());
        }
        let reconciler = self
            .reconcilers
            .get(request.kind.as_str())
            .ok_or_else(|| ReconcileError::UnknownKind(request.kind.clone()))?;
        reconciler.reconcile(&request.key).await
    }

    /// delay before retrying a request that failed `failures` times in a row
    pub fn requeue_after(&self, failures: u32) -> Duration {
        self.config.requeue.delay(failures)
    }
}
