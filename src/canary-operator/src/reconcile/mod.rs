//! Reconcile loop shared by the App and MicroService controllers.
//!
//! A controller fetches its parent, skips parents being deleted, runs its
//! body and persists any spec fields the body filled in.

mod status;
mod upsert;

pub use self::status::*;
pub use self::upsert::*;

use std::fmt;

use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;

use k8_metadata_client::DiffableK8Obj;
use k8_metadata_client::MetadataClient;
use k8_metadata_client::MetadataClientError;
use k8_types::{K8Meta, K8Obj, ObjectMeta, Spec};

use crate::ReconcileError;

/// namespaced name of the object a request refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new<N: Into<String>>(namespace: N, name: N) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl From<&ObjectMeta> for ObjectKey {
    fn from(metadata: &ObjectMeta) -> Self {
        Self::new(metadata.namespace.clone(), metadata.name.clone())
    }
}

impl K8Meta for ObjectKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileRequest {
    pub kind: String,
    pub key: ObjectKey,
}

impl ReconcileRequest {
    pub fn new<K: Into<String>>(kind: K, key: ObjectKey) -> Self {
        Self {
            kind: kind.into(),
            key,
        }
    }
}

/// Kind level entry point used by the registry
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// kind of the parent object
    fn kind(&self) -> &'static str;

    /// kinds of the children this reconciler is the controlling owner of
    fn owns(&self) -> Vec<&'static str>;

    async fn reconcile(&self, key: &ObjectKey) -> Result<(), ReconcileError>;
}

/// Controller specific part of the reconcile loop
#[async_trait]
pub trait ReconcileStep: Send + Sync {
    type Parent: Spec;
    type Client: MetadataClient;

    fn client(&self) -> &Self::Client;

    fn owned_kinds(&self) -> Vec<&'static str>;

    /// none if parent no longer exists
    async fn fetch_parent(&self, key: &ObjectKey) -> Result<Option<K8Obj<Self::Parent>>, ReconcileError> {
        match self.client().retrieve_item::<Self::Parent, _>(key).await {
            Ok(parent) => Ok(Some(parent)),
            Err(err) if err.not_founded() => Ok(None),
            Err(err) => Err(ReconcileError::client(err)),
        }
    }

    /// children are removed by garbage collection, nothing to do
    async fn deleted_hook(&self, parent: &K8Obj<Self::Parent>) -> Result<(), ReconcileError> {
        debug!(parent = %parent.metadata, "parent is being deleted, do nothing");
        Ok(())
    }

    async fn body(&self, parent: &mut K8Obj<Self::Parent>) -> Result<(), ReconcileError>;

    /// persist spec fields filled in by the body.
    /// The replace carries the resource version the pass started from, so an
    /// edit made in the meantime fails it with a conflict instead of being lost.
    async fn write_back(&self, parent: &K8Obj<Self::Parent>) -> Result<(), ReconcileError> {
        let key = ObjectKey::from(&parent.metadata);
        let persisted = match self.fetch_parent(&key).await? {
            Some(persisted) => persisted,
            None => return Ok(()),
        };

        if DiffableK8Obj::new(&persisted.spec)
            .is_same_as::<ReconcileError>(&DiffableK8Obj::new(&parent.spec))?
        {
            return Ok(());
        }

        let mut update = persisted.as_update();
        update.spec = parent.spec.clone();
        update.metadata.resource_version = parent.metadata.resource_version.clone();
        self.client()
            .replace_item(update)
            .await
            .map_err(ReconcileError::client)?;
        info!(parent = %key, "persisted generated spec fields");
        Ok(())
    }
}

/// Runs the reconcile loop on top of a step
pub struct Controller<R> {
    step: R,
}

impl<R> Controller<R>
where
    R: ReconcileStep,
{
    pub fn new(step: R) -> Self {
        Self { step }
    }

    /// body, then write back only if the body changed the spec
    async fn run(&self, parent: &mut K8Obj<R::Parent>) -> Result<(), ReconcileError> {
        let original = parent.spec.clone();
        self.step.body(parent).await?;

        if DiffableK8Obj::new(&original).is_same_as::<ReconcileError>(&DiffableK8Obj::new(&parent.spec))? {
            debug!("spec untouched by reconcile");
            return Ok(());
        }
        self.step.write_back(parent).await
    }
}

#[async_trait]
impl<R> Reconciler for Controller<R>
where
    R: ReconcileStep,
{
    fn kind(&self) -> &'static str {
        R::Parent::label()
    }

    fn owns(&self) -> Vec<&'static str> {
        self.step.owned_kinds()
    }

    #[instrument(
        skip(self, key),
        fields(kind = R::Parent::label(), namespace = %key.namespace, name = %key.name)
    )]
    async fn reconcile(&self, key: &ObjectKey) -> Result<(), ReconcileError> {
        let mut parent = match self.step.fetch_parent(key).await? {
            Some(parent) => parent,
            None => {
                debug!("not found, nothing to reconcile");
                return Ok(());
            }
        };

        if parent.metadata.is_being_deleted() {
            return self.step.deleted_hook(&parent).await;
        }

        let result = self.run(&mut parent).await;
        match &result {
            Err(err) if err.is_conflict() => info!(%err, "stale write, retry with fresh state"),
            Err(err) => error!(%err, "reconcile failed"),
            Ok(()) => debug!("reconciled"),
        }
        result
    }
}
