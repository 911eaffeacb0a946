use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use async_trait::async_trait;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::trace;

use k8_diff::DiffError;
use k8_types::{
    Crd, DeleteStatus, DeletedStatus, InputK8Obj, K8List, K8Meta, K8Obj, ObjectMeta, Spec,
    StatusEnum, UpdateK8ObjStatus, UpdatedK8Obj, DEFAULT_NS,
};

use crate::ListArg;
use crate::MetadataClient;
use crate::MetadataClientError;
use crate::NameSpace;

#[derive(Error, Debug)]
pub enum InMemoryError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: String },
    #[error("{kind} '{key}' was modified: expected version {expected}, stored {stored}")]
    Conflict {
        kind: &'static str,
        key: String,
        expected: String,
        stored: String,
    },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("diff: {0}")]
    Diff(#[from] DiffError),
    #[error("store lock poisoned")]
    LockPoison,
}

impl MetadataClientError for InMemoryError {
    fn not_founded(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    crd: &'static Crd,
    ns: String,
    name: String,
}

impl ItemKey {
    fn new<S>(metadata: &dyn K8Meta) -> Self
    where
        S: Spec,
    {
        ItemKey {
            crd: S::metadata(),
            ns: normalize_ns(metadata.namespace()).to_owned(),
            name: metadata.name().to_owned(),
        }
    }

    fn display(&self) -> String {
        format!("{}/{}", self.ns, self.name)
    }
}

fn normalize_ns(ns: &str) -> &str {
    if ns.is_empty() {
        DEFAULT_NS
    } else {
        ns
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Default)]
struct Store {
    items: HashMap<ItemKey, Value>,
    version: u64,
    uid: u64,
    writes: u64,
}

impl Store {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn next_uid(&mut self) -> String {
        self.uid += 1;
        format!("00000000-0000-0000-0000-{:012}", self.uid)
    }

    fn get<S: Spec>(&self, key: &ItemKey) -> Result<K8Obj<S>, InMemoryError> {
        match self.items.get(key) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Err(InMemoryError::NotFound {
                kind: S::label(),
                key: key.display(),
            }),
        }
    }

    fn put<S: Spec>(&mut self, key: ItemKey, item: &K8Obj<S>) -> Result<(), InMemoryError> {
        let value = serde_json::to_value(item)?;
        self.items.insert(key, value);
        Ok(())
    }

    /// remove everything whose controller owner is gone, until nothing is left to collect
    fn collect_garbage(&mut self, deleted_uid: String) {
        let mut gone: HashSet<String> = HashSet::new();
        gone.insert(deleted_uid);
        loop {
            let orphans: Vec<(ItemKey, String)> = self
                .items
                .iter()
                .filter_map(|(key, value)| {
                    let metadata: ObjectMeta =
                        serde_json::from_value(value.get("metadata")?.clone()).ok()?;
                    let owner = metadata.controller_owner()?;
                    if gone.contains(&owner.uid) {
                        Some((key.clone(), metadata.uid))
                    } else {
                        None
                    }
                })
                .collect();
            if orphans.is_empty() {
                return;
            }
            for (key, uid) in orphans {
                debug!(crd = %key.crd, item = %key.display(), "garbage collected");
                self.items.remove(&key);
                gone.insert(uid);
            }
        }
    }
}

/// In memory object store.
/// Assigns uid and resource versions, checks optimistic concurrency
/// and deletes dependents of removed owners.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    store: RwLock<Store>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>, InMemoryError> {
        self.store.read().map_err(|_| InMemoryError::LockPoison)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>, InMemoryError> {
        self.store.write().map_err(|_| InMemoryError::LockPoison)
    }

    /// seed object as is, without counting as write.
    /// missing uid, resource version and namespace are filled in
    pub fn insert_item<S>(&self, mut item: K8Obj<S>) -> Result<K8Obj<S>, InMemoryError>
    where
        S: Spec,
    {
        let mut store = self.write()?;
        item.metadata.namespace = normalize_ns(&item.metadata.namespace).to_owned();
        if item.metadata.uid.is_empty() {
            item.metadata.uid = store.next_uid();
        }
        if item.metadata.creation_timestamp.is_empty() {
            item.metadata.creation_timestamp = now();
        }
        item.metadata.resource_version = store.next_version();
        let key = ItemKey::new::<S>(&item.metadata);
        store.put(key, &item)?;
        Ok(item)
    }

    /// number of create, replace, status and delete calls that changed the store
    pub fn write_count(&self) -> u64 {
        self.read().map(|store| store.writes).unwrap_or_default()
    }

    pub fn reset_write_count(&self) {
        if let Ok(mut store) = self.write() {
            store.writes = 0;
        }
    }

    /// total objects of any kind
    pub fn len(&self) -> usize {
        self.read().map(|store| store.items.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_version(
    kind: &'static str,
    key: &ItemKey,
    expected: &str,
    stored: &ObjectMeta,
) -> Result<(), InMemoryError> {
    if !expected.is_empty() && expected != stored.resource_version {
        return Err(InMemoryError::Conflict {
            kind,
            key: key.display(),
            expected: expected.to_owned(),
            stored: stored.resource_version.clone(),
        });
    }
    Ok(())
}

#[async_trait]
impl MetadataClient for InMemoryClient {
    type MetadataClientError = InMemoryError;

    async fn retrieve_item<S, M>(&self, metadata: &M) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync,
    {
        let store = self.read()?;
        store.get(&ItemKey::new::<S>(metadata))
    }

    async fn retrieve_items_with_option<S, N>(
        &self,
        namespace: N,
        option: Option<ListArg>,
    ) -> Result<K8List<S>, Self::MetadataClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync,
    {
        let namespace: NameSpace = namespace.into();
        let option = option.unwrap_or_default();
        let selector = option.label_pairs();

        let store = self.read()?;
        let mut items = vec![];
        for (key, value) in &store.items {
            if key.crd != S::metadata() {
                continue;
            }
            if !namespace.is_all() && key.ns != normalize_ns(namespace.named()) {
                continue;
            }
            let item: K8Obj<S> = serde_json::from_value(value.clone())?;
            let selected = selector
                .iter()
                .all(|(label, expected)| item.metadata.labels.get(*label).map(|v| v.as_str()) == Some(*expected));
            if selected {
                items.push(item);
            }
        }
        items.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        trace!(kind = S::label(), count = items.len(), "listed");

        let mut list = K8List::new();
        list.metadata.resource_version = store.version.to_string();
        list.items = items;
        Ok(list)
    }

    async fn create_item<S>(&self, value: InputK8Obj<S>) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
    {
        let mut store = self.write()?;
        let key = ItemKey::new::<S>(&value.metadata);
        if store.items.contains_key(&key) {
            return Err(InMemoryError::AlreadyExists {
                kind: S::label(),
                key: key.display(),
            });
        }

        let input = value.metadata;
        let metadata = ObjectMeta {
            name: input.name,
            namespace: key.ns.clone(),
            uid: store.next_uid(),
            creation_timestamp: now(),
            generation: Some(1),
            resource_version: store.next_version(),
            labels: input.labels,
            owner_references: input.owner_references,
            annotations: input.annotations,
            finalizers: input.finalizers,
            ..Default::default()
        };
        let item = K8Obj {
            api_version: S::api_version(),
            kind: S::kind(),
            metadata,
            spec: value.spec,
            header: value.header,
            status: S::Status::default(),
        };
        store.put(key, &item)?;
        store.writes += 1;
        debug!(kind = S::label(), item = %item.metadata, "created");
        Ok(item)
    }

    async fn replace_item<S>(&self, value: UpdatedK8Obj<S>) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
    {
        let mut store = self.write()?;
        let key = ItemKey::new::<S>(&value.metadata);
        let mut item: K8Obj<S> = store.get(&key)?;
        check_version(S::label(), &key, &value.metadata.resource_version, &item.metadata)?;

        if serde_json::to_value(&item.spec)? != serde_json::to_value(&value.spec)? {
            item.metadata.generation = Some(item.metadata.generation.unwrap_or_default() + 1);
        }
        let update = value.metadata;
        item.metadata.labels = update.labels;
        item.metadata.annotations = update.annotations;
        item.metadata.owner_references = update.owner_references;
        item.metadata.finalizers = update.finalizers;
        item.metadata.resource_version = store.next_version();
        item.spec = value.spec;
        item.header = value.header;

        store.put(key, &item)?;
        store.writes += 1;
        debug!(kind = S::label(), item = %item.metadata, "replaced");
        Ok(item)
    }

    async fn update_status<S>(
        &self,
        value: &UpdateK8ObjStatus<S>,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
    {
        let mut store = self.write()?;
        let key = ItemKey::new::<S>(&value.metadata);
        let mut item: K8Obj<S> = store.get(&key)?;
        check_version(S::label(), &key, &value.metadata.resource_version, &item.metadata)?;

        item.status = value.status.clone();
        item.metadata.resource_version = store.next_version();
        store.put(key, &item)?;
        store.writes += 1;
        debug!(kind = S::label(), item = %item.metadata, "status updated");
        Ok(item)
    }

    async fn delete_item<S, M>(&self, metadata: &M) -> Result<DeleteStatus<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync,
    {
        let mut store = self.write()?;
        let key = ItemKey::new::<S>(metadata);
        let item: K8Obj<S> = store.get(&key)?;
        store.items.remove(&key);
        store.writes += 1;
        debug!(kind = S::label(), item = %item.metadata, "deleted");
        store.collect_garbage(item.metadata.uid);

        Ok(DeleteStatus::Deleted(DeletedStatus {
            api_version: "v1".to_owned(),
            code: Some(200),
            kind: "Status".to_owned(),
            message: None,
            reason: None,
            status: StatusEnum::SUCCESS,
        }))
    }
}
