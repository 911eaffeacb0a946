use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Display;

use async_trait::async_trait;
use serde_json::Error as SerdeJsonError;
use tracing::debug;

use k8_diff::DiffError;
use k8_types::{DeleteStatus, InputK8Obj, K8List, K8Meta, K8Obj, Spec, UpdateK8ObjStatus, UpdatedK8Obj};

#[derive(Debug, Clone)]
pub enum NameSpace {
    All,
    Named(String),
}

impl NameSpace {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn named(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Named(name) => name,
        }
    }
}

impl From<String> for NameSpace {
    fn from(namespace: String) -> Self {
        NameSpace::Named(namespace)
    }
}

impl From<&str> for NameSpace {
    fn from(namespace: &str) -> Self {
        NameSpace::Named(namespace.to_owned())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ListArg {
    pub label_selector: Option<String>,
}

impl ListArg {
    /// equality based selector: `k1=v1,k2=v2`, keys sorted
    pub fn match_labels(labels: &HashMap<String, String>) -> Self {
        let mut pairs: Vec<String> = labels
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        pairs.sort();
        Self {
            label_selector: Some(pairs.join(",")),
        }
    }

    /// selector parsed back into key/value pairs, empty pairs are skipped
    pub fn label_pairs(&self) -> Vec<(&str, &str)> {
        match &self.label_selector {
            Some(selector) => selector
                .split(',')
                .filter_map(|pair| pair.split_once('='))
                .map(|(key, value)| (key.trim(), value.trim()))
                .collect(),
            None => vec![],
        }
    }
}

/// trait for metadata client
pub trait MetadataClientError: std::error::Error + Send + Sync + 'static {
    /// is not founded
    fn not_founded(&self) -> bool;

    /// write rejected because the object changed since it was read
    fn conflict(&self) -> bool;
}

#[async_trait]
pub trait MetadataClient: Send + Sync {
    type MetadataClientError: MetadataClientError
        + Debug
        + Display
        + From<DiffError>
        + From<SerdeJsonError>;

    /// retrieval a single item
    async fn retrieve_item<S, M>(&self, metadata: &M) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync;

    /// retrieve all items a single chunk
    async fn retrieve_items<S, N>(&self, namespace: N) -> Result<K8List<S>, Self::MetadataClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync,
    {
        self.retrieve_items_with_option(namespace, None).await
    }

    async fn retrieve_items_with_option<S, N>(
        &self,
        namespace: N,
        option: Option<ListArg>,
    ) -> Result<K8List<S>, Self::MetadataClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync;

    /// create new object, fails if an object with same name exists
    async fn create_item<S>(&self, value: InputK8Obj<S>) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec;

    /// replace spec and metadata of existing object.
    /// if resource version is set, it must match the stored one
    async fn replace_item<S>(&self, value: UpdatedK8Obj<S>) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec;

    /// update status
    async fn update_status<S>(
        &self,
        value: &UpdateK8ObjStatus<S>,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec;

    async fn delete_item<S, M>(&self, metadata: &M) -> Result<DeleteStatus<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync;

    /// Check if the object exists, return true or false.
    async fn exists<S, M>(&self, metadata: &M) -> Result<bool, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Display + Send + Sync,
    {
        debug!("check if '{}' exists", metadata);
        match self.retrieve_item::<S, M>(metadata).await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.not_founded() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }
}
