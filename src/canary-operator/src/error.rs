use std::error::Error as StdError;

use thiserror::Error;

use k8_diff::DiffError;
use k8_metadata_client::MetadataClientError;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("client: {source}")]
    Client {
        source: Box<dyn StdError + Send + Sync>,
        conflict: bool,
    },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("diff: {0}")]
    Diff(#[from] DiffError),
    #[error("invalid spec for {object}: {reason}")]
    InvalidSpec { object: String, reason: String },
    #[error("no reconciler registered for kind {0}")]
    UnknownKind(String),
}

impl ReconcileError {
    /// wrap client error, keeping its classification
    pub fn client<E: MetadataClientError>(err: E) -> Self {
        Self::Client {
            conflict: err.conflict(),
            source: Box::new(err),
        }
    }

    pub fn invalid_spec<O: ToString, R: Into<String>>(object: O, reason: R) -> Self {
        Self::InvalidSpec {
            object: object.to_string(),
            reason: reason.into(),
        }
    }

    /// write rejected because the object changed after it was read
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Client { conflict: true, .. })
    }
}
