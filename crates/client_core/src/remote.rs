use async_trait::async_trait;
use shared::error::ErrorBody;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service answered, but not with success.
    #[error("remote rejected mutation (status {status:?})")]
    Rejected {
        status: Option<u16>,
        body: ErrorBody,
    },
    /// No usable response: connection failure, timeout, bad encoding.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn rejected(status: u16, body: ErrorBody) -> Self {
        Self::Rejected {
            status: Some(status),
            body,
        }
    }
}

pub type RemoteResult = Result<(), RemoteError>;

/// Remote write side of an optimistically mutated entity.
///
/// Upsert and delete are distinct endpoints but reconcile identically.
#[async_trait]
pub trait MutationRemote<K, V, X>: Send + Sync {
    async fn upsert(&self, key: &K, value: &V, extra: Option<&X>) -> RemoteResult;
    async fn delete(&self, key: &K) -> RemoteResult;
}
