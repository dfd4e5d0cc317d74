//! Propose, apply locally, confirm remotely, reconcile.
//!
//! A cycle for one key moves `Idle -> Applied -> {Committed | RolledBack}`.
//! Reading the rollback target and applying the proposed value happen inside
//! [`OptimisticCoordinator::perform_mutation`] before anything is spawned, so
//! no other task can interleave between them. Only the remote call runs on the
//! runtime.
//!
//! Cycles on the same key are not serialized. A second cycle issued while the
//! first is pending captures the first one's optimistic value as its rollback
//! target. Callers needing strict ordering await each handle before issuing
//! the next mutation.

use std::{
    fmt::{self, Debug},
    future::{Future, IntoFuture},
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    notify::{Notification, Notifier},
    remote::{MutationRemote, RemoteError},
    store::StateStore,
};

pub const DEFAULT_UPSERT_FAILED: &str = "Failed to submit feedback";
pub const DEFAULT_DELETE_FAILED: &str = "Failed to remove feedback";
pub const DEFAULT_NETWORK_ERROR: &str = "network error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Upsert,
    Delete,
}

impl MutationKind {
    pub fn from_removal(removal: bool) -> Self {
        if removal {
            MutationKind::Delete
        } else {
            MutationKind::Upsert
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Upsert => f.write_str("upsert"),
            MutationKind::Delete => f.write_str("delete"),
        }
    }
}

/// Messages shown when the remote fails without a usable error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackMessages {
    pub upsert_failed: String,
    pub delete_failed: String,
    pub network_error: String,
}

impl Default for FallbackMessages {
    fn default() -> Self {
        Self {
            upsert_failed: DEFAULT_UPSERT_FAILED.into(),
            delete_failed: DEFAULT_DELETE_FAILED.into(),
            network_error: DEFAULT_NETWORK_ERROR.into(),
        }
    }
}

impl FallbackMessages {
    pub fn for_kind(&self, kind: MutationKind) -> &str {
        match kind {
            MutationKind::Upsert => &self.upsert_failed,
            MutationKind::Delete => &self.delete_failed,
        }
    }

    pub fn describe(&self, kind: MutationKind, err: &RemoteError) -> String {
        match err {
            RemoteError::Rejected { body, .. } => body.message_or(self.for_kind(kind)),
            RemoteError::Transport(_) => self.network_error.clone(),
        }
    }
}

/// An in-flight cycle. Lives until the remote call settles.
#[derive(Debug, Clone)]
pub struct MutationRequest<K, V> {
    pub id: Uuid,
    pub kind: MutationKind,
    pub key: K,
    pub previous_value: V,
    pub proposed_value: V,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The optimistic value stands.
    Committed,
    /// The previous value was restored and `message` was shown to the user.
    RolledBack { message: String },
    /// Nothing was applied: the key was not in the store or the store refused
    /// the optimistic write.
    Skipped,
    /// The runtime dropped the cycle before it settled.
    Interrupted,
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed)
    }
}

/// Settles to the cycle's [`MutationOutcome`]. Never fails.
///
/// Dropping the handle does not cancel the cycle.
pub struct MutationHandle {
    id: Option<Uuid>,
    state: HandleState,
}

enum HandleState {
    Ready(MutationOutcome),
    Spawned(JoinHandle<MutationOutcome>),
}

impl MutationHandle {
    fn ready(outcome: MutationOutcome) -> Self {
        Self {
            id: None,
            state: HandleState::Ready(outcome),
        }
    }

    fn spawned(id: Uuid, task: JoinHandle<MutationOutcome>) -> Self {
        Self {
            id: Some(id),
            state: HandleState::Spawned(task),
        }
    }

    /// `None` when the cycle was skipped before a request was created.
    pub fn mutation_id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn is_settled(&self) -> bool {
        match &self.state {
            HandleState::Ready(_) => true,
            HandleState::Spawned(task) => task.is_finished(),
        }
    }

    pub async fn settled(self) -> MutationOutcome {
        match self.state {
            HandleState::Ready(outcome) => outcome,
            HandleState::Spawned(task) => match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(mutation_id = ?self.id, error = %err, "mutation task did not settle");
                    MutationOutcome::Interrupted
                }
            },
        }
    }
}

impl IntoFuture for MutationHandle {
    type Output = MutationOutcome;
    type IntoFuture = BoxFuture<'static, MutationOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.settled())
    }
}

type RemoteCall<'a> = Pin<Box<dyn Future<Output = Result<(), RemoteError>> + Send + 'a>>;

pub struct OptimisticCoordinator<K, V, X> {
    store: Arc<dyn StateStore<K, V>>,
    remote: Arc<dyn MutationRemote<K, V, X>>,
    notifier: Arc<dyn Notifier>,
    messages: Arc<FallbackMessages>,
    strict_keys: bool,
}

impl<K, V, X> Clone for OptimisticCoordinator<K, V, X> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            notifier: Arc::clone(&self.notifier),
            messages: Arc::clone(&self.messages),
            strict_keys: self.strict_keys,
        }
    }
}

impl<K, V, X> OptimisticCoordinator<K, V, X>
where
    K: Clone + Debug + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
    X: Send + Sync + 'static,
{
    pub fn new(
        store: Arc<dyn StateStore<K, V>>,
        remote: Arc<dyn MutationRemote<K, V, X>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            remote,
            notifier,
            messages: Arc::new(FallbackMessages::default()),
            strict_keys: false,
        }
    }

    pub fn with_messages(mut self, messages: FallbackMessages) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    /// Panic instead of skipping when a mutation names a key the store does
    /// not hold. Meant for development builds.
    pub fn with_strict_keys(mut self, strict_keys: bool) -> Self {
        self.strict_keys = strict_keys;
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore<K, V>> {
        &self.store
    }

    pub fn messages(&self) -> &FallbackMessages {
        &self.messages
    }

    /// Applies `proposed` to the store before returning, then confirms it
    /// remotely on the tokio runtime. Must be called from within a runtime.
    ///
    /// `removal` selects `delete` over `upsert`; `extra` is forwarded to
    /// `upsert` only.
    pub fn perform_mutation(
        &self,
        key: K,
        proposed: V,
        removal: bool,
        extra: Option<X>,
    ) -> MutationHandle {
        let kind = MutationKind::from_removal(removal);

        let Some(previous_value) = self.store.get(&key) else {
            if self.strict_keys {
                panic!("optimistic {kind} on key {key:?} which is not present in the store");
            }
            warn!(?key, %kind, "optimistic mutation skipped: key not present in store");
            return MutationHandle::ready(MutationOutcome::Skipped);
        };

        if let Err(err) = self.store.set(&key, proposed.clone()) {
            warn!(?key, %kind, error = %err, "optimistic mutation skipped: store refused write");
            return MutationHandle::ready(MutationOutcome::Skipped);
        }

        let request = MutationRequest {
            id: Uuid::new_v4(),
            kind,
            key,
            previous_value,
            proposed_value: proposed,
            issued_at: Utc::now(),
        };
        debug!(
            mutation_id = %request.id,
            key = ?request.key,
            %kind,
            previous = ?request.previous_value,
            proposed = ?request.proposed_value,
            "optimistic value applied"
        );

        let id = request.id;
        let coordinator = self.clone();
        let task = tokio::spawn(async move { coordinator.reconcile(request, extra).await });
        MutationHandle::spawned(id, task)
    }

    async fn reconcile(self, request: MutationRequest<K, V>, extra: Option<X>) -> MutationOutcome {
        let call: RemoteCall<'_> = match request.kind {
            MutationKind::Upsert => {
                self.remote
                    .upsert(&request.key, &request.proposed_value, extra.as_ref())
            }
            MutationKind::Delete => self.remote.delete(&request.key),
        };

        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(mutation_id = %request.id, kind = %request.kind, "remote call panicked");
                Err(RemoteError::Transport("remote call panicked".into()))
            }
        };

        let elapsed_ms = (Utc::now() - request.issued_at).num_milliseconds();
        match result {
            Ok(()) => {
                info!(
                    mutation_id = %request.id,
                    key = ?request.key,
                    kind = %request.kind,
                    elapsed_ms,
                    "optimistic mutation committed"
                );
                MutationOutcome::Committed
            }
            Err(err) => {
                let message = self.messages.describe(request.kind, &err);
                warn!(
                    mutation_id = %request.id,
                    key = ?request.key,
                    kind = %request.kind,
                    elapsed_ms,
                    error = %err,
                    user_message = %message,
                    "optimistic mutation failed; rolling back"
                );
                self.roll_back(&request);
                self.notifier.show(Notification::error(message.clone()));
                MutationOutcome::RolledBack { message }
            }
        }
    }

    fn roll_back(&self, request: &MutationRequest<K, V>) {
        if let Err(err) = self
            .store
            .set(&request.key, request.previous_value.clone())
        {
            warn!(
                mutation_id = %request.id,
                key = ?request.key,
                error = %err,
                "rollback not written"
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/optimistic_tests.rs"]
mod tests;
