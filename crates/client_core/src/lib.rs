//! Client-side state coordination for the chat front end.
//!
//! [`optimistic::OptimisticCoordinator`] applies a mutation to local state at
//! once, confirms it against the backend, and rolls back with a user-visible
//! error if the backend refuses. [`feedback`] wires it to chat message
//! like/dislike ratings.

pub mod config;
pub mod feedback;
pub mod notify;
pub mod optimistic;
pub mod remote;
pub mod store;

pub use config::{load_settings, ClientSettings};
pub use feedback::{FeedbackController, FeedbackExtra, FeedbackValue, HttpFeedbackRemote};
pub use notify::{ChannelNotifier, Notification, NotificationKind, Notifier, TracingNotifier};
pub use optimistic::{
    FallbackMessages, MutationHandle, MutationKind, MutationOutcome, MutationRequest,
    OptimisticCoordinator,
};
pub use remote::{MutationRemote, RemoteError, RemoteResult};
pub use store::{MemoryStore, StateStore, StoreChange, StoreError};
