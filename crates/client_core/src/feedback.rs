use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{FeedbackType, MessageId},
    error::ErrorBody,
    protocol::{
        CreateFeedbackRequest, RemoveFeedbackQuery, CREATE_FEEDBACK_PATH, REMOVE_FEEDBACK_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    config::ClientSettings,
    notify::Notifier,
    optimistic::{MutationHandle, OptimisticCoordinator},
    remote::{MutationRemote, RemoteError, RemoteResult},
    store::StateStore,
};

/// Local value of a message's feedback. `None` is the cleared state.
pub type FeedbackValue = Option<FeedbackType>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackExtra {
    pub feedback_text: Option<String>,
    pub predefined_feedback: Option<String>,
}

impl FeedbackExtra {
    pub fn text(feedback_text: impl Into<String>) -> Self {
        Self {
            feedback_text: Some(feedback_text.into()),
            predefined_feedback: None,
        }
    }
}

pub struct HttpFeedbackRemote {
    http: Client,
    base_url: Url,
}

impl HttpFeedbackRemote {
    pub fn new(server_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let server_url = server_url.trim();
        // Keep any path prefix when joining endpoint paths.
        let normalized = if server_url.ends_with('/') {
            server_url.to_string()
        } else {
            format!("{server_url}/")
        };
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        Self::new(
            &settings.server_url,
            settings.http_timeout_seconds.map(Duration::from_secs),
        )
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, RemoteError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| RemoteError::Transport(format!("invalid endpoint {path}: {err}")))
    }
}

async fn settle(response: std::result::Result<Response, reqwest::Error>) -> RemoteResult {
    let response = response.map_err(|err| RemoteError::Transport(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = match response.bytes().await {
        Ok(raw) => ErrorBody::from_bytes(&raw),
        Err(err) => {
            debug!(%status, error = %err, "failed to read error body");
            ErrorBody::default()
        }
    };
    Err(RemoteError::rejected(status.as_u16(), body))
}

#[async_trait]
impl MutationRemote<MessageId, FeedbackValue, FeedbackExtra> for HttpFeedbackRemote {
    async fn upsert(
        &self,
        key: &MessageId,
        value: &FeedbackValue,
        extra: Option<&FeedbackExtra>,
    ) -> RemoteResult {
        let Some(feedback) = value else {
            return Err(RemoteError::Rejected {
                status: None,
                body: ErrorBody::with_message("cannot submit empty feedback"),
            });
        };
        let mut request = CreateFeedbackRequest::new(*key, *feedback);
        if let Some(extra) = extra {
            request.feedback_text = extra.feedback_text.clone();
            request.predefined_feedback = extra.predefined_feedback.clone();
        }
        let url = self.endpoint(CREATE_FEEDBACK_PATH)?;
        settle(self.http.post(url).json(&request).send().await).await
    }

    async fn delete(&self, key: &MessageId) -> RemoteResult {
        let url = self.endpoint(REMOVE_FEEDBACK_PATH)?;
        settle(
            self.http
                .delete(url)
                .query(&RemoveFeedbackQuery {
                    chat_message_id: key.0,
                })
                .send()
                .await,
        )
        .await
    }
}

/// Like/dislike controls on chat messages.
#[derive(Clone)]
pub struct FeedbackController {
    coordinator: OptimisticCoordinator<MessageId, FeedbackValue, FeedbackExtra>,
}

impl FeedbackController {
    pub fn new(coordinator: OptimisticCoordinator<MessageId, FeedbackValue, FeedbackExtra>) -> Self {
        Self { coordinator }
    }

    pub fn from_settings(
        settings: &ClientSettings,
        store: Arc<dyn StateStore<MessageId, FeedbackValue>>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let remote = HttpFeedbackRemote::from_settings(settings)?;
        let coordinator: OptimisticCoordinator<MessageId, FeedbackValue, FeedbackExtra> =
            OptimisticCoordinator::new(store, Arc::new(remote), notifier)
            .with_messages(settings.fallback_messages())
            .with_strict_keys(settings.strict_keys);
        Ok(Self::new(coordinator))
    }

    pub fn current(&self, message_id: MessageId) -> Option<FeedbackValue> {
        self.coordinator.store().get(&message_id)
    }

    pub fn submit(
        &self,
        message_id: MessageId,
        feedback: FeedbackType,
        extra: Option<FeedbackExtra>,
    ) -> MutationHandle {
        self.coordinator
            .perform_mutation(message_id, Some(feedback), false, extra)
    }

    pub fn remove(&self, message_id: MessageId) -> MutationHandle {
        self.coordinator
            .perform_mutation(message_id, None, true, None)
    }

    /// Clicking the active rating clears it; any other click sets it.
    pub fn toggle(
        &self,
        message_id: MessageId,
        feedback: FeedbackType,
        extra: Option<FeedbackExtra>,
    ) -> MutationHandle {
        if self.current(message_id) == Some(Some(feedback)) {
            self.remove(message_id)
        } else {
            self.submit(message_id, feedback, extra)
        }
    }
}

#[cfg(test)]
#[path = "tests/feedback_tests.rs"]
mod tests;
