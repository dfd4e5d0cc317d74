use serde::{Deserialize, Serialize};

use crate::domain::{FeedbackType, MessageId};

pub const CREATE_FEEDBACK_PATH: &str = "/chat/create-chat-message-feedback";
pub const REMOVE_FEEDBACK_PATH: &str = "/chat/remove-chat-message-feedback";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFeedbackRequest {
    pub chat_message_id: MessageId,
    pub is_positive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined_feedback: Option<String>,
}

impl CreateFeedbackRequest {
    pub fn new(chat_message_id: MessageId, feedback: FeedbackType) -> Self {
        Self {
            chat_message_id,
            is_positive: feedback.is_positive(),
            feedback_text: None,
            predefined_feedback: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveFeedbackQuery {
    pub chat_message_id: i64,
}
