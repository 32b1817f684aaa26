use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Success,
    Info,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub kind: FeedbackKind,
    pub text: String,
}

#[async_trait]
pub trait FeedbackChannel: Send + Sync {
    async fn deliver(&self, message: &FeedbackMessage) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
pub struct QueuedFeedbackChannel {
    messages: Mutex<Vec<FeedbackMessage>>,
}

impl QueuedFeedbackChannel {
    pub fn drain(&self) -> Vec<FeedbackMessage> {
        match self.messages.lock() {
            Ok(mut messages) => std::mem::take(&mut *messages),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl FeedbackChannel for QueuedFeedbackChannel {
    async fn deliver(&self, message: &FeedbackMessage) -> Result<(), InfraError> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|error| InfraError::Unavailable(format!("feedback queue lock poisoned: {error}")))?;
        info!(kind = ?message.kind, "{}", message.text);
        messages.push(message.clone());
        Ok(())
    }
}
