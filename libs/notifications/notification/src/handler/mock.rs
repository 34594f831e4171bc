//! Mock handler for testing

use super::Handler;
use async_trait::async_trait;
use eyre::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A message captured by [`MockHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Mock handler that captures delivered messages
#[derive(Clone, Default)]
pub struct MockHandler {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<Mutex<Vec<String>>>,
    fail_for: Option<String>,
}

impl MockHandler {
    /// Create a new mock handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock handler that fails every delivery to `recipient`
    pub fn failing_for(recipient: impl Into<String>) -> Self {
        Self {
            fail_for: Some(recipient.into()),
            ..Self::default()
        }
    }

    /// Get all successfully delivered messages
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the count of successfully delivered messages
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Recipients of every `send` call, including failed ones
    pub async fn attempts(&self) -> Vec<String> {
        self.attempts.lock().await.clone()
    }

    /// Check if a message was delivered to a specific recipient
    pub async fn was_sent_to(&self, recipient: &str) -> bool {
        self.sent
            .lock()
            .await
            .iter()
            .any(|m| m.recipient == recipient)
    }
}

#[async_trait]
impl Handler for MockHandler {
    async fn send(&self, sender: &str, recipient: &str, subject: &str, body: &str) -> Result<()> {
        self.attempts.lock().await.push(recipient.to_string());

        if self.fail_for.as_deref() == Some(recipient) {
            return Err(eyre::eyre!("mock delivery to {} failed", recipient));
        }

        self.sent.lock().await.push(SentMessage {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });

        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_handler_records_message() {
        let handler = MockHandler::new();

        handler
            .send("noreply@example.com", "alice@example.com", "Hi", "<p>Hi</p>")
            .await
            .unwrap();

        let sent = handler.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "alice@example.com");
        assert_eq!(sent[0].body, "<p>Hi</p>");
        assert!(handler.was_sent_to("alice@example.com").await);
    }

    #[tokio::test]
    async fn test_mock_handler_fails_for_recipient() {
        let handler = MockHandler::failing_for("bob@example.com");

        handler
            .send("s", "alice@example.com", "Hi", "Hi")
            .await
            .unwrap();
        let err = handler.send("s", "bob@example.com", "Hi", "Hi").await;

        assert!(err.unwrap_err().to_string().contains("bob@example.com"));
        assert_eq!(handler.sent_count().await, 1);
        assert_eq!(
            handler.attempts().await,
            vec!["alice@example.com", "bob@example.com"]
        );
    }
}
