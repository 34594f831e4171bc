//! The notification entity.

use crate::error::{NotificationError, NotificationResult};
use crate::template::{is_valid_name, Template};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// A named message bound to its recipients and template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "ref")]
    pub reference: String,
    pub template_name: String,
    pub recipients: Vec<String>,
    #[serde(skip)]
    template: Option<Arc<Template>>,
}

impl Notification {
    pub fn new(
        reference: impl Into<String>,
        template_name: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            template_name: template_name.into(),
            recipients,
            template: None,
        }
    }

    /// Bind the template used by [`Notification::send`].
    pub fn init_template(&mut self, template: Arc<Template>) {
        self.template = Some(template);
    }

    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    /// Validate ref, template name and recipients, in that order.
    pub fn check(&self) -> NotificationResult<()> {
        if self.reference.is_empty() {
            return Err(NotificationError::invalid(&self.reference, "empty ref"));
        }

        if !is_valid_name(&self.template_name) {
            return Err(NotificationError::invalid(
                &self.reference,
                format!("invalid template name {}", self.template_name),
            ));
        }

        if self.recipients.is_empty() {
            return Err(NotificationError::invalid(
                &self.reference,
                "empty recipient list",
            ));
        }

        Ok(())
    }

    /// Render subject and body, then deliver to each recipient in order.
    ///
    /// Stops at the first failed delivery; later recipients are not attempted.
    pub async fn send(&self, sender: &str, data: &Map<String, Value>) -> NotificationResult<()> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| NotificationError::TemplateNotBound(self.reference.clone()))?;

        let subject = template.render_subject(data)?;
        let body = template.render_body(data)?;
        let handler = template.handler();

        for recipient in &self.recipients {
            if let Err(e) = handler.send(sender, recipient, &subject, &body).await {
                warn!(
                    notification = %self.reference,
                    handler = handler.name(),
                    recipient = %recipient,
                    error = %e,
                    "Delivery failed, skipping remaining recipients"
                );
                return Err(NotificationError::Delivery {
                    recipient: recipient.clone(),
                    source: e.into(),
                });
            }
        }

        debug!(
            notification = %self.reference,
            template = %template.name(),
            recipients = self.recipients.len(),
            "Notification sent"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Handler, HandlerTable, MockHandler};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn recipients(list: &[&str]) -> Vec<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    fn bound(handler: MockHandler, dir: &TempDir, subject: &str, rcpts: &[&str]) -> Notification {
        let subject_path = dir.path().join("subject.hbs");
        let body_path = dir.path().join("body.hbs");
        fs::write(&subject_path, subject).unwrap();
        fs::write(&body_path, "<b>{{file}}</b>").unwrap();

        let mut handlers = HandlerTable::new();
        handlers.insert("mock".into(), Arc::new(handler) as Arc<dyn Handler>);

        let template = Template::new(
            match json!({
                "name": "file-shared",
                "handler": "mock",
                "subject_template_path": subject_path,
                "body_template_path": body_path,
            }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
            &handlers,
        )
        .unwrap();

        let mut notification = Notification::new("share-1", "file-shared", recipients(rcpts));
        notification.init_template(Arc::new(template));
        notification
    }

    fn params() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("file".into(), json!("a&b.txt"));
        map
    }

    #[test]
    fn test_check_rejects_invalid() {
        let cases = [
            (Notification::new("", "x", recipients(&["a"])), "empty ref"),
            (
                Notification::new("r", "bad name!", recipients(&["a"])),
                "invalid template name bad name!",
            ),
            (Notification::new("r", "ok-1", vec![]), "empty recipient list"),
        ];

        for (notification, msg) in cases {
            let err = notification.check().unwrap_err();
            match err {
                NotificationError::InvalidNotification { reference, msg: got } => {
                    assert_eq!(reference, notification.reference);
                    assert_eq!(got, msg);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_check_reports_ref_first() {
        let notification = Notification::new("", "bad name!", vec![]);
        let err = notification.check().unwrap_err();
        assert_eq!(err.to_string(), "empty ref");
    }

    #[test]
    fn test_check_accepts_valid() {
        let notification = Notification::new("r1", "welcome-en", recipients(&["a@x.com"]));
        assert!(notification.check().is_ok());
    }

    #[test]
    fn test_wire_format_skips_template() {
        let notification = Notification::new("r1", "welcome-en", recipients(&["a@x.com"]));
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(
            value,
            json!({"ref": "r1", "template_name": "welcome-en", "recipients": ["a@x.com"]})
        );

        let parsed: Notification = serde_json::from_value(value).unwrap();
        assert!(parsed.template().is_none());
        assert_eq!(parsed.reference, "r1");
    }

    #[tokio::test]
    async fn test_send_without_template() {
        let notification = Notification::new("r1", "welcome-en", recipients(&["a@x.com"]));
        let err = notification.send("s", &Map::new()).await.unwrap_err();
        assert!(matches!(err, NotificationError::TemplateNotBound(ref r) if r == "r1"));
    }

    #[tokio::test]
    async fn test_send_delivers_to_every_recipient() {
        let dir = TempDir::new().unwrap();
        let handler = MockHandler::new();
        let notification = bound(handler.clone(), &dir, "Shared {{file}}", &["a@x.com", "b@x.com"]);

        notification.send("noreply@x.com", &params()).await.unwrap();

        let sent = handler.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipient, "a@x.com");
        assert_eq!(sent[1].recipient, "b@x.com");
        assert_eq!(sent[0].sender, "noreply@x.com");
        assert_eq!(sent[0].subject, "Shared a&b.txt");
        assert_eq!(sent[0].body, "<b>a&amp;b.txt</b>");
    }

    #[tokio::test]
    async fn test_send_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let handler = MockHandler::failing_for("second@x.com");
        let notification = bound(
            handler.clone(),
            &dir,
            "Shared {{file}}",
            &["first@x.com", "second@x.com", "third@x.com"],
        );

        let err = notification.send("s", &params()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Delivery { ref recipient, .. } if recipient == "second@x.com"));

        assert_eq!(handler.attempts().await, vec!["first@x.com", "second@x.com"]);
        assert_eq!(handler.sent_count().await, 1);
        assert!(handler.was_sent_to("first@x.com").await);
        assert!(!handler.was_sent_to("third@x.com").await);
    }

    #[tokio::test]
    async fn test_subject_failure_skips_delivery() {
        let dir = TempDir::new().unwrap();
        let handler = MockHandler::new();
        let notification = bound(handler.clone(), &dir, "Hello {{missing}}", &["a@x.com"]);

        let err = notification.send("s", &params()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Template(_)));
        assert!(handler.attempts().await.is_empty());
    }
}
