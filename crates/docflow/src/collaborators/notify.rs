use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::{Delivery, Notifier};
use crate::config::MailConfig;
use crate::template::render_notification;
use crate::{Error, Result};

/// Sends mail through an HTTP relay that accepts a JSON message.
#[derive(Clone)]
pub struct RelayNotifier {
    client: reqwest::Client,
    relay_url: Option<String>,
    api_key: Option<String>,
    from: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayReceipt {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
}

impl RelayNotifier {
    pub fn new(config: &MailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            relay_url: config.relay_url.clone(),
            api_key: config.api_key.clone(),
            from: format!("\"{}\" <{}>", config.from_name, config.from_address),
        }
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    async fn notify(&self, subject_name: &str, recipient: &str, link: &str) -> Result<Delivery> {
        let relay_url = self.relay_url.as_deref().ok_or_else(|| {
            Error::Config("Mail relay not configured. Please set MAIL_RELAY_URL.".to_string())
        })?;

        let message = render_notification(subject_name, Some(link), Utc::now())?;
        let mut request = self.client.post(relay_url).json(&json!({
            "from": self.from,
            "to": recipient,
            "subject": message.subject,
            "text": message.text,
            "html": message.html,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "mail relay rejected message (status {}): {}",
                status, body
            )));
        }

        // Relays differ in what they answer with; a missing id is still a delivery.
        let receipt: RelayReceipt = response.json().await.unwrap_or_default();
        let message_id = receipt.message_id.or(receipt.id);

        info!(recipient = %recipient, message_id = ?message_id, "Email sent successfully");

        Ok(Delivery {
            recipient: recipient.to_string(),
            message_id,
        })
    }
}

/// Writes the rendered notification to stdout instead of delivering it.
#[derive(Debug, Clone)]
pub struct StdoutNotifier {
    from: String,
    pretty: bool,
}

impl StdoutNotifier {
    pub fn new(config: &MailConfig, pretty: bool) -> Self {
        Self {
            from: format!("\"{}\" <{}>", config.from_name, config.from_address),
            pretty,
        }
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(&self, subject_name: &str, recipient: &str, link: &str) -> Result<Delivery> {
        let message = render_notification(subject_name, Some(link), Utc::now())?;
        let envelope = json!({
            "from": self.from,
            "to": recipient,
            "subject": message.subject,
            "text": message.text,
        });

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&envelope)?
        } else {
            serde_json::to_string(&envelope)?
        };
        println!("{}", rendered);

        Ok(Delivery {
            recipient: recipient.to_string(),
            message_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierKind;

    fn mail_config(relay_url: Option<&str>) -> MailConfig {
        MailConfig {
            notifier: NotifierKind::Relay,
            relay_url: relay_url.map(String::from),
            api_key: None,
            from_name: "Docs".to_string(),
            from_address: "docs@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn relay_without_url_fails_with_config_error() {
        let notifier = RelayNotifier::new(&mail_config(None));
        let err = notifier
            .notify("report.pdf", "a@b.co", "https://link")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn from_header_quotes_display_name() {
        let notifier = RelayNotifier::new(&mail_config(None));
        assert_eq!(notifier.from, "\"Docs\" <docs@example.com>");
    }

    #[tokio::test]
    async fn stdout_notifier_always_delivers() {
        let notifier = StdoutNotifier::new(&mail_config(None), false);
        let delivery = notifier
            .notify("report.pdf", "a@b.co", "https://link")
            .await
            .unwrap();
        assert_eq!(delivery.recipient, "a@b.co");
        assert!(delivery.message_id.is_none());
    }
}
