//! Template rendering utilities using Tera
//!
//! Renders the notification sent once a document has been persisted
//! remotely.

use chrono::{DateTime, Utc};
use serde_json::json;
use tera::{Context, Tera};

use crate::Result;

pub const NOTIFICATION_SUBJECT: &str = "Document Uploaded Successfully - Automation Workflow";

const TEXT_TEMPLATE: &str = "Your document \"{{ document }}\" has been uploaded successfully.\
{% if link %}\nView in Drive: {{ link }}{% endif %}";

const HTML_TEMPLATE: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2>Document Upload Notification</h2>
  <p><strong>Success!</strong> Your document has been processed by the automation workflow.</p>
  <p><strong>Document Name:</strong></p>
  <p style="font-family: monospace;">{{ document }}</p>
  {% if link %}<p><a href="{{ link }}">View in Google Drive</a></p>{% endif %}
  <p><strong>Workflow Steps Completed:</strong></p>
  <ul>
    {% for step in steps %}<li>{{ step }}</li>{% endfor %}
  </ul>
  <p><strong>Timestamp:</strong> {{ timestamp }}</p>
  <p style="color: #999; font-size: 12px;">This is an automated email from Document Automation System</p>
</div>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn render_named(name: &str, template: &str, context: &Context) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template(name, template)?;
    Ok(tera.render(name, context)?)
}

pub fn render_notification(
    document: &str,
    link: Option<&str>,
    at: DateTime<Utc>,
) -> Result<RenderedMessage> {
    let context = Context::from_serialize(json!({
        "document": document,
        "link": link,
        "timestamp": at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        "steps": [
            "Document uploaded",
            "Folder created in Google Drive",
            "Email notification sent",
        ],
    }))?;

    // The .html name turns on Tera's autoescaping for the html body only.
    Ok(RenderedMessage {
        subject: NOTIFICATION_SUBJECT.to_string(),
        text: render_named("notification.txt", TEXT_TEMPLATE, &context)?,
        html: render_named("notification.html", HTML_TEMPLATE, &context)?,
    })
}
