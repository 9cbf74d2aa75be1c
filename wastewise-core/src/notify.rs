//! Template-based notifications sent to residents as a best-effort side channel.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::ResidentId;

/// Values substituted into `{name}` placeholders.
pub type TemplateVars = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Title and body text with `{name}` placeholders.
pub struct NotificationTemplate {
    /// Short headline.
    pub title: String,
    /// Message body.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Rendered notification addressed to a resident.
pub struct Notification {
    /// Unique identifier.
    pub id: String,
    /// Recipient.
    pub resident_id: ResidentId,
    /// Key of the template it was rendered from.
    pub template: String,
    /// Rendered headline.
    pub title: String,
    /// Rendered body.
    pub message: String,
    /// Time of dispatch.
    pub sent_at: NaiveDateTime,
    /// Whether the resident has opened it.
    pub read: bool,
}

/// Replace every `{name}` placeholder that has a value in `vars`.
///
/// Placeholders without a value and unmatched braces are kept verbatim.
#[must_use]
pub fn render_template(text: &str, vars: &TemplateVars) -> String {
    let mut rendered = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((before, after_open)) = rest.split_once('{') {
        rendered.push_str(before);
        match after_open.split_once('}') {
            Some((name, after_close)) if is_placeholder_name(name) => {
                if let Some(value) = vars.get(name) {
                    rendered.push_str(value);
                } else {
                    rendered.push('{');
                    rendered.push_str(name);
                    rendered.push('}');
                }
                rest = after_close;
            }
            _ => {
                rendered.push('{');
                rest = after_open;
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// In-memory record of every notification sent.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<Notification>>,
}

impl Outbox {
    /// Render `template` for `resident_id` and record it.
    pub fn send(
        &self,
        resident_id: &ResidentId,
        key: &str,
        template: &NotificationTemplate,
        vars: &TemplateVars,
        now: NaiveDateTime,
    ) -> Notification {
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        let notification = Notification {
            id: format!("NT-{}-{}", now.and_utc().timestamp_millis(), sent.len() + 1),
            resident_id: resident_id.clone(),
            template: key.to_owned(),
            title: render_template(&template.title, vars),
            message: render_template(&template.body, vars),
            sent_at: now,
            read: false,
        };
        sent.push(notification.clone());
        notification
    }

    /// Notifications for a resident, newest first.
    #[must_use]
    pub fn for_resident(&self, resident_id: &ResidentId) -> Vec<Notification> {
        let sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.iter()
            .rev()
            .filter(|notification| &notification.resident_id == resident_id)
            .cloned()
            .collect()
    }
}
