//! Fetched email.

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};

/// Maximum length of the preview snippet, in characters.
const SNIPPET_LEN: usize = 100;

/// An email handed over by an email source.
///
/// Immutable once fetched: the pipeline only moves it from the Fetch stage to
/// the Submit stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Mailbox-native message id.
    pub external_id: String,
    pub subject: String,
    /// Size of the raw message in bytes.
    pub size: i64,
    pub received_at: DateTime<Utc>,
    /// Short preview of the body.
    pub snippet: String,
    /// Full raw content, byte for byte. The encoding is defined by the email
    /// source and is passed to the job service untouched.
    pub content: Vec<u8>,
}

impl Email {
    /// Build an email from a raw RFC 822 message.
    ///
    /// Missing headers degrade gracefully: no subject gives an empty subject,
    /// no parseable `Date` gives the current time.
    pub fn from_rfc822(external_id: impl Into<String>, raw: &[u8]) -> Self {
        let parsed = MessageParser::default().parse(raw);

        let subject = parsed
            .as_ref()
            .and_then(|m| m.subject())
            .unwrap_or_default()
            .to_string();

        let received_at = parsed
            .as_ref()
            .and_then(|m| m.date())
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
            .unwrap_or_else(Utc::now);

        let snippet = parsed
            .as_ref()
            .and_then(|m| m.body_text(0))
            .map(|body| make_snippet(&body))
            .unwrap_or_default();

        Self {
            external_id: external_id.into(),
            subject,
            size: raw.len() as i64,
            received_at,
            snippet,
            content: raw.to_vec(),
        }
    }
}

fn make_snippet(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(SNIPPET_LEN).collect()
}
