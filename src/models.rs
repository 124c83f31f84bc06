//! Core data models used throughout the ticket responder.
//!
//! These types represent the tickets, stored vectors, and retrieval matches
//! that flow through the submission pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An incoming support ticket, as posted to `POST /submit-ticket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub subject: String,
    pub body: String,
    pub priority: String,
    pub product_names: Vec<String>,
    pub email: String,
}

impl SupportTicket {
    /// Composes the text that gets embedded and hashed at ingestion time.
    ///
    /// Field order is fixed: subject, priority, products, body.
    ///
    /// ```rust
    /// use ticket_responder::models::SupportTicket;
    ///
    /// let ticket = SupportTicket {
    ///     subject: "Login fails".into(),
    ///     body: "Cannot log in after reset".into(),
    ///     priority: "high".into(),
    ///     product_names: vec!["Auth".into(), "SSO".into()],
    ///     email: "u@x.com".into(),
    /// };
    /// assert_eq!(
    ///     ticket.composed_text(),
    ///     "Subject: Login fails\nPriority: high\nProducts: Auth, SSO\nIssue: Cannot log in after reset"
    /// );
    /// ```
    pub fn composed_text(&self) -> String {
        format!(
            "Subject: {}\nPriority: {}\nProducts: {}\nIssue: {}",
            self.subject,
            self.priority,
            self.product_names.join(", "),
            self.body
        )
    }

    /// Index identifier derived from [`composed_text`](Self::composed_text).
    ///
    /// Byte-identical composed text yields the same identifier, so a repeat
    /// submission overwrites the earlier entry.
    pub fn index_id(&self) -> String {
        content_id(&self.composed_text())
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn content_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Ticket fields stored alongside a vector in the index.
///
/// Every field is optional on the read side because historical entries may
/// have been written by other tools; entries written by this crate always
/// carry all five.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TicketMetadata {
    /// Decodes index metadata one field at a time.
    ///
    /// A field with an unexpected type is dropped (and logged) without
    /// affecting the others. Anything other than a JSON object yields
    /// empty metadata.
    pub fn from_stored(value: &serde_json::Value) -> Self {
        let Some(map) = value.as_object() else {
            tracing::warn!(kind = %json_kind(value), "ignoring non-object match metadata");
            return Self::default();
        };
        Self {
            subject: stored_field(map, "subject"),
            body: stored_field(map, "body"),
            priority: stored_field(map, "priority"),
            product_names: stored_field(map, "product_names"),
            email: stored_field(map, "email"),
        }
    }
}

fn stored_field<T: serde::de::DeserializeOwned>(
    map: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<T> {
    let value = map.get(key).filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(field) => Some(field),
        Err(e) => {
            tracing::warn!(field = key, kind = %json_kind(value), error = %e, "dropping malformed metadata field");
            None
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<&SupportTicket> for TicketMetadata {
    fn from(ticket: &SupportTicket) -> Self {
        Self {
            subject: Some(ticket.subject.clone()),
            body: Some(ticket.body.clone()),
            priority: Some(ticket.priority.clone()),
            product_names: Some(ticket.product_names.clone()),
            email: Some(ticket.email.clone()),
        }
    }
}

/// A ticket embedding ready to be written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketVector {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: TicketMetadata,
}

impl TicketVector {
    /// Builds the vector entry for a freshly submitted ticket.
    pub fn from_ticket(ticket: &SupportTicket, values: Vec<f32>) -> Self {
        Self {
            id: ticket.index_id(),
            values,
            metadata: TicketMetadata::from(ticket),
        }
    }
}

/// A stored ticket returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarTicketMatch {
    pub id: String,
    /// Similarity score reported by the index; higher is closer.
    pub score: f32,
    /// 1-based position in the result list.
    pub rank: usize,
    pub metadata: TicketMetadata,
}

/// Result of running one ticket through the whole pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedTicket {
    /// Identifier the ticket was upserted under.
    pub ticket_id: String,
    /// Drafted reply, as sent to the submitter.
    pub response: String,
    /// Matches the reply was drafted from.
    pub similar: Vec<SimilarTicketMatch>,
}
