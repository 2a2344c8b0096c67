//! Qualification heuristics over a finished assistant reply.
//!
//! Both predicates are intentionally fuzzy string signals, kept behind
//! named functions so a stricter rule can replace them without touching
//! the chat pipeline. Note the known conflation: a reply that merely
//! discusses email addresses also matches `is_qualified`.

use chrono::Utc;
use serde_json::json;

/// Has this conversation yielded enough to hand off to a human?
/// Signal: the reply mentions an email address, or the conversation is
/// already longer than `message_threshold` messages.
pub fn is_qualified(full_response: &str, message_count: usize, message_threshold: usize) -> bool {
    full_response.contains('@') || message_count > message_threshold
}

/// Did the reply present an automation blueprint?
pub fn mentions_blueprint(full_response: &str) -> bool {
    let lower = full_response.to_lowercase();
    lower.contains("blueprint") || lower.contains("plan prêt")
}

/// Payload stored on the conversation when qualification triggers.
pub fn qualification_data(message_count: usize) -> serde_json::Value {
    json!({
        "messages": message_count,
        "timestamp": Utc::now().to_rfc3339(),
    })
}
