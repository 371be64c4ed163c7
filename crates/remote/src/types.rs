use serde::{Deserialize, Serialize};

/// One row of the conversation listing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The opaque session identifier.
    pub session_id: String,
    /// Number of messages stored for this session.
    pub messages: u64,
    /// Timestamp of the last activity, if the service reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

/// The author of a transcript message, in the service's vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// A user-authored message.
    Human,
    /// An assistant-authored message.
    Ai,
}

/// One message of a fetched transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// The author of the message.
    pub role: TranscriptRole,
    /// The message text.
    pub content: String,
}

/// A request to send one user message within a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The session the message belongs to.
    pub session_id: String,
    /// The user message text.
    pub message: String,
}

/// The assistant's reply to a chat request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatReply {
    /// The assistant's answer text.
    pub answer: String,
    /// Titles of the source documents the answer drew from, if the
    /// service supplies them.
    #[serde(default)]
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_vocabulary() {
        let history: Vec<HistoryMessage> = serde_json::from_value(json!([
            { "role": "human", "content": "Hello" },
            { "role": "ai", "content": "Hi there!" },
        ]))
        .unwrap();
        assert_eq!(history[0].role, TranscriptRole::Human);
        assert_eq!(history[1].role, TranscriptRole::Ai);
    }

    #[test]
    fn test_optional_fields_default() {
        let summary: ConversationSummary = serde_json::from_value(json!({
            "session_id": "abc",
            "messages": 4,
        }))
        .unwrap();
        assert_eq!(summary.last_activity, None);

        let reply: ChatReply =
            serde_json::from_value(json!({ "answer": "ok" })).unwrap();
        assert!(reply.sources.is_empty());
    }
}
