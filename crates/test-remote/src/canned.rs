//! Canned replies and demo threads for [`TestBackend`](crate::TestBackend).

use haven_remote::{HistoryMessage, TranscriptRole};

/// The default canned reply set.
pub fn default_replies() -> Vec<String> {
    [
        "This is a mock GPT response.",
        "I understand what you're asking. This is a simulated AI response for demonstration purposes.",
        "That's an interesting question! Here's a mock response to show how the chat interface works.",
        "Thank you for your message. This is an automated response to simulate AI interaction.",
        "I'm here to help! This is a placeholder response while we demonstrate the chat functionality.",
        "Great point! This mock response shows how the conversation flow works in this demo.",
        "I see what you mean. This is a simulated response to keep the conversation going.",
        "That's a thoughtful message. Here's a mock AI response to demonstrate the interface.",
    ]
    .map(str::to_owned)
    .to_vec()
}

fn human(content: &str) -> HistoryMessage {
    HistoryMessage {
        role: TranscriptRole::Human,
        content: content.to_owned(),
    }
}

fn ai(content: &str) -> HistoryMessage {
    HistoryMessage {
        role: TranscriptRole::Ai,
        content: content.to_owned(),
    }
}

/// A few ready-made conversations for the demo mode, in recency
/// order.
pub fn demo_threads() -> Vec<(String, Vec<HistoryMessage>)> {
    vec![
        (
            "demo-coding".to_owned(),
            vec![
                human("Can you help me with a coding problem?"),
                ai("Absolutely! I'd be happy to help you with your coding problem. \
                    Please share the details of what you're working on."),
            ],
        ),
        (
            "demo-web".to_owned(),
            vec![human(
                "What are some good practices for web development?",
            )],
        ),
        ("demo-empty".to_owned(), Vec::new()),
    ]
}
