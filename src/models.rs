//! Core data models used throughout docqa.
//!
//! These types represent the chunks, sources, and answers that flow through
//! the ingestion and query pipeline.

/// A contiguous slice of a source's extracted text, sized for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Key of the source this chunk came from (file name or URL).
    pub source: String,
}

/// One scored retrieval result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// A metadata row describing one ingested source.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: i64,
    pub file_name: String,
    /// Unix seconds.
    pub upload_time: i64,
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One turn of an in-process conversation.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Ordered, process-local conversation history.
///
/// Lives for one chat session and is never persisted. Turns are appended in
/// pairs only after an answer succeeded, so a failed question leaves the
/// history exactly as it was.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed exchange.
    pub fn record(&mut self, question: &str, answer: &str) {
        self.turns.push(ChatTurn {
            role: Role::User,
            content: question.to_string(),
        });
        self.turns.push(ChatTurn {
            role: Role::Assistant,
            content: answer.to_string(),
        });
    }

    /// Drop all turns. The session continues with an empty history.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// A synthesized answer plus the distinct sources it drew from,
/// in first-retrieved order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_records_in_pairs() {
        let mut convo = Conversation::new();
        assert!(convo.is_empty());

        convo.record("what is the policy?", "the policy says X");
        assert_eq!(convo.turns().len(), 2);
        assert_eq!(convo.turns()[0].role, Role::User);
        assert_eq!(convo.turns()[1].role, Role::Assistant);
    }

    #[test]
    fn conversation_reset_clears_turns() {
        let mut convo = Conversation::new();
        convo.record("q1", "a1");
        convo.record("q2", "a2");
        convo.reset();
        assert!(convo.is_empty());
    }
}
