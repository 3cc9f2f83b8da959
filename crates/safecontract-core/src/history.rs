//! Role-tagged conversation history handed to a completion source.

use serde::{Deserialize, Serialize};

/// Persona preamble used when none is configured.
pub const DEFAULT_PERSONA: &str = "You are an expert Legal Copilot designed to assist with contract review. \
Be precise, cite sources, and maintain a professional tone.";

/// Heading placed in front of retrieved context.
pub const CONTEXT_HEADING: &str = "Additional Context from Company Documents:";

/// Author of a turn.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn of the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Ordered turns for one request: persona, optional context, user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ChatTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the history for a single request.
    pub fn for_request(persona: &str, context: Option<&str>, user_message: &str) -> Self {
        let mut history = Self::new();
        history.push(Role::System, persona);
        if let Some(context) = context {
            history.push(Role::System, format!("{CONTEXT_HEADING}\n{context}"));
        }
        history.push(Role::User, user_message);
        history
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            content: content.into(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Content of the most recent user turn, if any.
    pub fn last_user(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn history_without_context_has_two_turns() {
        let h = ConversationHistory::for_request(DEFAULT_PERSONA, None, "hello");
        let roles: Vec<Role> = h.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert_eq!(h.last_user(), Some("hello"));
    }

    #[test]
    fn context_becomes_second_system_turn() {
        let h = ConversationHistory::for_request("persona", Some("clause text"), "q");
        assert_eq!(h.len(), 3);
        assert_eq!(h.turns()[1].role, Role::System);
        assert_eq!(
            h.turns()[1].content,
            "Additional Context from Company Documents:\nclause text"
        );
        assert_eq!(h.turns()[2].content, "q");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(Role::Assistant.as_ref(), "assistant");
        let json = serde_json::to_string(&ChatTurn {
            role: Role::User,
            content: "x".into(),
        })
        .expect("serialize turn");
        assert_eq!(json, r#"{"role":"user","content":"x"}"#);
    }
}
