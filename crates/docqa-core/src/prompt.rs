//! Prompt assembly for retrieval-augmented answers.
//!
//! The language model receives, in order:
//!
//! 1. a system message with answering guidelines followed by the retrieved
//!    chunks, each tagged with its source file and relevance;
//! 2. the user's conversation log, oldest first, as user/assistant messages;
//! 3. the new query as the final user message.

use serde::{Deserialize, Serialize};

use crate::models::{ConversationTurn, RetrievalResult, Role};

/// Role of a chat-completion message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        }
    }
}

/// A single chat-completion message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Answering guidelines placed at the top of every system message.
pub const SYSTEM_INSTRUCTIONS: &str = "You are a helpful AI assistant with access to a knowledge base.
Your task is to answer questions based on the provided context and conversation history.

Guidelines:
1. Answer based primarily on the provided context
2. If the context doesn't contain relevant information, say so clearly
3. Cite sources when possible (mention document names)
4. Maintain conversation continuity using the history
5. Be concise but complete
6. If asked about previous messages, refer to the conversation history";

/// Shown instead of a context block when retrieval found nothing.
pub const NO_CONTEXT_NOTE: &str =
    "No relevant documents were found in the knowledge base. Answer from the conversation if possible, and say that no supporting documents are indexed.";

/// Builds the chat messages for one query.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Concatenate retrieved chunk texts, each tagged with its source.
    pub fn build_context(results: &[RetrievalResult]) -> String {
        if results.is_empty() {
            return NO_CONTEXT_NOTE.to_string();
        }
        let mut context = String::from("Relevant information from documents:\n\n");
        for (i, r) in results.iter().enumerate() {
            context.push_str(&format!(
                "[Document {}] (Source: {}, Relevance: {:.2})\n{}\n\n",
                i + 1,
                r.chunk.source_filename,
                r.similarity_score,
                r.chunk.text
            ));
        }
        context
    }

    /// Full message list: system + context, history oldest-first, then the query.
    pub fn build_messages(
        query: &str,
        results: &[RetrievalResult],
        history: &[ConversationTurn],
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(format!(
            "{}\n\nContext from knowledge base:\n{}",
            SYSTEM_INSTRUCTIONS,
            Self::build_context(results).trim_end()
        )));
        for turn in history {
            messages.push(ChatMessage {
                role: turn.role.into(),
                content: turn.content.clone(),
            });
        }
        messages.push(ChatMessage::user(query));
        messages
    }
}
