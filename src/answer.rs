use crate::chunking::TextChunk;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One previous message in a conversation about a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `user` or `assistant`
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Produces an answer from a question, ranked context chunks and recent turns
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        context: &[TextChunk],
        history: &[ChatTurn],
    ) -> Result<String>;
}

#[async_trait]
impl<T: AnswerGenerator + ?Sized> AnswerGenerator for Arc<T> {
    async fn generate(
        &self,
        question: &str,
        context: &[TextChunk],
        history: &[ChatTurn],
    ) -> Result<String> {
        (**self).generate(question, context, history).await
    }
}

/// The last `window` turns of a conversation
pub fn recent_history(history: &[ChatTurn], window: usize) -> &[ChatTurn] {
    &history[history.len().saturating_sub(window)..]
}

/// Render context chunks in rank order as numbered blocks
pub fn format_context(context: &[TextChunk]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Chunk {}:\n{}", i + 1, chunk.text))
        .collect::<Vec<String>>()
        .join("\n\n")
}

/// System instruction restricting the model to the retrieved context
pub fn system_prompt(context: &[TextChunk]) -> String {
    format!(
        "You are a document assistant that helps users understand their documents.\n\
         Answer the user's question using ONLY the context below, which was extracted from their document.\n\
         If the context does not contain the answer, say so plainly and offer any closely related information it does contain.\n\
         Never invent facts that are not in the context.\n\n\
         CONTEXT:\n{}\n",
        format_context(context)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> TextChunk {
        TextChunk {
            index,
            text: text.to_string(),
            start_position: 0,
            end_position: text.chars().count(),
        }
    }

    #[test]
    fn test_recent_history_keeps_last_turns() {
        let history: Vec<ChatTurn> = (0..14).map(|i| ChatTurn::user(i.to_string())).collect();
        let recent = recent_history(&history, 10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "4");
        assert_eq!(recent[9].content, "13");
        assert_eq!(recent_history(&history[..3], 10).len(), 3);
        assert!(recent_history(&history, 0).is_empty());
    }

    #[test]
    fn test_context_is_numbered_in_rank_order() {
        let context = vec![chunk(7, "seventh"), chunk(2, "second")];
        assert_eq!(
            format_context(&context),
            "Chunk 1:\nseventh\n\nChunk 2:\nsecond"
        );
        assert!(system_prompt(&context).contains("CONTEXT:\nChunk 1:\nseventh"));
    }
}
