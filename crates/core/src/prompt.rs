use crate::models::{Chunk, ConversationTurn};

pub const DEFAULT_INSTRUCTIONS: &str = "You answer questions about the user's PDF documents. \
Use only the numbered context passages below. Cite passages by document and page. \
If the context does not contain the answer, say that you don't know.";

/// Renders the model prompt for one turn: instructions, retrieved context
/// tagged with its source and page, prior turns oldest first, then the question.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instructions: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl PromptBuilder {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    pub fn render(&self, history: &[ConversationTurn], context: &[Chunk], question: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.instructions.trim());
        prompt.push_str("\n\nContext:\n");

        if context.is_empty() {
            prompt.push_str("(no passages retrieved)\n");
        }
        for (position, chunk) in context.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] {}\n{}\n\n",
                position + 1,
                chunk.citation(),
                chunk.text.trim()
            ));
        }

        if !history.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in history {
                prompt.push_str(&format!("User: {}\n", turn.question));
                prompt.push_str(&format!("Assistant: {}\n", turn.answer));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("Question: {question}\nAnswer:"));
        prompt
    }
}
