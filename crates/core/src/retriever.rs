use crate::error::ChatError;
use crate::index::VectorIndex;
use crate::models::{Answer, ConversationTurn};
use crate::prompt::PromptBuilder;
use crate::traits::LanguageModel;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Append-only record of answered turns, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: Vec<ConversationTurn>,
}

impl ChatHistory {
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }
}

#[derive(Debug)]
enum RetrieverState {
    Idle,
    Ready {
        index: VectorIndex,
        history: ChatHistory,
    },
}

/// Idle until an index is bound, then Ready for good. Failed turns are not recorded.
pub struct ConversationalRetriever {
    state: RetrieverState,
    model: Arc<dyn LanguageModel>,
    top_k: usize,
    prompt: PromptBuilder,
}

impl ConversationalRetriever {
    pub fn new(model: Arc<dyn LanguageModel>, top_k: usize) -> Self {
        Self {
            state: RetrieverState::Idle,
            model,
            top_k,
            prompt: PromptBuilder::default(),
        }
    }

    /// A retriever that is already bound to `index`, with an empty history.
    pub fn ready(model: Arc<dyn LanguageModel>, top_k: usize, index: VectorIndex) -> Self {
        Self {
            state: RetrieverState::Ready {
                index,
                history: ChatHistory::default(),
            },
            ..Self::new(model, top_k)
        }
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, RetrieverState::Ready { .. })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn bind(&mut self, index: VectorIndex) -> Result<(), ChatError> {
        if self.is_ready() {
            return Err(ChatError::AlreadyInitialized);
        }
        self.state = RetrieverState::Ready {
            index,
            history: ChatHistory::default(),
        };
        Ok(())
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        match &self.state {
            RetrieverState::Ready { index, .. } => Some(index),
            RetrieverState::Idle => None,
        }
    }

    pub fn history(&self) -> Option<&ChatHistory> {
        match &self.state {
            RetrieverState::Ready { history, .. } => Some(history),
            RetrieverState::Idle => None,
        }
    }

    #[instrument(skip(self), fields(model = self.model.model_name(), top_k = self.top_k))]
    pub async fn answer(&mut self, question: &str) -> Result<Answer, ChatError> {
        let RetrieverState::Ready { index, history } = &mut self.state else {
            return Err(ChatError::NotInitialized);
        };

        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let sources = index.search(question, self.top_k).await?;
        let prompt = self.prompt.render(history.turns(), &sources, question);
        debug!(sources = sources.len(), prompt_chars = prompt.len(), "prompt built");

        let text = self.model.complete(&prompt).await?;

        history.push(ConversationTurn {
            question: question.to_string(),
            answer: text.clone(),
            sources: sources.clone(),
            asked_at: Utc::now(),
        });

        Ok(Answer { text, sources })
    }
}
