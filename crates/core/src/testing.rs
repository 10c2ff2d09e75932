use crate::error::ServiceError;
use crate::models::Chunk;
use crate::traits::{EmbeddingService, LanguageModel};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub(crate) fn chunk(source: &str, page: u32, ordinal: u64, text: &str) -> Chunk {
    Chunk {
        chunk_id: format!("{source}#{page}#{ordinal}"),
        source: source.to_string(),
        page,
        ordinal,
        start: 0,
        text: text.to_string(),
    }
}

/// Returns a fixed vector per known text and a zero vector otherwise.
pub(crate) struct KeyedEmbedder {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
    failure: Mutex<Option<ServiceError>>,
    next_failures: Mutex<VecDeque<ServiceError>>,
    calls: Mutex<usize>,
    pub(crate) batches: Mutex<Vec<usize>>,
}

impl KeyedEmbedder {
    pub(crate) fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
            failure: Mutex::new(None),
            next_failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: &[f32]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }

    pub(crate) fn fail_with(&self, error: ServiceError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Fails a single upcoming call; queued failures are consumed in order.
    pub(crate) fn fail_next(&self, error: ServiceError) {
        self.next_failures.lock().unwrap().push_back(error);
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl EmbeddingService for KeyedEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        if let Some(error) = self.next_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.batches.lock().unwrap().push(texts.len());
        Ok(texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimensions])
            })
            .collect())
    }
}

/// Replays queued responses and records every prompt it receives.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ServiceError>>>,
    pub(crate) prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub(crate) fn respond(&self, response: Result<String, ServiceError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("answer {call}")))
    }
}
