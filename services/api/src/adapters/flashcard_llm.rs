//! services/api/src/adapters/flashcard_llm.rs
//!
//! This module contains the adapter for the flashcard-generating LLM.
//! It implements the `FlashcardGenerationService` port from the `core` crate.

use crate::adapters::llm_support::{complete_chat, strip_code_fence};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use serde::Deserialize;
use study_aid_core::{
    domain::FlashcardDraft,
    ports::{FlashcardGenerationService, PortError, PortResult},
};
use tracing::warn;

const SYSTEM_PROMPT: &str = r#"Based on the provided explanation, write 3-5 flashcards that test understanding.
- Ask "why" and "how" questions, not just "what".
- Keep each answer to 1-3 short sentences.
- Match the tone of the explanation and avoid jargon it did not define.

Respond ONLY with a JSON object and nothing else:
{"flashcards": [{"front": "question", "back": "answer"}]}"#;

/// An adapter that implements `FlashcardGenerationService` using an OpenAI-compatible LLM.
///
/// A transient failure on the primary model is retried once on the fallback model.
#[derive(Clone)]
pub struct OpenAiFlashcardAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    fallback_model: String,
}

impl OpenAiFlashcardAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String, fallback_model: String) -> Self {
        Self {
            client,
            model,
            fallback_model,
        }
    }
}

#[derive(Deserialize)]
struct CardPayload {
    front: String,
    back: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeckPayload {
    Envelope { flashcards: Vec<CardPayload> },
    Bare(Vec<CardPayload>),
}

pub(crate) fn parse_flashcard_payload(content: &str) -> PortResult<Vec<FlashcardDraft>> {
    let payload: DeckPayload = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| PortError::MalformedOutput(e.to_string()))?;
    let cards = match payload {
        DeckPayload::Envelope { flashcards } => flashcards,
        DeckPayload::Bare(cards) => cards,
    };
    Ok(cards
        .into_iter()
        .filter(|c| !c.front.trim().is_empty() && !c.back.trim().is_empty())
        .map(|c| FlashcardDraft::new(c.front.trim(), c.back.trim()))
        .collect())
}

#[async_trait]
impl FlashcardGenerationService for OpenAiFlashcardAdapter {
    async fn generate_flashcards(
        &self,
        topic: &str,
        explanation: &str,
    ) -> PortResult<Vec<FlashcardDraft>> {
        let user = format!("Topic: {}\n\nExplanation: {}", topic, explanation);

        let content = match complete_chat(&self.client, &self.model, SYSTEM_PROMPT, user.clone()).await
        {
            Err(PortError::Transient(detail)) => {
                warn!(
                    "Model {} unavailable ({}), retrying with {}",
                    self.model, detail, self.fallback_model
                );
                complete_chat(&self.client, &self.fallback_model, SYSTEM_PROMPT, user).await?
            }
            other => other?,
        };

        parse_flashcard_payload(&content)
    }
}
