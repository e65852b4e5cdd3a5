//! services/api/src/adapters/explanation_llm.rs
//!
//! This module contains the adapter for the explanation-generating LLM.
//! It implements the `ExplanationGenerationService` port from the `core` crate.

const SYSTEM_PROMPT: &str = r#"You are a patient tutor helping a tired college student understand a topic late at night.

For the topic you are given, write three explanations of increasing depth.

LEVEL 1 (simplest): at most 100 words. Open with one concrete everyday analogy and keep that single analogy throughout. State the idea in one jargon-free sentence, walk through it in 2-3 parts using "First... Then... Finally", give one memorable hook in **bold**, and close with "Now you can say: <one simple summary sentence>".

LEVEL 2 (standard): at most 150 words. Start with "Building on the analogy...". Introduce at most four technical terms, each in **bold** and defined the moment it appears. Explain why the mechanism works, give one real-world application, and end with "Ask yourself: Why does <X> happen?".

LEVEL 3 (deep): at most 200 words. Place the concept in its wider theory, explain the mechanism precisely as numbered steps ("1. Title - detail"), address one common misconception or edge case, connect it to research or professional practice, and finish with a line starting "Key Takeaway:".

Respond ONLY with a JSON object and nothing else:
{"simplest": "...", "standard": "...", "deep": "..."}"#;

use crate::adapters::llm_support::{complete_chat, strip_code_fence};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use serde::Deserialize;
use study_aid_core::{
    domain::Explanations,
    ports::{ExplanationGenerationService, PortError, PortResult},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ExplanationGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiExplanationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiExplanationAdapter {
    /// Creates a new `OpenAiExplanationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[derive(Deserialize)]
struct ExplanationPayload {
    simplest: String,
    standard: String,
    #[serde(alias = "deepDive", alias = "deep_dive")]
    deep: String,
}

/// Reads the model's JSON envelope into the three explanation texts.
pub(crate) fn parse_explanation_payload(content: &str) -> PortResult<Explanations> {
    let payload: ExplanationPayload = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| PortError::MalformedOutput(e.to_string()))?;
    Ok(Explanations {
        simplest: payload.simplest,
        standard: payload.standard,
        deep_dive: payload.deep,
    })
}

//=========================================================================================
// `ExplanationGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ExplanationGenerationService for OpenAiExplanationAdapter {
    async fn generate_explanations(&self, topic: &str) -> PortResult<Explanations> {
        let content = complete_chat(
            &self.client,
            &self.model,
            SYSTEM_PROMPT,
            format!("Explain this concept: {}", topic),
        )
        .await?;
        parse_explanation_payload(&content)
    }
}
