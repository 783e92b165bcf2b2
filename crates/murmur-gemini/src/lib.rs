// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gemini provider adapter for the Murmur mesh bridge.
//!
//! Implements [`AiProvider`] over the generateContent API. History roles
//! map user -> `user` and assistant -> `model`; persona and rolling summary
//! travel in the system instruction.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

use murmur_config::model::{GatewayConfig, GeminiConfig};
use murmur_core::prompts;
use murmur_core::types::{ContextWindow, MeshMessage, Role, TriageVerdict};
use murmur_core::{AiProvider, GatewayError, MurmurError};

use crate::client::GeminiClient;
use crate::types::{Content, GenerateRequest, GenerationConfig, Part};

/// Token budget for the one-word triage answer.
const TRIAGE_MAX_TOKENS: u32 = 5;

/// The Gemini-backed provider.
#[derive(Debug)]
pub struct GeminiProvider {
    client: GeminiClient,
    model: String,
    triage_model: String,
}

impl GeminiProvider {
    /// Builds the provider from config. Fails when no API key is set.
    pub fn from_config(cfg: &GeminiConfig, gateway: &GatewayConfig) -> Result<Self, MurmurError> {
        let api_key = cfg
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MurmurError::Config("gemini.api_key is not set".into()))?;
        let client = GeminiClient::new(
            api_key,
            Duration::from_secs(gateway.request_timeout_secs),
        )?;
        Ok(Self {
            client,
            model: cfg.model.clone(),
            triage_model: cfg.triage_model.clone(),
        })
    }

    #[cfg(test)]
    fn for_tests(client: GeminiClient) -> Self {
        Self {
            client,
            model: "gemini-1.5-flash".into(),
            triage_model: "gemini-1.5-flash".into(),
        }
    }
}

/// Builds the generateContent request for a persona reply.
fn build_reply_request(
    persona: &str,
    context: &ContextWindow,
    message: &MeshMessage,
) -> GenerateRequest {
    let mut system_parts = vec![Part {
        text: persona.to_string(),
    }];
    if let Some(summary) = &context.summary {
        system_parts.push(Part {
            text: prompts::summary_system_line(summary),
        });
    }

    let mut contents = Vec::with_capacity(context.turns.len() + 1);
    for turn in &context.turns {
        match turn.role {
            Role::Assistant => contents.push(Content::model(turn.text.clone())),
            // Stray system turns are folded into user content; Gemini only
            // accepts user/model roles in the history.
            Role::User | Role::System => contents.push(Content::user(turn.text.clone())),
        }
    }

    let attribution = prompts::user_attribution(&message.sender_name, message.sender);
    contents.push(Content::user(format!(
        "{attribution} says: {}",
        message.text
    )));

    GenerateRequest {
        system_instruction: Some(Content {
            role: None,
            parts: system_parts,
        }),
        contents,
        generation_config: None,
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_reply(
        &self,
        persona: &str,
        context: &ContextWindow,
        message: &MeshMessage,
    ) -> Result<String, GatewayError> {
        let request = build_reply_request(persona, context, message);
        self.client.generate(&self.model, &request).await
    }

    async fn classify_triage(
        &self,
        persona: &str,
        recent: &[String],
        newest: &MeshMessage,
    ) -> Result<TriageVerdict, GatewayError> {
        let request = GenerateRequest {
            system_instruction: Some(Content::system(prompts::triage_system_prompt(persona))),
            contents: vec![Content::user(prompts::triage_query(
                recent,
                &newest.sender_name,
                &newest.text,
            ))],
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(TRIAGE_MAX_TOKENS),
                temperature: Some(0.0),
            }),
        };
        let decision = self.client.generate(&self.triage_model, &request).await?;
        if decision.trim().to_uppercase() == "YES" {
            Ok(TriageVerdict::Yes)
        } else {
            Ok(TriageVerdict::No)
        }
    }

    async fn summarize(&self, text: &str, max_chars: usize) -> Result<String, GatewayError> {
        if text.trim().is_empty() {
            return Err(GatewayError::Unknown("nothing to summarize".into()));
        }
        let request = GenerateRequest {
            system_instruction: Some(Content::system(prompts::summarizer_persona(max_chars))),
            contents: vec![Content::user(text.to_string())],
            generation_config: None,
        };
        let summary = self.client.generate(&self.model, &request).await?;
        if summary.chars().count() > max_chars + 30 {
            Ok(prompts::truncate_chars(&summary, max_chars))
        } else {
            Ok(summary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::types::{ContextKey, Turn};
    use murmur_core::NodeId;
    use tokio::time::Instant;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> GeminiProvider {
        let client = GeminiClient::new("test-key", Duration::from_secs(30))
            .unwrap()
            .with_base_url(base_url.to_string());
        GeminiProvider::for_tests(client)
    }

    fn message(text: &str) -> MeshMessage {
        MeshMessage {
            id: "m".into(),
            key: ContextKey::Channel(0),
            sender: NodeId(0xbb),
            sender_name: "KC1ABC".into(),
            text: text.into(),
            received_at: Instant::now(),
            is_direct: false,
            rssi: None,
            snr: None,
        }
    }

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
    }

    #[test]
    fn reply_request_maps_roles_and_system_instruction() {
        let context = ContextWindow {
            summary: Some("earlier antenna talk".into()),
            turns: vec![
                Turn {
                    role: Role::User,
                    name: Some("KC1ABC".into()),
                    text: "which antenna?".into(),
                },
                Turn {
                    role: Role::Assistant,
                    name: None,
                    text: "a dipole works".into(),
                },
            ],
        };
        let req = build_reply_request("persona text", &context, &message("and coax?"));

        let system = req.system_instruction.unwrap();
        assert_eq!(system.parts.len(), 2);
        assert_eq!(system.parts[0].text, "persona text");
        assert!(system.parts[1].text.contains("antenna talk"));

        assert_eq!(req.contents.len(), 3);
        assert_eq!(req.contents[0].role.as_deref(), Some("user"));
        assert_eq!(req.contents[1].role.as_deref(), Some("model"));
        assert!(req.contents[2].parts[0]
            .text
            .contains("User 'KC1ABC' (NodeID: bb) says: and coax?"));
    }

    #[tokio::test]
    async fn generate_reply_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("73!")))
            .mount(&server)
            .await;

        let reply = provider(&server.uri())
            .generate_reply("persona", &ContextWindow::default(), &message("hello"))
            .await
            .unwrap();
        assert_eq!(reply, "73!");
    }

    #[tokio::test]
    async fn triage_parses_verdicts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("NO")))
            .mount(&server)
            .await;

        let verdict = provider(&server.uri())
            .classify_triage("persona", &["a: hi".into()], &message("lol"))
            .await
            .unwrap();
        assert_eq!(verdict, TriageVerdict::No);
    }

    #[tokio::test]
    async fn summarize_truncates_runaway_output() {
        let server = MockServer::start().await;
        let long = "x".repeat(400);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body(&long)))
            .mount(&server)
            .await;

        let summary = provider(&server.uri()).summarize("text", 80).await.unwrap();
        assert!(summary.chars().count() <= 80);
    }

    #[test]
    fn from_config_requires_api_key() {
        let err = GeminiProvider::from_config(&GeminiConfig::default(), &GatewayConfig::default())
            .unwrap_err();
        assert!(matches!(err, MurmurError::Config(_)));
    }
}
