// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI provider adapter for the Murmur mesh bridge.
//!
//! Implements [`AiProvider`] over the chat completions API: persona reply
//! generation, YES/NO triage classification, and compaction summarization.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

use murmur_config::model::{GatewayConfig, OpenAiConfig};
use murmur_core::prompts;
use murmur_core::types::{ContextWindow, MeshMessage, Role, TriageVerdict};
use murmur_core::{AiProvider, GatewayError, MurmurError};

use crate::client::OpenAiClient;
use crate::types::{ChatMessage, ChatRequest};

/// Token budget for the one-word triage answer.
const TRIAGE_MAX_TOKENS: u32 = 5;

/// The OpenAI-backed provider.
#[derive(Debug)]
pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
    triage_model: String,
}

impl OpenAiProvider {
    /// Builds the provider from config. Fails when no API key is set.
    pub fn from_config(cfg: &OpenAiConfig, gateway: &GatewayConfig) -> Result<Self, MurmurError> {
        let api_key = cfg
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MurmurError::Config("openai.api_key is not set".into()))?;
        let client = OpenAiClient::new(
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
    fn for_tests(client: OpenAiClient) -> Self {
        Self {
            client,
            model: "gpt-4o-mini".into(),
            triage_model: "gpt-4o-mini".into(),
        }
    }
}

/// Flattens persona + rolling summary + recent turns + the attributed
/// newest message into a chat message list.
fn build_reply_messages(
    persona: &str,
    context: &ContextWindow,
    message: &MeshMessage,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(persona)];

    if let Some(summary) = &context.summary {
        messages.push(ChatMessage::system(prompts::summary_system_line(summary)));
    }

    for turn in &context.turns {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        messages.push(ChatMessage {
            role: role.into(),
            content: turn.text.clone(),
        });
    }

    let attribution = prompts::user_attribution(&message.sender_name, message.sender);
    messages.push(ChatMessage::user(format!(
        "{attribution} says: {}",
        message.text
    )));
    messages
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_reply(
        &self,
        persona: &str,
        context: &ContextWindow,
        message: &MeshMessage,
    ) -> Result<String, GatewayError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: build_reply_messages(persona, context, message),
            max_tokens: None,
            temperature: None,
        };
        self.client.chat(&request).await
    }

    async fn classify_triage(
        &self,
        persona: &str,
        recent: &[String],
        newest: &MeshMessage,
    ) -> Result<TriageVerdict, GatewayError> {
        let request = ChatRequest {
            model: self.triage_model.clone(),
            messages: vec![
                ChatMessage::system(prompts::triage_system_prompt(persona)),
                ChatMessage::user(prompts::triage_query(
                    recent,
                    &newest.sender_name,
                    &newest.text,
                )),
            ],
            max_tokens: Some(TRIAGE_MAX_TOKENS),
            temperature: Some(0.0),
        };
        let decision = self.client.chat(&request).await?;
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
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(prompts::summarizer_persona(max_chars)),
                ChatMessage::user(text.to_string()),
            ],
            max_tokens: None,
            temperature: None,
        };
        let summary = self.client.chat(&request).await?;
        // Allow a little leeway before hard truncation.
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
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> OpenAiProvider {
        let client = OpenAiClient::new("sk-test", Duration::from_secs(30))
            .unwrap()
            .with_base_url(base_url.to_string());
        OpenAiProvider::for_tests(client)
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

    fn success_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn reply_messages_carry_summary_history_and_attribution() {
        let context = ContextWindow {
            summary: Some("they were talking about antennas".into()),
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
        let messages = build_reply_messages("persona text", &context, &message("and coax?"));

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "persona text");
        assert!(messages[1].content.contains("antennas"));
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[3].role, "assistant");
        assert_eq!(
            messages[4].content,
            "User 'KC1ABC' (NodeID: bb) says: and coax?"
        );
    }

    #[tokio::test]
    async fn generate_reply_returns_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("73 de murmur")))
            .mount(&server)
            .await;

        let reply = provider(&server.uri())
            .generate_reply("persona", &ContextWindow::default(), &message("hello"))
            .await
            .unwrap();
        assert_eq!(reply, "73 de murmur");
    }

    #[tokio::test]
    async fn triage_parses_yes_and_no() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({"temperature": 0.0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("YES")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("no")))
            .mount(&server)
            .await;

        let p = provider(&server.uri());
        let yes = p
            .classify_triage("persona", &[], &message("question?"))
            .await
            .unwrap();
        assert_eq!(yes, TriageVerdict::Yes);

        let no = p
            .classify_triage("persona", &[], &message("lol"))
            .await
            .unwrap();
        assert_eq!(no, TriageVerdict::No);
    }

    #[tokio::test]
    async fn rambling_triage_answer_is_treated_as_no() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body("YES, because the user asked")),
            )
            .mount(&server)
            .await;

        let verdict = provider(&server.uri())
            .classify_triage("persona", &[], &message("hm"))
            .await
            .unwrap();
        assert_eq!(verdict, TriageVerdict::No);
    }

    #[tokio::test]
    async fn summarize_truncates_runaway_output() {
        let server = MockServer::start().await;
        let long = "w".repeat(500);
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body(&long)))
            .mount(&server)
            .await;

        let summary = provider(&server.uri())
            .summarize("lots of text", 100)
            .await
            .unwrap();
        assert!(summary.chars().count() <= 100);
        assert!(summary.ends_with("..."));
    }

    #[tokio::test]
    async fn summarize_rejects_empty_input() {
        let server = MockServer::start().await;
        let err = provider(&server.uri()).summarize("   ", 100).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unknown(_)));
    }

    #[test]
    fn from_config_requires_api_key() {
        let err = OpenAiProvider::from_config(&OpenAiConfig::default(), &GatewayConfig::default())
            .unwrap_err();
        assert!(matches!(err, MurmurError::Config(_)));
    }
}
