use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};
use url::Url;

use crate::config::AssistantConfig;
use crate::error::{PortalError, Result};

pub const SYSTEM_INSTRUCTION: &str = "\
You are the virtual assistant of Urgetrauma, a clinic specialised in trauma and orthopaedics. \
Your goal is to help patients with questions about the portal, the pre-check-in process, \
and information about the trauma and physiotherapy specialties.

Slogan: \"Saúde e movimento\".

About the pre-check-in: explain that it validates the visit before the patient arrives at the \
clinic, producing a token that speeds up service at the reception desk.

IMPORTANT: You are NOT a doctor. Your answers do not replace a consultation. If the patient \
reports a serious emergency (open fractures, sudden intense pain), tell them to go immediately \
to the Urgetrauma 24h emergency unit or call SAMU (192).

Answer in Brazilian Portuguese, in a professional, ethical and efficient way.";

pub const GREETING: &str = "Olá! Sou seu assistente virtual de saúde. Como posso te ajudar hoje? \
Posso explicar termos médicos, dar dicas de saúde ou te guiar pelo portal.";

/// Shown when the completion service is unconfigured or fails.
pub const FALLBACK_REPLY: &str = "Tivemos um problema técnico ao acessar o assistente Urgetrauma. \
Por favor, tente em instantes.";

/// Shown when the completion service answers with no text.
pub const UNPROCESSED_REPLY: &str = "Não consegui processar sua dúvida.";

/// Hosted text-completion service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String>;
}

/// Gemini `generateContent` over REST.
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: Url,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| PortalError::assistant(format!("invalid base url {}: {}", base, e)))?;

        Ok(Self {
            client: Client::new(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            base_url,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PortalError::assistant("API key is not configured"))?;

        let endpoint = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .map_err(|e| PortalError::assistant(e.to_string()))?;

        let response = self
            .client
            .post(endpoint)
            .header("x-goog-api-key", api_key)
            .json(&json!({
                "systemInstruction": { "parts": [{ "text": system_instruction }] },
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                "generationConfig": { "temperature": self.temperature }
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let text = response["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<String>())
            .unwrap_or_default();
        debug!("Assistant returned {} characters", text.len());
        Ok(text)
    }
}

/// The clinic's health assistant on top of a completion service.
pub struct HealthAssistant<C> {
    client: C,
}

impl<C: CompletionClient> HealthAssistant<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Ask the completion service, surfacing failures as `AssistantUnavailable`.
    pub async fn ask(&self, utterance: &str) -> Result<String> {
        self.client.complete(SYSTEM_INSTRUCTION, utterance.trim()).await
    }

    /// Like [`ask`](Self::ask) but always yields text to show the user.
    pub async fn reply(&self, utterance: &str) -> String {
        match self.ask(utterance).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => UNPROCESSED_REPLY.to_string(),
            Err(e) => {
                error!("Assistant call failed: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
}

/// Chat transcript, opened with the bot's greeting.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: vec![ChatMessage {
                speaker: Speaker::Bot,
                text: GREETING.to_string(),
            }],
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Record `input` and the assistant's reply. Blank input is ignored.
    pub async fn send<C: CompletionClient>(
        &mut self,
        assistant: &HealthAssistant<C>,
        input: &str,
    ) -> Option<&ChatMessage> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        self.messages.push(ChatMessage {
            speaker: Speaker::User,
            text: input.to_string(),
        });

        let reply = assistant.reply(input).await;
        self.messages.push(ChatMessage {
            speaker: Speaker::Bot,
            text: reply,
        });
        self.messages.last()
    }
}
