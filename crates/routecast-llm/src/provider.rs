use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &'static str;
    async fn complete(&self, prompt: &str) -> anyhow::Result<LlmResponse>;
}

/// Credentials consulted by `build_auto_provider` in the precedence order
/// the source documents: claude > openai > gemini > local > mock.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub local_base_url: Option<String>,
}

impl ProviderCredentials {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            gemini_api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            local_base_url: non_empty_env("ROUTECAST_LOCAL_LLM_URL"),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Selects a provider by the documented precedence, falling back to the
/// deterministic mock when no provider is reachable (no credentials
/// configured for any ranked option).
pub fn build_auto_provider(credentials: &ProviderCredentials) -> Arc<dyn Provider> {
    if let Some(key) = &credentials.anthropic_api_key {
        return Arc::new(AnthropicProvider::new(key.clone(), "claude-3-5-sonnet-latest"));
    }
    if let Some(key) = &credentials.openai_api_key {
        return Arc::new(OpenAiCompatibleProvider::new(
            "openai",
            "https://api.openai.com/v1",
            Some(key.clone()),
            "gpt-4o-mini",
        ));
    }
    if let Some(key) = &credentials.gemini_api_key {
        return Arc::new(OpenAiCompatibleProvider::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            Some(key.clone()),
            "gemini-1.5-flash",
        ));
    }
    if let Some(url) = &credentials.local_base_url {
        return Arc::new(OpenAiCompatibleProvider::new(
            "local",
            url.clone(),
            None,
            "llama3.1:8b",
        ));
    }
    Arc::new(MockProvider)
}

/// Deterministic fallback: returns a canned string and a usage stub, never
/// touches the network. Selected whenever no real provider is configured.
pub struct MockProvider;

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<LlmResponse> {
        let preview: String = prompt.chars().take(80).collect();
        Ok(LlmResponse {
            text: format!("[mock completion for: {preview}]"),
            usage: Some(TokenUsage {
                prompt_tokens: prompt.len() as u64,
                completion_tokens: 0,
                total_tokens: prompt.len() as u64,
            }),
        })
    }
}

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &'static str {
        "claude"
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<LlmResponse> {
        let value: serde_json::Value = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("anthropic-version", "2023-06-01")
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "model": self.model,
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?
            .json()
            .await?;

        let text = value["content"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("anthropic response carried no completion text"))?
            .to_string();

        let usage = value.get("usage").map(|u| TokenUsage {
            prompt_tokens: u["input_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["output_tokens"].as_u64().unwrap_or(0),
            total_tokens: u["input_tokens"].as_u64().unwrap_or(0) + u["output_tokens"].as_u64().unwrap_or(0),
        });

        Ok(LlmResponse { text, usage })
    }
}

/// Any OpenAI-chat-completions-shaped upstream: OpenAI itself, Gemini's
/// OpenAI-compatible endpoint, and a local server (Ollama et al.).
pub struct OpenAiCompatibleProvider {
    id: &'static str,
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn complete(&self, prompt: &str) -> anyhow::Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(url).json(&json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let value: serde_json::Value = request.send().await?.json().await?;

        let text = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("provider `{}` returned no completion content", self.id))?
            .to_string();

        let usage = value.get("usage").map(|u| TokenUsage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
        });

        Ok(LlmResponse { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_echoes_a_prompt_preview() {
        let provider = MockProvider;
        let response = provider.complete("where should we stop next").await.unwrap();
        assert!(response.text.contains("where should we stop next"));
        assert!(response.usage.is_some());
    }

    #[test]
    fn auto_selection_prefers_claude_over_everything_else() {
        let creds = ProviderCredentials {
            anthropic_api_key: Some("sk-ant".to_string()),
            openai_api_key: Some("sk-oai".to_string()),
            gemini_api_key: Some("sk-gem".to_string()),
            local_base_url: Some("http://localhost:11434/v1".to_string()),
        };
        assert_eq!(build_auto_provider(&creds).id(), "claude");
    }

    #[test]
    fn auto_selection_falls_through_to_mock_with_no_credentials() {
        let creds = ProviderCredentials::default();
        assert_eq!(build_auto_provider(&creds).id(), "mock");
    }

    #[test]
    fn auto_selection_honors_precedence_below_claude() {
        let creds = ProviderCredentials {
            anthropic_api_key: None,
            openai_api_key: None,
            gemini_api_key: Some("sk-gem".to_string()),
            local_base_url: Some("http://localhost:11434/v1".to_string()),
        };
        assert_eq!(build_auto_provider(&creds).id(), "gemini");
    }
}
