//! Language-model client (§4.D): a uniform `query(prompt) -> {text, usage}`
//! contract over whichever concrete provider is selected, with per-call
//! timeout, retry/backoff, prompt truncation and a cross-call token budget.

mod client;
mod provider;

pub use client::{BackoffPolicy, ClientConfig, LlmClient, LlmError};
pub use provider::{
    build_auto_provider, AnthropicProvider, LlmResponse, MockProvider, OpenAiCompatibleProvider,
    Provider, ProviderCredentials, TokenUsage,
};
