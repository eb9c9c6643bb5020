//! The AI gateway: the only functional dependency of the studio. Each call is
//! a one-shot request/response; adapters own transport concerns (timeouts,
//! credentials) and never retry.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use aura_contracts::storyboard::ChatTurn;

use crate::config::GatewayConfig;

mod dryrun;
mod gemini;

pub use dryrun::DryrunGateway;
pub use gemini::GeminiGateway;

pub const GATEWAY_NAMES: &[&str] = &["dryrun", "gemini"];

#[async_trait]
pub trait AiGateway: Send + Sync {
    fn name(&self) -> &str;

    /// JSON text for an object with string keys `title`, `description`,
    /// `dialogue`. Parsing is the caller's job.
    async fn generate_structured_scene(&self, prompt_hint: &str) -> Result<String>;

    /// A `data:` URL for the first generated image; `None` when the model
    /// returned no image part.
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>>;

    /// Assistant reply to `message` given the prior transcript. May be empty.
    async fn converse(&self, history: &[ChatTurn], message: &str) -> Result<String>;
}

/// How a gateway interaction failed, as seen from the studio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport, HTTP status or credential failure.
    Transport,
    /// The structured payload did not match the scene schema.
    MalformedPayload,
    /// The gateway answered with nothing usable.
    EmptyResponse,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::MalformedPayload => "malformed_payload",
            FailureKind::EmptyResponse => "empty_response",
        }
    }
}

pub fn build_gateway(config: &GatewayConfig) -> Result<Arc<dyn AiGateway>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGateway::new(config)?)),
        "dryrun" => Ok(Arc::new(DryrunGateway::new())),
        other => bail!(
            "unknown gateway provider '{other}' (available: {})",
            GATEWAY_NAMES.join(", ")
        ),
    }
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
