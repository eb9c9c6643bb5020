//! Gateway configuration: environment first, CLI overrides last, model names
//! resolved through the model registry.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use aura_contracts::models::{
    ModelSelector, CAPABILITY_CHAT, CAPABILITY_IMAGE, CAPABILITY_STRUCTURED,
};

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 5.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 300.0;

#[derive(Debug, Clone, Default)]
pub struct GatewayOverrides {
    pub provider: Option<String>,
    pub api_base: Option<String>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub request_timeout_s: Option<f64>,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub provider: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("provider", &self.provider)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GatewayConfig {
    pub fn resolve(overrides: &GatewayOverrides) -> Result<Self> {
        Self::resolve_with(overrides, non_empty_env)
    }

    /// Same as [`GatewayConfig::resolve`] with an injectable variable lookup.
    pub fn resolve_with(
        overrides: &GatewayOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let provider = overrides
            .provider
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_ascii_lowercase)
            .or_else(|| lookup("AURA_PROVIDER").map(|value| value.to_ascii_lowercase()))
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        let api_base = overrides
            .api_base
            .clone()
            .or_else(|| lookup("GEMINI_API_BASE"))
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());

        let api_key = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY"));

        let request_timeout_s = overrides
            .request_timeout_s
            .or_else(|| lookup("AURA_REQUEST_TIMEOUT").and_then(|raw| raw.parse::<f64>().ok()))
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
            .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);

        let selector = ModelSelector::new(None);
        let requested_text = overrides
            .text_model
            .clone()
            .or_else(|| lookup("AURA_TEXT_MODEL"));
        let text_model = select_model(
            &selector,
            requested_text.as_deref(),
            &[CAPABILITY_CHAT, CAPABILITY_STRUCTURED],
            &provider,
        )?;
        let requested_image = overrides
            .image_model
            .clone()
            .or_else(|| lookup("AURA_IMAGE_MODEL"));
        let image_model = select_model(
            &selector,
            requested_image.as_deref(),
            &[CAPABILITY_IMAGE],
            &provider,
        )?;

        Ok(Self {
            provider,
            api_base,
            api_key,
            text_model,
            image_model,
            request_timeout: Duration::from_secs_f64(request_timeout_s),
        })
    }
}

/// Picks a model supporting every capability in `capabilities`.
fn select_model(
    selector: &ModelSelector,
    requested: Option<&str>,
    capabilities: &[&str],
    provider: &str,
) -> Result<String> {
    let mut chosen: Option<String> = None;
    for capability in capabilities {
        let selection = selector
            .select(chosen.as_deref().or(requested), capability, Some(provider))
            .map_err(|reason| anyhow!(reason))?;
        if let Some(reason) = selection.fallback_reason.as_deref() {
            if selection.requested.is_some() {
                tracing::warn!(
                    requested = selection.requested.as_deref().unwrap_or_default(),
                    model = %selection.model.name,
                    capability = *capability,
                    "{reason}"
                );
            } else {
                tracing::debug!(model = %selection.model.name, capability = *capability, "{reason}");
            }
        }
        if let Some(previous) = chosen.as_deref() {
            if previous != selection.model.name {
                return Err(anyhow!(
                    "Model '{previous}' does not support capability '{capability}'."
                ));
            }
        }
        chosen = Some(selection.model.name);
    }
    chosen.ok_or_else(|| anyhow!("No capabilities requested for model selection."))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
