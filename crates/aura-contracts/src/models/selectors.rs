use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
        provider: Option<&str>,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability, provider) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (Some("No model specified; using default.".to_string()), None)
        };

        let candidates = self.registry.by_capability(capability, provider);
        let Some(model) = candidates.first().cloned() else {
            return Err(match provider {
                Some(name) => format!(
                    "No models available for capability '{capability}' on provider '{name}'."
                ),
                None => format!("No models available for capability '{capability}'."),
            });
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use crate::models::{ModelRegistry, ModelSelector, ModelSpec, CAPABILITY_IMAGE};

    fn image_model(name: &str, provider: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: provider.to_string(),
            capabilities: vec![CAPABILITY_IMAGE.to_string()],
        }
    }

    #[test]
    fn falls_back_when_requested_model_unavailable() {
        let mut models = IndexMap::new();
        models.insert(
            "image-fallback".to_string(),
            image_model("image-fallback", "gemini"),
        );
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("missing"), CAPABILITY_IMAGE, None)
            .unwrap();
        assert_eq!(selection.model.name, "image-fallback");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'image'.")
        );
    }

    #[test]
    fn blank_request_uses_default_with_explanation() {
        let mut models = IndexMap::new();
        models.insert(
            "image-default".to_string(),
            image_model("image-default", "gemini"),
        );
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("  "), CAPABILITY_IMAGE, None)
            .unwrap();
        assert_eq!(selection.model.name, "image-default");
        assert_eq!(selection.requested, None);
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn provider_mismatch_falls_back_within_provider() {
        let mut models = IndexMap::new();
        models.insert("g-image".to_string(), image_model("g-image", "gemini"));
        models.insert("d-image".to_string(), image_model("d-image", "dryrun"));
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("g-image"), CAPABILITY_IMAGE, Some("dryrun"))
            .unwrap();
        assert_eq!(selection.model.name, "d-image");
        assert!(selection.fallback_reason.is_some());
    }

    #[test]
    fn errors_when_no_models_for_capability() {
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(IndexMap::new()))))
            .select(None, CAPABILITY_IMAGE, Some("gemini"))
            .err()
            .unwrap_or_default();
        assert_eq!(
            err,
            "No models available for capability 'image' on provider 'gemini'."
        );
    }
}
