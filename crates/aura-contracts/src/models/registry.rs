use indexmap::IndexMap;

pub const CAPABILITY_CHAT: &str = "chat";
pub const CAPABILITY_STRUCTURED: &str = "structured";
pub const CAPABILITY_IMAGE: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    /// Models supporting `capability`, optionally restricted to one provider,
    /// in registration order (first entry is the default).
    pub fn by_capability(&self, capability: &str, provider: Option<&str>) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .filter(|model| provider.map_or(true, |name| model.provider == name))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str, provider: Option<&str>) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if !model.supports(capability) {
            return None;
        }
        if provider.is_some_and(|expected| model.provider != expected) {
            return None;
        }
        Some(model.clone())
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert("gemini-3-flash-preview", "gemini", &[CAPABILITY_CHAT, CAPABILITY_STRUCTURED]);
    insert("gemini-3-pro-preview", "gemini", &[CAPABILITY_CHAT, CAPABILITY_STRUCTURED]);
    insert("gemini-2.5-flash", "gemini", &[CAPABILITY_CHAT, CAPABILITY_STRUCTURED]);
    insert("gemini-2.5-flash-image", "gemini", &[CAPABILITY_IMAGE]);
    insert("gemini-3-pro-image-preview", "gemini", &[CAPABILITY_IMAGE]);
    insert("dryrun-text-1", "dryrun", &[CAPABILITY_CHAT, CAPABILITY_STRUCTURED]);
    insert("dryrun-image-1", "dryrun", &[CAPABILITY_IMAGE]);

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_orders_provider_defaults_first() {
        let registry = ModelRegistry::new(None);
        let text = registry.by_capability(CAPABILITY_STRUCTURED, Some("gemini"));
        assert_eq!(text[0].name, "gemini-3-flash-preview");
        let image = registry.by_capability(CAPABILITY_IMAGE, Some("gemini"));
        assert_eq!(image[0].name, "gemini-2.5-flash-image");
        let dryrun = registry.by_capability(CAPABILITY_IMAGE, Some("dryrun"));
        assert_eq!(dryrun[0].name, "dryrun-image-1");
    }

    #[test]
    fn ensure_checks_capability_and_provider() {
        let registry = ModelRegistry::new(None);
        assert!(registry
            .ensure("gemini-2.5-flash-image", CAPABILITY_IMAGE, Some("gemini"))
            .is_some());
        assert!(registry
            .ensure("gemini-2.5-flash-image", CAPABILITY_CHAT, None)
            .is_none());
        assert!(registry
            .ensure("dryrun-text-1", CAPABILITY_CHAT, Some("gemini"))
            .is_none());
        assert!(registry.ensure("missing", CAPABILITY_CHAT, None).is_none());
    }
}
