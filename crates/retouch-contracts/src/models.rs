use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An image model the session can route edits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
}

/// Known models, in registration order. The first entry is the default
/// when no model is requested.
#[derive(Debug, Clone, Default)]
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

    pub fn list(&self) -> Vec<&ModelSpec> {
        self.models.values().collect()
    }

    /// Look up a requested model, or fall back to the default entry.
    pub fn resolve(&self, requested: Option<&str>) -> Result<ModelSpec, String> {
        match requested {
            Some(name) => match self.models.get(name) {
                Some(model) => Ok(model.clone()),
                None => {
                    let known = self
                        .models
                        .keys()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(", ");
                    Err(format!("Unknown model '{name}'. Available models: {known}."))
                }
            },
            None => match self.models.values().next() {
                Some(model) => Ok(model.clone()),
                None => Err("No models are registered.".to_string()),
            },
        }
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut models = IndexMap::new();
    let mut insert = |name: &str, provider: &str| {
        models.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
            },
        );
    };
    insert("gemini-2.5-flash-image", "gemini");
    insert("gemini-3-pro-image-preview", "gemini");
    insert("dryrun-image-1", "dryrun");
    models
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_to_the_first_registered_model() {
        let registry = ModelRegistry::new(None);
        let model = registry.resolve(None).unwrap();
        assert_eq!(model.name, "gemini-2.5-flash-image");
        assert_eq!(model.provider, "gemini");
    }

    #[test]
    fn resolve_rejects_unknown_models_and_lists_the_catalog() {
        let registry = ModelRegistry::new(None);
        let err = registry.resolve(Some("nano-banana")).unwrap_err();
        assert!(err.contains("Unknown model 'nano-banana'"));
        assert!(err.contains("dryrun-image-1"));
    }

    #[test]
    fn custom_registries_keep_insertion_order() {
        let mut models = IndexMap::new();
        models.insert(
            "first".to_string(),
            ModelSpec {
                name: "first".to_string(),
                provider: "dryrun".to_string(),
            },
        );
        models.insert(
            "second".to_string(),
            ModelSpec {
                name: "second".to_string(),
                provider: "dryrun".to_string(),
            },
        );
        let registry = ModelRegistry::new(Some(models));
        assert_eq!(registry.resolve(None).unwrap().name, "first");
        let names: Vec<&str> = registry.list().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn empty_registries_cannot_resolve_a_default() {
        let registry = ModelRegistry::new(Some(IndexMap::new()));
        assert!(registry.resolve(None).is_err());
    }
}
