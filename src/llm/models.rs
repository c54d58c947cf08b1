//! Model metadata lookup.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::errors::ChunkError;

/// Built-in models and their context lengths in tokens.
const BUILTIN_MODELS: &[(&str, usize)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub context_length: usize,
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: BTreeMap<String, usize>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    pub fn builtin() -> Self {
        Self {
            models: BUILTIN_MODELS
                .iter()
                .map(|(name, len)| (name.to_string(), *len))
                .collect(),
        }
    }

    /// Add models or replace built-in context lengths.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        for (name, context_length) in overrides {
            self.models.insert(name.into(), context_length);
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Result<ModelInfo, ChunkError> {
        self.models
            .get(name)
            .map(|&context_length| ModelInfo {
                name: name.to_string(),
                context_length,
            })
            .ok_or_else(|| ChunkError::UnknownModel {
                name: name.to_string(),
            })
    }

    pub fn models(&self) -> impl Iterator<Item = ModelInfo> + '_ {
        self.models.iter().map(|(name, &context_length)| ModelInfo {
            name: name.clone(),
            context_length,
        })
    }
}
