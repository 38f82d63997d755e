//! Token store abstraction
//!
//! Voice and output selection goes through selector tokens resolved
//! against a category-scoped store. The persisted backend (registry,
//! config files, whatever) lives behind the trait; the pipeline only ever
//! asks for an identity string.

use std::collections::HashMap;

use crate::error::{TtsError, TtsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenCategory {
    Voices,
    AudioOutput,
}

pub trait TokenStore: Send + Sync {
    /// Identity of the category default.
    fn default_id(&self, category: TokenCategory) -> TtsResult<String>;

    /// Resolve an explicit selector token.
    fn lookup(&self, category: TokenCategory, token: &str) -> TtsResult<String>;
}

/// In-memory token store for tests and embedded setups.
#[derive(Debug, Default)]
pub struct StaticTokenStore {
    defaults: HashMap<TokenCategory, String>,
    entries: HashMap<(TokenCategory, String), String>,
}

impl StaticTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&mut self, category: TokenCategory, id: impl Into<String>) {
        self.defaults.insert(category, id.into());
    }

    pub fn insert(
        &mut self,
        category: TokenCategory,
        token: impl Into<String>,
        id: impl Into<String>,
    ) {
        self.entries.insert((category, token.into()), id.into());
    }
}

impl TokenStore for StaticTokenStore {
    fn default_id(&self, category: TokenCategory) -> TtsResult<String> {
        self.defaults
            .get(&category)
            .cloned()
            .ok_or_else(|| TtsError::TokenNotFound(format!("{category:?} default")))
    }

    fn lookup(&self, category: TokenCategory, token: &str) -> TtsResult<String> {
        self.entries
            .get(&(category, token.to_string()))
            .cloned()
            .ok_or_else(|| TtsError::TokenNotFound(token.to_string()))
    }
}
