//! Cache key definitions.

const RANKINGS_SUFFIX: &str = "rankings";

/// The two kinds of cache entry the service writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEntry {
    /// One serialized record per symbol.
    Item,
    /// The whole ranked listing under a single key.
    Rankings,
}

impl CacheEntry {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEntry::Item => "item",
            CacheEntry::Rankings => "rankings",
        }
    }
}

/// Renders cache keys under a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
    rankings: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let rankings = format!("{prefix}{RANKINGS_SUFFIX}");
        Self { prefix, rankings }
    }

    /// `<prefix><symbol>`; the symbol is used verbatim, case included.
    pub fn item(&self, symbol: &str) -> String {
        format!("{}{}", self.prefix, symbol)
    }

    pub fn rankings(&self) -> &str {
        &self.rankings
    }
}
