use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ContentType, Diagnostic, Source, Subtitle};

/// Return contract of every provider call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResult {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub subtitles: Vec<Subtitle>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl ProviderResult {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// An empty result carrying a single explanatory diagnostic
    #[must_use]
    pub fn with_diagnostic(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
            ..Self::default()
        }
    }

    /// No sources and no subtitles (diagnostics do not count)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.subtitles.is_empty()
    }
}

/// Unified response of a resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResponse {
    pub sources: Vec<Source>,
    pub subtitles: Vec<Subtitle>,
    pub diagnostics: Vec<Diagnostic>,
    /// True when served from the cache without contacting any provider
    pub cached: bool,
}

/// Public view of a registered provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub capabilities: BTreeSet<ContentType>,
    /// Higher priority sources are merged first
    pub priority: i32,
}
