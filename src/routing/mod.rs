pub mod dispatch;

use rustc_hash::FxHashMap;

use crate::config::UpstreamConfig;

/// Pre-built alias table mapping client-facing model names to upstream model
/// names.
///
/// Resolution falls back to the requested name unchanged when no alias
/// matches, so the table never fails a lookup.
#[derive(Debug, Clone)]
pub struct ModelTable {
    aliases: FxHashMap<String, String>,
}

impl ModelTable {
    /// Build a `ModelTable` from the upstream configuration.
    #[must_use]
    pub fn new(upstream: &UpstreamConfig) -> Self {
        let mut aliases = FxHashMap::default();
        for (alias, model) in &upstream.model_aliases {
            aliases.insert(alias.clone(), model.clone());
        }
        Self { aliases }
    }

    /// Resolve a client-supplied model name to the upstream model name.
    #[must_use]
    pub fn resolve<'a>(&'a self, model: &'a str) -> &'a str {
        self.aliases.get(model).map_or(model, String::as_str)
    }

    /// Iterate over (alias, upstream model) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(alias, model)| (alias.as_str(), model.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
