//! Registry of model templates keyed by identifier

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::ecmwf::Ifs;
use super::noaa::{Gfs, HiresW, Hrrr, Rap};
use super::ModelTemplate;
use crate::errors::{ResolveError, ResolveResult};

/// Explicit mapping from model identifier to template
///
/// Identifiers are case-insensitive. Aliases point at a registered identifier
/// and are followed once.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    templates: BTreeMap<String, Arc<dyn ModelTemplate>>,
    aliases: BTreeMap<String, String>,
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in template and alias
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("hrrr", Arc::new(Hrrr::conus()));
        registry.register("hrrrak", Arc::new(Hrrr::alaska()));
        registry.register("rap", Arc::new(Rap));
        registry.register("gfs", Arc::new(Gfs));
        registry.register("hiresw", Arc::new(HiresW));
        registry.register("ifs", Arc::new(Ifs));
        registry.alias("alaska", "hrrrak");
        registry.alias("ecmwf", "ifs");
        registry
    }

    /// Register a template under an explicit identifier, returning any template it replaced
    pub fn register(
        &mut self,
        id: &str,
        template: Arc<dyn ModelTemplate>,
    ) -> Option<Arc<dyn ModelTemplate>> {
        let id = id.trim().to_lowercase();
        debug!("Registering model template {}", id);
        self.templates.insert(id, template)
    }

    /// Make `alias` resolve to the template registered as `target`
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases
            .insert(alias.trim().to_lowercase(), target.trim().to_lowercase());
    }

    /// Look up a template by identifier or alias
    pub fn get(&self, id: &str) -> ResolveResult<Arc<dyn ModelTemplate>> {
        let key = id.trim().to_lowercase();
        let key = self.aliases.get(&key).cloned().unwrap_or(key);
        self.templates
            .get(&key)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownModel {
                model: id.to_string(),
                available: self.ids().join(", "),
            })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_ok()
    }

    /// Registered identifiers in sorted order, aliases excluded
    pub fn ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn ModelTemplate>)> {
        self.templates.iter().map(|(id, template)| (id.as_str(), template))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.ids())
            .field("aliases", &self.aliases)
            .finish()
    }
}
