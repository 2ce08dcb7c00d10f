//! Voice catalog: actor name → style name → `StyleId`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::StyleId;
use crate::error::{MelsyncError, Result};

/// Lookup table from human-readable voice names to engine style ids.
///
/// When the same style name is registered twice for one actor (e.g. shipped
/// in two voice model files), the first registration wins.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    actors: BTreeMap<String, BTreeMap<String, StyleId>>,
}

/// Dropdown-friendly catalog dump.
#[derive(Debug, Serialize)]
struct CatalogDump<'a> {
    actors: Vec<&'a str>,
    actor_styles: BTreeMap<&'a str, Vec<&'a str>>,
    style_lookup: &'a BTreeMap<String, BTreeMap<String, StyleId>>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(actor, style, id)` entries.
    pub fn from_entries<I, A, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (A, S, StyleId)>,
        A: Into<String>,
        S: Into<String>,
    {
        let mut catalog = Self::new();
        for (actor, style, id) in entries {
            catalog.register(actor, style, id);
        }
        catalog
    }

    /// Returns `false` if the style was already known for this actor.
    pub fn register(
        &mut self,
        actor: impl Into<String>,
        style: impl Into<String>,
        id: StyleId,
    ) -> bool {
        let styles = self.actors.entry(actor.into()).or_default();
        match styles.entry(style.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    /// # Errors
    /// `VoiceNotFound` listing the available actors (unknown actor) or the
    /// actor's styles (unknown style).
    pub fn resolve(&self, actor: &str, style: &str) -> Result<StyleId> {
        let not_found = |available: Vec<&str>| MelsyncError::VoiceNotFound {
            actor: actor.to_string(),
            style: style.to_string(),
            available: available.join(", "),
        };
        let styles = self.actors.get(actor).ok_or_else(|| not_found(self.actors()))?;
        styles
            .get(style)
            .copied()
            .ok_or_else(|| not_found(styles.keys().map(String::as_str).collect()))
    }

    pub fn actors(&self) -> Vec<&str> {
        self.actors.keys().map(String::as_str).collect()
    }

    pub fn styles(&self, actor: &str) -> Option<Vec<&str>> {
        self.actors
            .get(actor)
            .map(|s| s.keys().map(String::as_str).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Catalog as pretty JSON (`actors`, `actor_styles`, `style_lookup`).
    pub fn to_json(&self) -> Result<String> {
        let dump = CatalogDump {
            actors: self.actors(),
            actor_styles: self
                .actors
                .iter()
                .map(|(a, s)| (a.as_str(), s.keys().map(String::as_str).collect()))
                .collect(),
            style_lookup: &self.actors,
        };
        Ok(serde_json::to_string_pretty(&dump)?)
    }

    /// Explicit debug export. Nothing is written unless this is called.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), actors = self.actors.len(), "voice catalog exported");
        Ok(())
    }
}
