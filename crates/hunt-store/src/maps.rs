//! Treasure map catalog loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use hunt_core::{MapId, MapSource, PersistenceError, TreasureMap};

use crate::error::{Result, StoreError};

const BUILTIN_MAPS: &str = include_str!("../data/maps.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapCatalog {
    pub maps: Vec<TreasureMap>,
}

impl MapCatalog {
    /// Maps bundled with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_MAPS)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let catalog = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), maps = catalog.maps.len(), "loaded map catalog");
        Ok(catalog)
    }

    pub fn get(&self, id: &MapId) -> Option<&TreasureMap> {
        self.maps.iter().find(|m| &m.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &MapId> {
        self.maps.iter().map(|m| &m.id)
    }
}

impl MapSource for MapCatalog {
    fn all_maps(&self) -> std::result::Result<Vec<TreasureMap>, PersistenceError> {
        Ok(self.maps.clone())
    }
}
