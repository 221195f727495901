//! Entity store backed by a JSON file (array of entities).
//!
//! Updates stay in memory until `checkpoint`, which rewrites the file
//! through a temp file + rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use locus_resolver::{Entity, EntityId, EntityStore, LocationRecord, StoreError};

pub struct JsonFileEntityStore {
    path: PathBuf,
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    dirty: bool,
}

impl JsonFileEntityStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        let entities: Vec<Entity> = serde_json::from_str(&text)
            .map_err(|e| StoreError::Parse(format!("{}: {e}", path.display())))?;

        let mut index = HashMap::with_capacity(entities.len());
        for (i, e) in entities.iter().enumerate() {
            if index.insert(e.id.clone(), i).is_some() {
                return Err(StoreError::Parse(format!("{}: duplicate entity id {}", path.display(), e.id)));
            }
        }
        Ok(Self { path: path.to_path_buf(), entities, index, dirty: false })
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
}

impl EntityStore for JsonFileEntityStore {
    fn list_entities_needing_resolution(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self.entities.iter().filter(|e| e.needs_resolution()).cloned().collect())
    }

    fn list_entities_with_declared_areas(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self
            .entities
            .iter()
            .filter(|e| !e.service_areas.is_empty())
            .cloned()
            .collect())
    }

    fn update_location(&mut self, id: &EntityId, record: LocationRecord) -> Result<(), StoreError> {
        let i = *self.index.get(id).ok_or_else(|| StoreError::UnknownEntity(id.clone()))?;
        self.entities[i].location = Some(record);
        self.dirty = true;
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&self.entities)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| StoreError::Io(format!("{}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| StoreError::Io(format!("{}: {e}", self.path.display())))?;
        log::info!("checkpoint: {} entities written to {}", self.entities.len(), self.path.display());
        self.dirty = false;
        Ok(())
    }
}
