//! Entity persistence seam.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Entity, EntityId, LocationRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    UnknownEntity(EntityId),
    Io(String),
    Parse(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntity(id) => write!(f, "unknown entity: {id}"),
            Self::Io(msg) => write!(f, "store IO error: {msg}"),
            Self::Parse(msg) => write!(f, "store parse error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Where entities come from and where their location records go.
///
/// `update_location` is an upsert: an entity has at most one record.
pub trait EntityStore {
    /// Entities with no record, or whose last attempt left them unresolved.
    fn list_entities_needing_resolution(&self) -> Result<Vec<Entity>, StoreError>;

    /// Entities declaring at least one service area.
    fn list_entities_with_declared_areas(&self) -> Result<Vec<Entity>, StoreError>;

    fn update_location(&mut self, id: &EntityId, record: LocationRecord) -> Result<(), StoreError>;

    /// Make pending writes durable. No-op for stores that write through.
    fn checkpoint(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store ordered by entity id.
#[derive(Debug, Clone, Default)]
pub struct MemoryEntityStore {
    entities: BTreeMap<EntityId, Entity>,
}

impl MemoryEntityStore {
    pub fn new(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            entities: entities.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn into_entities(self) -> Vec<Entity> {
        self.entities.into_values().collect()
    }
}

impl EntityStore for MemoryEntityStore {
    fn list_entities_needing_resolution(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self.entities.values().filter(|e| e.needs_resolution()).cloned().collect())
    }

    fn list_entities_with_declared_areas(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self
            .entities
            .values()
            .filter(|e| !e.service_areas.is_empty())
            .cloned()
            .collect())
    }

    fn update_location(&mut self, id: &EntityId, record: LocationRecord) -> Result<(), StoreError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownEntity(id.clone()))?;
        entity.location = Some(record);
        Ok(())
    }
}
