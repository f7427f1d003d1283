//! Id-keyed entity table with location and search-cell indices kept in step.

use h3o::{CellIndex, Resolution};

use crate::error::{SimError, SimResult};
use crate::model::{Base, Request, Station, Vehicle};
use crate::spatial::{search_cell, CellIndexMap};

/// An entity that lives at a single cell.
pub trait Located: Clone {
    const KIND: &'static str;

    fn entity_id(&self) -> &str;

    fn geoid(&self) -> CellIndex;
}

impl Located for Vehicle {
    const KIND: &'static str = "vehicle";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn geoid(&self) -> CellIndex {
        self.position.geoid
    }
}

impl Located for Request {
    const KIND: &'static str = "request";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn geoid(&self) -> CellIndex {
        self.origin_position.geoid
    }
}

impl Located for Station {
    const KIND: &'static str = "station";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn geoid(&self) -> CellIndex {
        self.position.geoid
    }
}

impl Located for Base {
    const KIND: &'static str = "base";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn geoid(&self) -> CellIndex {
        self.position.geoid
    }
}

fn index_insert(index: &mut CellIndexMap, cell: CellIndex, id: &str) {
    index
        .entry(cell)
        .or_insert_with(im::OrdSet::new)
        .insert(id.to_string());
}

fn index_remove(index: &mut CellIndexMap, cell: CellIndex, id: &str) {
    let now_empty = match index.get_mut(&cell) {
        Some(ids) => {
            ids.remove(id);
            ids.is_empty()
        }
        None => false,
    };
    if now_empty {
        index.remove(&cell);
    }
}

/// Persistent entity table. Cloning is cheap; every update shares structure with the original.
#[derive(Debug, Clone)]
pub struct EntityIndex<T: Located> {
    entities: im::OrdMap<String, T>,
    locations: CellIndexMap,
    search: CellIndexMap,
    search_resolution: Resolution,
}

impl<T: Located> EntityIndex<T> {
    pub fn new(search_resolution: Resolution) -> Self {
        Self {
            entities: im::OrdMap::new(),
            locations: CellIndexMap::new(),
            search: CellIndexMap::new(),
            search_resolution,
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.entities.keys()
    }

    /// Ids located exactly at `cell`.
    pub fn at(&self, cell: CellIndex) -> Vec<&str> {
        self.locations
            .get(&cell)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn locations(&self) -> &CellIndexMap {
        &self.locations
    }

    /// Search-resolution cell -> ids.
    pub fn search_index(&self) -> &CellIndexMap {
        &self.search
    }

    pub fn insert(&self, entity: T) -> SimResult<Self> {
        let id = entity.entity_id().to_string();
        if self.entities.contains_key(&id) {
            return Err(SimError::state(format!("{} {id} already exists", T::KIND)));
        }
        let mut updated = self.clone();
        let cell = entity.geoid();
        index_insert(&mut updated.locations, cell, &id);
        index_insert(&mut updated.search, search_cell(cell, self.search_resolution), &id);
        updated.entities.insert(id, entity);
        Ok(updated)
    }

    /// Replace an existing entity, re-indexing it if it moved.
    pub fn update(&self, entity: T) -> SimResult<Self> {
        let id = entity.entity_id().to_string();
        let Some(old) = self.entities.get(&id) else {
            return Err(SimError::state(format!(
                "cannot modify {} {id}, it does not exist",
                T::KIND
            )));
        };
        let mut updated = self.clone();
        let (old_cell, new_cell) = (old.geoid(), entity.geoid());
        if old_cell != new_cell {
            index_remove(&mut updated.locations, old_cell, &id);
            index_insert(&mut updated.locations, new_cell, &id);
            let old_search = search_cell(old_cell, self.search_resolution);
            let new_search = search_cell(new_cell, self.search_resolution);
            if old_search != new_search {
                index_remove(&mut updated.search, old_search, &id);
                index_insert(&mut updated.search, new_search, &id);
            }
        }
        updated.entities.insert(id, entity);
        Ok(updated)
    }

    pub fn remove(&self, id: &str) -> SimResult<Self> {
        let Some(old) = self.entities.get(id) else {
            return Err(SimError::state(format!(
                "cannot remove {} {id}, it does not exist",
                T::KIND
            )));
        };
        let mut updated = self.clone();
        let cell = old.geoid();
        index_remove(&mut updated.locations, cell, id);
        index_remove(&mut updated.search, search_cell(cell, self.search_resolution), id);
        updated.entities.remove(id);
        Ok(updated)
    }

    /// True when every entity appears in both indices at its own cell and nowhere else.
    pub fn is_consistent(&self) -> bool {
        let indexed = |index: &CellIndexMap| index.values().map(|ids| ids.len()).sum::<usize>();
        if indexed(&self.locations) != self.entities.len() || indexed(&self.search) != self.entities.len() {
            return false;
        }
        self.entities.iter().all(|(id, e)| {
            let cell = e.geoid();
            let in_location = self.locations.get(&cell).is_some_and(|ids| ids.contains(id));
            let in_search = self
                .search
                .get(&search_cell(cell, self.search_resolution))
                .is_some_and(|ids| ids.contains(id));
            in_location && in_search
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{mock_base, test_cell, test_cell_offset};

    #[test]
    fn moving_an_entity_reindexes_it() {
        let a = test_cell();
        let b = test_cell_offset(0.2, 0.0);
        let index = EntityIndex::new(Resolution::Seven)
            .insert(mock_base("b1", a, 1))
            .expect("insert");
        assert_eq!(index.at(a), vec!["b1"]);

        let moved = index.update(mock_base("b1", b, 1)).expect("update");
        assert!(moved.at(a).is_empty());
        assert_eq!(moved.at(b), vec!["b1"]);
        assert!(moved.is_consistent());
        // the original snapshot is untouched
        assert_eq!(index.at(a), vec!["b1"]);
    }

    #[test]
    fn duplicate_and_missing_ids_are_errors() {
        let index = EntityIndex::new(Resolution::Seven)
            .insert(mock_base("b1", test_cell(), 1))
            .expect("insert");
        assert!(index.insert(mock_base("b1", test_cell(), 1)).is_err());
        assert!(index.update(mock_base("b2", test_cell(), 1)).is_err());
        assert!(index.remove("b2").is_err());

        let removed = index.remove("b1").expect("remove");
        assert!(removed.is_empty());
        assert!(removed.locations().is_empty());
        assert!(removed.search_index().is_empty());
    }
}
