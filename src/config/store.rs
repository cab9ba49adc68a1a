use std::collections::HashMap;

use serde_json::{Map, Value};

use super::collection::Collection;

/// Every collection of one loaded configuration root, in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationStore {
    order: Vec<String>,
    collections: HashMap<String, Collection>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tree` as a new collection, or deep-merges it into the
    /// collection already stored at `path`.
    pub fn insert_or_merge(&mut self, path: &str, tree: Map<String, Value>) {
        match self.collections.get_mut(path) {
            Some(existing) => existing.merge(tree),
            None => {
                self.order.push(path.to_string());
                self.collections
                    .insert(path.to_string(), Collection::new(tree));
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Collection> {
        self.collections.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.collections.contains_key(path)
    }

    /// Collection paths in load order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Collection)> {
        self.order
            .iter()
            .filter_map(|path| self.collections.get(path).map(|c| (path.as_str(), c)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshot as a single ordered map of collection path to tree.
    pub fn to_map(&self) -> Map<String, Value> {
        self.iter()
            .map(|(path, c)| (path.to_string(), Value::Object(c.tree().clone())))
            .collect()
    }

    /// Rebuilds a store from [`to_map`](Self::to_map) output.
    ///
    /// Returns the offending path if any collection is not an object.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, String> {
        let mut store = Self::new();
        for (path, tree) in map {
            match tree {
                Value::Object(tree) => store.insert_or_merge(&path, tree),
                _ => return Err(path),
            }
        }
        Ok(store)
    }
}
