//! A single named configuration tree with dotted-path access.

use serde_json::{Map, Value};

use super::coerce::Coerce;
use super::merge::merge_maps;

/// The merged key/value tree stored under one collection path.
///
/// Paths are dot-delimited (`"db.host"`) and case-sensitive. A numeric
/// segment indexes into an array (`"hosts.0"`). The empty path addresses the
/// whole tree in [`get`](Self::get) and [`has`](Self::has).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    tree: Map<String, Value>,
}

impl Collection {
    pub fn new(tree: Map<String, Value>) -> Self {
        Self { tree }
    }

    /// Returns the underlying tree.
    pub fn tree(&self) -> &Map<String, Value> {
        &self.tree
    }

    pub fn into_tree(self) -> Map<String, Value> {
        self.tree
    }

    /// Looks up the raw value at a non-empty `path`.
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = self.tree.get(segments.next()?)?;

        segments.try_fold(first, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Returns the value at `path` converted to the default's type, or
    /// `default` when the path is absent.
    ///
    /// Composite defaults (`Vec`, `Map`, JSON arrays and objects) are
    /// shallow-unioned with the stored value: stored keys win and the default
    /// only fills gaps.
    pub fn get<T: Coerce>(&self, path: &str, default: T) -> T {
        if path.is_empty() {
            return T::with_default(&Value::Object(self.tree.clone()), default);
        }
        match self.get_value(path) {
            Some(value) => T::with_default(value, default),
            None => default,
        }
    }

    pub fn has(&self, path: &str) -> bool {
        path.is_empty() || self.get_value(path).is_some()
    }

    /// Stores `value` at `path`, creating intermediate objects as needed.
    ///
    /// Any non-object found along the way is replaced by an object.
    pub fn set(&mut self, path: &str, value: Value) {
        if path.is_empty() {
            if let Value::Object(map) = value {
                self.tree = map;
            }
            return;
        }

        let mut segments = path.split('.').peekable();
        let mut map = &mut self.tree;

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                return;
            }

            let child = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            let Value::Object(next) = child else {
                return;
            };
            map = next;
        }
    }

    /// Deep-merges `incoming` into this collection; incoming values win.
    pub fn merge(&mut self, incoming: Map<String, Value>) {
        merge_maps(&mut self.tree, incoming);
    }

    /// Lists every leaf under its fully-qualified path, joined with
    /// `separator`, in tree order. Arrays count as leaves.
    pub fn flatten(&self, separator: &str) -> Vec<(String, Value)> {
        let mut leaves = Vec::new();
        // Reversed so that popping preserves key order.
        let mut pending: Vec<(String, &Value)> = self
            .tree
            .iter()
            .rev()
            .map(|(key, child)| (key.clone(), child))
            .collect();

        while let Some((prefix, value)) = pending.pop() {
            match value {
                Value::Object(map) => {
                    for (key, child) in map.iter().rev() {
                        pending.push((format!("{prefix}{separator}{key}"), child));
                    }
                }
                leaf => leaves.push((prefix, leaf.clone())),
            }
        }

        leaves
    }
}

impl From<Map<String, Value>> for Collection {
    fn from(tree: Map<String, Value>) -> Self {
        Self::new(tree)
    }
}
