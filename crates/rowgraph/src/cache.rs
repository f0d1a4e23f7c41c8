//! Mapper tree cache.
//!
//! Trees depend only on the result's column names (in order) and the
//! destination type, so one tree serves every later call with the same pair.

use crate::columns::allocate_columns;
use crate::config::MapperConfig;
use crate::error::Result;
use crate::plan::{analyze, MapperNode};
use crate::shape::Shape;
use dashmap::DashMap;
use rowgraph_value::ColumnMeta;
use std::any::TypeId;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub columns: Vec<String>,
    pub destination: TypeId,
}

impl CacheKey {
    pub fn new(columns: &[ColumnMeta], destination: TypeId) -> Self {
        Self {
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            destination,
        }
    }
}

/// A fully allocated mapper tree. Immutable once built.
#[derive(Debug)]
pub struct MapperTree {
    pub root: MapperNode,
    /// Column names no node claimed, in result order.
    pub unclaimed: Vec<String>,
}

impl MapperTree {
    pub fn build(destination: &Shape, columns: &[ColumnMeta], config: &MapperConfig) -> Result<Self> {
        let mut root = analyze(destination, config.max_depth)?;
        let unclaimed = allocate_columns(&mut root, columns);

        tracing::debug!(
            destination = %destination.describe(),
            nodes = root.walk().len(),
            columns = columns.len(),
            "built mapper tree"
        );
        if !unclaimed.is_empty() {
            tracing::debug!(?unclaimed, "columns not claimed by any field");
        }

        Ok(Self { root, unclaimed })
    }
}

/// Concurrent map from (columns, destination type) to a shared tree.
///
/// Lookups take shard read locks only. A miss builds the tree outside the map
/// and publishes it with `entry().or_insert_with`, so concurrent builders of the
/// same key agree on a single tree. Failed builds are not stored.
#[derive(Debug, Default)]
pub struct MapperCache {
    trees: DashMap<CacheKey, Arc<MapperTree>>,
}

impl MapperCache {
    pub fn new() -> Self {
        Self {
            trees: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn clear(&self) {
        self.trees.clear();
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<MapperTree>> {
        self.trees.get(key).map(|tree| Arc::clone(tree.value()))
    }

    /// Returns the cached tree for `key`, building it with `build` on a miss.
    /// The flag is `true` on a hit.
    pub fn get_or_try_insert_with(
        &self,
        key: CacheKey,
        build: impl FnOnce() -> Result<MapperTree>,
    ) -> Result<(Arc<MapperTree>, bool)> {
        if let Some(tree) = self.get(&key) {
            return Ok((tree, true));
        }
        let built = Arc::new(build()?);
        let tree = Arc::clone(self.trees.entry(key).or_insert_with(|| built).value());
        Ok((tree, false))
    }
}
