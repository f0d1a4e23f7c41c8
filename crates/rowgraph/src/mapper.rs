//! The mapping entry point.

use crate::assemble::assemble;
use crate::cache::{CacheKey, MapperCache, MapperTree};
use crate::config::MapperConfig;
use crate::error::{MapError, Result};
use crate::resolve::{ResolutionTable, Resolver};
use crate::rows::RowSource;
use crate::shape::{Element, Resolved};
use rowgraph_value::{Coerce, ColumnMeta, StandardCoercion};
use std::any::TypeId;
use std::sync::Arc;

/// Maps flat query results onto nested destination values.
///
/// A `RowMapper` is cheap to share: mapper trees are cached per
/// (column names, destination type) and the cache is safe to use from many
/// threads at once.
///
/// ```
/// use rowgraph::{MemoryRows, RowMapper, SqlValue};
///
/// #[derive(Debug, Default)]
/// struct Post {
///     id: i64,
///     title: String,
/// }
///
/// #[derive(Debug, Default)]
/// struct Blog {
///     id: i64,
///     posts: Vec<Post>,
/// }
///
/// rowgraph::entity!(Post { id, title });
/// rowgraph::entity!(Blog { id, posts });
///
/// let mut rows = MemoryRows::untyped(
///     &["id", "posts_id", "posts_title"],
///     vec![
///         vec![SqlValue::Int(1), SqlValue::Int(10), "hello".into()],
///         vec![SqlValue::Int(1), SqlValue::Int(11), "again".into()],
///     ],
/// );
///
/// let mut blogs: Vec<Blog> = Vec::new();
/// RowMapper::new().map(&mut rows, &mut blogs)?;
/// assert_eq!(blogs.len(), 1);
/// assert_eq!(blogs[0].posts.len(), 2);
/// # Ok::<(), rowgraph::MapError>(())
/// ```
pub struct RowMapper {
    cache: MapperCache,
    coercion: Arc<dyn Coerce>,
    config: MapperConfig,
}

impl RowMapper {
    pub fn new() -> Self {
        Self::with_config(MapperConfig::default())
    }

    pub fn with_config(config: MapperConfig) -> Self {
        Self {
            cache: MapperCache::new(),
            coercion: Arc::new(StandardCoercion),
            config,
        }
    }

    /// Replaces the value conversion used for every claimed column.
    pub fn with_coercion(mut self, coercion: impl Coerce + 'static) -> Self {
        self.coercion = Arc::new(coercion);
        self
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn cache(&self) -> &MapperCache {
        &self.cache
    }

    /// The mapper tree for destination `D` over `columns`, from the cache when
    /// caching is enabled.
    pub fn plan<D: Element>(&self, columns: &[ColumnMeta]) -> Result<Arc<MapperTree>> {
        let build = || MapperTree::build(&D::shape(), columns, &self.config);
        if !self.config.cache_trees {
            return Ok(Arc::new(build()?));
        }

        let key = CacheKey::new(columns, TypeId::of::<D>());
        let (tree, hit) = self.cache.get_or_try_insert_with(key, build)?;
        if hit {
            tracing::debug!(destination = std::any::type_name::<D>(), "mapper tree cache hit");
        } else {
            tracing::debug!(destination = std::any::type_name::<D>(), "mapper tree cache miss");
        }
        Ok(tree)
    }

    /// Reads every row of `rows` and merges the resulting graph into `dst`.
    ///
    /// Sequences are appended to; single destinations are overwritten, or left
    /// untouched when there are no rows. `rows` is closed exactly once on every
    /// path, including when planning fails before the first row is read.
    pub fn map<D, R>(&self, rows: &mut R, dst: &mut D) -> Result<()>
    where
        D: Element,
        R: RowSource + ?Sized,
    {
        let outcome = self.read_all::<D, R>(rows);
        let closed = rows.close();

        let resolved = match (outcome, closed) {
            (Ok(resolved), Ok(())) => resolved,
            (Ok(_), Err(close_err)) => return Err(close_err.into()),
            (Err(err), Ok(())) => return Err(err),
            (Err(err), Err(close_err)) => {
                tracing::warn!(error = %close_err, "closing row source failed after a mapping error");
                return Err(err);
            }
        };

        match resolved {
            Resolved::Absent => Ok(()),
            resolved => dst.absorb(resolved),
        }
    }

    fn read_all<D, R>(&self, rows: &mut R) -> Result<Resolved>
    where
        D: Element,
        R: RowSource + ?Sized,
    {
        let columns = rows.columns().to_vec();
        let tree = self.plan::<D>(&columns)?;
        let resolver = Resolver::new(&columns, self.coercion.as_ref());

        let mut table = ResolutionTable::default();
        let mut row_count = 0usize;
        while let Some(row) = rows.next_row()? {
            if row.len() != columns.len() {
                return Err(MapError::RowWidth {
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            resolver.resolve_row(&tree.root, &row, &mut table)?;
            row_count += 1;
        }

        tracing::debug!(
            rows = row_count,
            roots = table.len(),
            destination = std::any::type_name::<D>(),
            "resolved rows"
        );
        assemble(&tree.root, table, self.config.ambiguous_association)
    }
}

impl Default for RowMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RowMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowMapper")
            .field("config", &self.config)
            .field("cached_trees", &self.cache.len())
            .finish_non_exhaustive()
    }
}
