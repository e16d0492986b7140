//! Dynamic sort resolution
//!
//! Sort columns arrive as free-form strings. They are matched against a
//! per-entity whitelist instead of reflecting over model fields at runtime.

use crate::contract::SortDirection;
use crate::error::{RepoError, RepoResult};
use heck::ToSnakeCase;
use sea_orm::{EntityTrait, IdenStatic, Iterable, QueryOrder, Select};
use std::collections::HashMap;
use std::fmt;

/// Sortable columns of one entity, keyed by lower-cased API name
pub struct SortFields<E: EntityTrait> {
    map: HashMap<String, E::Column>,
}

impl<E: EntityTrait> Clone for SortFields<E> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<E: EntityTrait> Default for SortFields<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> fmt::Debug for SortFields<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

impl<E: EntityTrait> SortFields<E> {
    /// Empty whitelist
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Every column of the entity, under its column name
    pub fn all() -> Self {
        Self::only(E::Column::iter())
    }

    /// The given columns, under their column names
    pub fn only(columns: impl IntoIterator<Item = E::Column>) -> Self {
        columns
            .into_iter()
            .fold(Self::new(), |fields, col| fields.insert(col.as_str(), col))
    }

    /// Register `col` under an API name (matched case-insensitively)
    #[must_use]
    pub fn insert(mut self, api_name: impl Into<String>, col: E::Column) -> Self {
        self.map.insert(api_name.into().to_lowercase(), col);
        self
    }

    /// Look up a column: lower-cased name first, then its snake_case form
    pub fn get(&self, name: &str) -> Option<E::Column> {
        let name = name.trim();
        self.map
            .get(&name.to_lowercase())
            .or_else(|| self.map.get(&name.to_snake_case()))
            .copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Resolves a requested sort against an entity's whitelist
pub struct SortResolver<'a, E: EntityTrait> {
    entity: &'a str,
    fields: &'a SortFields<E>,
    default_column: E::Column,
}

impl<'a, E: EntityTrait> SortResolver<'a, E> {
    /// `default_column` is sorted descending when no column is requested
    pub fn new(entity: &'a str, fields: &'a SortFields<E>, default_column: E::Column) -> Self {
        Self {
            entity,
            fields,
            default_column,
        }
    }

    pub fn resolve(
        &self,
        column: Option<&str>,
        direction: Option<&str>,
    ) -> RepoResult<ResolvedSort<E>> {
        let requested = match column.map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => {
                return Ok(ResolvedSort {
                    column: self.default_column,
                    direction: SortDirection::Desc,
                    explicit: false,
                })
            }
        };

        let col = self
            .fields
            .get(requested)
            .ok_or_else(|| RepoError::SortColumn {
                entity: self.entity.to_string(),
                column: requested.to_string(),
            })?;

        let direction = SortDirection::lenient(direction);
        tracing::debug!(
            entity = self.entity,
            column = col.as_str(),
            %direction,
            "Resolved sort"
        );

        Ok(ResolvedSort {
            column: col,
            direction,
            explicit: true,
        })
    }
}

/// A sort column and direction ready to apply to a query
pub struct ResolvedSort<E: EntityTrait> {
    column: E::Column,
    direction: SortDirection,
    explicit: bool,
}

impl<E: EntityTrait> Clone for ResolvedSort<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: EntityTrait> Copy for ResolvedSort<E> {}

impl<E: EntityTrait> fmt::Debug for ResolvedSort<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSort")
            .field("column", &self.column.as_str())
            .field("direction", &self.direction)
            .field("explicit", &self.explicit)
            .finish()
    }
}

impl<E: EntityTrait> ResolvedSort<E> {
    pub fn column(&self) -> E::Column {
        self.column
    }

    pub fn column_name(&self) -> &str {
        self.column.as_str()
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// False when no column was requested and the default applies
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn apply(&self, select: Select<E>) -> Select<E> {
        match self.direction {
            SortDirection::Asc => select.order_by_asc(self.column),
            SortDirection::Desc => select.order_by_desc(self.column),
        }
    }
}
