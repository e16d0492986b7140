//! Entity metadata resolved once at startup
//!
//! [`EntityMeta`] bundles what the generic repository needs to know about an
//! entity type: its key column, the columns callers may sort by, and its
//! validated audit columns. Building it is the only place where a
//! misconfigured entity is detected.

use crate::audit::{entity_name, AuditColumns, AuditedEntity};
use crate::error::{RepoError, RepoResult};
use crate::sort::{SortFields, SortResolver};
use parking_lot::RwLock;
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ColumnTrait, EntityTrait, IdenStatic, Iterable, ModelTrait, PrimaryKeyToColumn,
    PrimaryKeyTrait, Value,
};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reads and matches the single primary-key column of an entity
pub struct KeyAccessor<E: EntityTrait> {
    column: E::Column,
}

impl<E: EntityTrait> Clone for KeyAccessor<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: EntityTrait> Copy for KeyAccessor<E> {}

impl<E: EntityTrait> fmt::Debug for KeyAccessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyAccessor").field(&self.name()).finish()
    }
}

impl<E: EntityTrait> KeyAccessor<E> {
    /// Exactly one key column is required
    pub fn resolve() -> RepoResult<Self> {
        let mut keys = E::PrimaryKey::iter();
        match (keys.next(), keys.next()) {
            (Some(pk), None) => Ok(Self {
                column: pk.into_column(),
            }),
            _ => Err(RepoError::KeyResolution {
                entity: entity_name::<E>(),
                key_columns: E::PrimaryKey::iter().count(),
            }),
        }
    }

    pub fn column(&self) -> E::Column {
        self.column
    }

    pub fn name(&self) -> &str {
        self.column.as_str()
    }

    pub fn value_of(&self, model: &E::Model) -> Value {
        model.get(self.column)
    }

    pub fn auto_increment(&self) -> bool {
        <E::PrimaryKey as PrimaryKeyTrait>::auto_increment()
    }

    /// Whether inserting `value` lets the database assign the key
    pub fn is_generated(&self, value: &Value) -> bool {
        self.auto_increment() && is_unset_key(value)
    }

    /// `key = value`
    pub fn matches(&self, value: impl Into<Value>) -> SimpleExpr {
        self.column.eq(value)
    }
}

/// Null or zero: the value an auto-increment key holds before insert
pub(crate) fn is_unset_key(value: &Value) -> bool {
    matches!(
        value,
        Value::TinyInt(None | Some(0))
            | Value::SmallInt(None | Some(0))
            | Value::Int(None | Some(0))
            | Value::BigInt(None | Some(0))
            | Value::TinyUnsigned(None | Some(0))
            | Value::SmallUnsigned(None | Some(0))
            | Value::Unsigned(None | Some(0))
            | Value::BigUnsigned(None | Some(0))
    )
}

/// Key, sortable columns and audit columns of one entity
pub struct EntityMeta<E: AuditedEntity> {
    entity: String,
    key: KeyAccessor<E>,
    sortable: SortFields<E>,
    audit: AuditColumns<E::Column>,
}

impl<E: AuditedEntity> fmt::Debug for EntityMeta<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMeta")
            .field("entity", &self.entity)
            .field("key", &self.key)
            .field("sortable", &self.sortable)
            .finish_non_exhaustive()
    }
}

impl<E: AuditedEntity> EntityMeta<E> {
    /// Resolve the key and validate the audit columns. Every column is
    /// sortable until narrowed.
    pub fn resolve() -> RepoResult<Self> {
        let entity = entity_name::<E>();
        let key = KeyAccessor::resolve()?;
        let audit = E::audit_columns();
        audit.validate(&entity)?;

        tracing::debug!(entity = %entity, key = key.name(), "Resolved entity metadata");

        Ok(Self {
            entity,
            key,
            sortable: SortFields::all(),
            audit,
        })
    }

    /// Restrict sorting to the given columns
    #[must_use]
    pub fn sortable_only(mut self, columns: impl IntoIterator<Item = E::Column>) -> Self {
        self.sortable = SortFields::only(columns);
        self
    }

    /// Replace the sortable columns, e.g. to add API aliases
    #[must_use]
    pub fn with_sort_fields(mut self, fields: SortFields<E>) -> Self {
        self.sortable = fields;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn key(&self) -> &KeyAccessor<E> {
        &self.key
    }

    pub fn sortable(&self) -> &SortFields<E> {
        &self.sortable
    }

    pub fn audit_columns(&self) -> &AuditColumns<E::Column> {
        &self.audit
    }

    /// Resolver defaulting to newest-first by creation time
    pub fn sort_resolver(&self) -> SortResolver<'_, E> {
        SortResolver::new(&self.entity, &self.sortable, self.audit.created_at)
    }
}

/// Startup cache of [`EntityMeta`] per entity type
#[derive(Default)]
pub struct MetaRegistry {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl MetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `meta`, replacing any previous entry for `E`
    pub fn register<E: AuditedEntity>(&self, meta: EntityMeta<E>) -> Arc<EntityMeta<E>> {
        let meta = Arc::new(meta);
        self.entries
            .write()
            .insert(TypeId::of::<E>(), meta.clone() as Arc<dyn Any + Send + Sync>);
        meta
    }

    pub fn get<E: AuditedEntity>(&self) -> Option<Arc<EntityMeta<E>>> {
        let entry = self.entries.read().get(&TypeId::of::<E>()).cloned()?;
        entry.downcast::<EntityMeta<E>>().ok()
    }

    /// Cached metadata for `E`, resolving and registering it on first use
    pub fn get_or_resolve<E: AuditedEntity>(&self) -> RepoResult<Arc<EntityMeta<E>>> {
        if let Some(meta) = self.get::<E>() {
            return Ok(meta);
        }
        Ok(self.register(EntityMeta::<E>::resolve()?))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for MetaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaRegistry")
            .field("entries", &self.len())
            .finish()
    }
}
