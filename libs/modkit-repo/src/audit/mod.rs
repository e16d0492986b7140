//! Audit stamping
//!
//! Every repository-managed entity carries four audit columns. The entity
//! names them through [`AuditedEntity`]; the [`AuditContext`] writes them on
//! save, inside the same transaction as the data change.

mod context;

pub use context::{AuditContext, EntryState};

use crate::error::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ColumnType, EntityTrait, ModelTrait, Value};

/// Contract for entities the generic repository can manage.
///
/// Timestamp columns must be `DateTimeUtc` or `DateTimeWithTimeZone` fields,
/// actor columns `String`.
///
/// ```rust,ignore
/// impl AuditedEntity for product::Entity {
///     fn audit_columns() -> AuditColumns<product::Column> {
///         AuditColumns {
///             created_at: product::Column::CreatedAtUtc,
///             created_by: product::Column::CreatedBy,
///             updated_at: product::Column::UpdatedAtUtc,
///             updated_by: product::Column::UpdatedBy,
///         }
///     }
/// }
/// ```
pub trait AuditedEntity: EntityTrait {
    fn audit_columns() -> AuditColumns<Self::Column>;
}

/// The columns holding creation and update stamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditColumns<C> {
    pub created_at: C,
    pub created_by: C,
    pub updated_at: C,
    pub updated_by: C,
}

impl<C: ColumnTrait> AuditColumns<C> {
    /// Check the declared column types once, at metadata build time
    pub fn validate(&self, entity: &str) -> RepoResult<()> {
        for col in [self.created_at, self.updated_at] {
            check_column(entity, col, "a UTC timestamp column", |ty| {
                matches!(ty, ColumnType::TimestampWithTimeZone)
            })?;
        }
        for col in [self.created_by, self.updated_by] {
            check_column(entity, col, "a string column", |ty| {
                matches!(ty, ColumnType::String(_) | ColumnType::Text)
            })?;
        }
        Ok(())
    }
}

fn check_column<C: ColumnTrait>(
    entity: &str,
    col: C,
    expected: &'static str,
    accepts: impl Fn(&ColumnType) -> bool,
) -> RepoResult<()> {
    if accepts(col.def().get_column_type()) {
        Ok(())
    } else {
        Err(RepoError::AuditColumns {
            entity: entity.to_string(),
            column: col.as_str().to_string(),
            expected,
        })
    }
}

/// One save's stamp: a single instant and the acting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub at: DateTime<Utc>,
    pub actor: String,
}

impl AuditStamp {
    pub fn now(actor: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            actor: actor.into(),
        }
    }

    /// Set created_at/created_by
    pub fn stamp_created<E: AuditedEntity>(&self, model: &mut E::Model) {
        let cols = E::audit_columns();
        let at = self.instant_like(&model.get(cols.created_at));
        model.set(cols.created_at, at);
        model.set(cols.created_by, Value::from(self.actor.clone()));
    }

    /// Set updated_at/updated_by
    pub fn stamp_updated<E: AuditedEntity>(&self, model: &mut E::Model) {
        let cols = E::audit_columns();
        let at = self.instant_like(&model.get(cols.updated_at));
        model.set(cols.updated_at, at);
        model.set(cols.updated_by, Value::from(self.actor.clone()));
    }

    /// The stamp instant in the same representation as `current`
    fn instant_like(&self, current: &Value) -> Value {
        match current {
            Value::ChronoDateTimeWithTimeZone(_) => Value::from(self.at.fixed_offset()),
            _ => Value::from(self.at),
        }
    }
}

/// Copy the stored creation stamp onto a model about to be updated
pub(crate) fn carry_created<E: AuditedEntity>(from: &E::Model, onto: &mut E::Model) {
    let cols = E::audit_columns();
    onto.set(cols.created_at, from.get(cols.created_at));
    onto.set(cols.created_by, from.get(cols.created_by));
}

pub(crate) fn entity_name<E: EntityTrait>() -> String {
    E::default().table_name().to_string()
}
