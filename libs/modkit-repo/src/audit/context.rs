//! Unit of work that stamps audit columns on save

use super::{entity_name, AuditStamp, AuditedEntity};
use crate::config::DEFAULT_ACTOR;
use crate::error::{RepoError, RepoResult};
use async_trait::async_trait;
use crate::meta::is_unset_key;
use sea_orm::sea_query::{IntoValueTuple, ValueTuple};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, IntoActiveModel, Iterable, ModelTrait, PrimaryKeyToColumn, PrimaryKeyTrait,
    TransactionTrait, Value,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a pending entry will do on save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Modified,
    Unchanged,
    Deleted,
}

/// Outcome of writing one entry
struct Applied {
    rows: u64,
    /// Key of an inserted row, as stored
    key: Option<Value>,
}

impl Applied {
    fn rows(rows: u64) -> Self {
        Self { rows, key: None }
    }
}

#[async_trait]
trait PendingChange: Send + Sync {
    fn state(&self) -> EntryState;

    fn entity(&self) -> &str;

    /// Write one entry; the stored model is never modified
    async fn apply(&self, txn: &DatabaseTransaction, stamp: &AuditStamp)
        -> Result<Applied, DbErr>;
}

struct Entry<E: EntityTrait> {
    state: EntryState,
    model: E::Model,
    entity: String,
    _marker: PhantomData<fn() -> E>,
}

/// Active model with every column marked for writing
fn active_model<E>(model: &E::Model) -> E::ActiveModel
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelTrait<Entity = E>,
{
    let mut am = <E::ActiveModel as ActiveModelTrait>::default();
    for col in E::Column::iter() {
        am.set(col, model.get(col));
    }
    am
}

/// Active model for an insert. An auto-increment key still holding its
/// default value is left unset so the database assigns it.
fn insert_model<E>(model: &E::Model) -> E::ActiveModel
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelTrait<Entity = E>,
{
    let mut am = active_model::<E>(model);
    if <E::PrimaryKey as PrimaryKeyTrait>::auto_increment() {
        for pk in E::PrimaryKey::iter() {
            let col = pk.into_column();
            if is_unset_key(&model.get(col)) {
                am.not_set(col);
            }
        }
    }
    am
}

#[async_trait]
impl<E> PendingChange for Entry<E>
where
    E: AuditedEntity,
    E::Model: Clone + Send + Sync + IntoActiveModel<E::ActiveModel> + 'static,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
{
    fn state(&self) -> EntryState {
        self.state
    }

    fn entity(&self) -> &str {
        &self.entity
    }

    async fn apply(
        &self,
        txn: &DatabaseTransaction,
        stamp: &AuditStamp,
    ) -> Result<Applied, DbErr> {
        let mut model = self.model.clone();
        match self.state {
            EntryState::Added => {
                stamp.stamp_created::<E>(&mut model);
                stamp.stamp_updated::<E>(&mut model);
                let inserted = E::insert(insert_model::<E>(&model)).exec(txn).await?;
                let key = match inserted.last_insert_id.into_value_tuple() {
                    ValueTuple::One(key) => Some(key),
                    _ => None,
                };
                Ok(Applied { rows: 1, key })
            }
            EntryState::Modified => {
                stamp.stamp_updated::<E>(&mut model);
                match E::update(active_model::<E>(&model)).exec(txn).await {
                    Ok(_) => Ok(Applied::rows(1)),
                    Err(DbErr::RecordNotUpdated) => Ok(Applied::rows(0)),
                    Err(e) => Err(e),
                }
            }
            EntryState::Deleted => {
                let deleted = E::delete(active_model::<E>(&model)).exec(txn).await?;
                Ok(Applied::rows(deleted.rows_affected))
            }
            EntryState::Unchanged => Ok(Applied::rows(0)),
        }
    }
}

/// Tracks pending entity changes and writes them in one transaction.
///
/// Audit columns are stamped on a copy of each entry at write time. A save
/// that fails or is cancelled leaves the pending list exactly as registered.
pub struct AuditContext {
    db: Arc<DatabaseConnection>,
    default_actor: String,
    pending: Vec<Box<dyn PendingChange>>,
    inserted: Vec<Value>,
}

impl AuditContext {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            default_actor: DEFAULT_ACTOR.to_string(),
            pending: Vec::new(),
            inserted: Vec::new(),
        }
    }

    /// Actor used by [`save_changes`](Self::save_changes)
    #[must_use]
    pub fn with_default_actor(mut self, actor: impl Into<String>) -> Self {
        self.default_actor = actor.into();
        self
    }

    pub fn default_actor(&self) -> &str {
        &self.default_actor
    }

    pub fn add<E>(&mut self, model: E::Model)
    where
        E: AuditedEntity,
        E::Model: Clone + Send + Sync + IntoActiveModel<E::ActiveModel> + 'static,
        E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
    {
        self.track::<E>(EntryState::Added, model);
    }

    pub fn update<E>(&mut self, model: E::Model)
    where
        E: AuditedEntity,
        E::Model: Clone + Send + Sync + IntoActiveModel<E::ActiveModel> + 'static,
        E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
    {
        self.track::<E>(EntryState::Modified, model);
    }

    pub fn remove<E>(&mut self, model: E::Model)
    where
        E: AuditedEntity,
        E::Model: Clone + Send + Sync + IntoActiveModel<E::ActiveModel> + 'static,
        E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
    {
        self.track::<E>(EntryState::Deleted, model);
    }

    /// Track an entity without writing it
    pub fn attach<E>(&mut self, model: E::Model)
    where
        E: AuditedEntity,
        E::Model: Clone + Send + Sync + IntoActiveModel<E::ActiveModel> + 'static,
        E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
    {
        self.track::<E>(EntryState::Unchanged, model);
    }

    fn track<E>(&mut self, state: EntryState, model: E::Model)
    where
        E: AuditedEntity,
        E::Model: Clone + Send + Sync + IntoActiveModel<E::ActiveModel> + 'static,
        E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
    {
        self.pending.push(Box::new(Entry::<E> {
            state,
            model,
            entity: entity_name::<E>(),
            _marker: PhantomData,
        }));
    }

    /// Number of pending entries
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Entity name and state of every pending entry, in registration order
    pub fn entries(&self) -> impl Iterator<Item = (&str, EntryState)> + '_ {
        self.pending.iter().map(|e| (e.entity(), e.state()))
    }

    /// Keys of the rows inserted by the last successful save, in
    /// registration order. Database-assigned keys appear here.
    pub fn inserted_keys(&self) -> &[Value] {
        &self.inserted
    }

    /// Drop all pending entries without writing them
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Save as the default actor
    pub async fn save_changes(&mut self) -> RepoResult<u64> {
        let actor = self.default_actor.clone();
        self.save_changes_as(&actor).await
    }

    /// Save as `actor`, returning the number of rows affected
    pub async fn save_changes_as(&mut self, actor: &str) -> RepoResult<u64> {
        self.save(actor, None).await
    }

    /// Save as `actor` unless `cancel` fires first.
    ///
    /// The token is checked before each entry is written and once more
    /// before the commit. A cancelled save rolls back and keeps its pending
    /// entries. Once the commit has started the save runs to completion.
    pub async fn save_changes_with_cancel(
        &mut self,
        actor: &str,
        cancel: &CancellationToken,
    ) -> RepoResult<u64> {
        self.save(actor, Some(cancel)).await
    }

    async fn save(&mut self, actor: &str, cancel: Option<&CancellationToken>) -> RepoResult<u64> {
        let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);
        if cancelled() {
            tracing::warn!(actor, "Save cancelled before start");
            return Err(RepoError::Cancelled);
        }
        if self.pending.is_empty() {
            tracing::debug!("Nothing to save");
            return Ok(0);
        }

        let stamp = AuditStamp::now(actor);
        let txn = self.db.begin().await?;

        let mut rows = 0;
        let mut inserted = Vec::new();
        for entry in &self.pending {
            if cancelled() {
                tracing::warn!(actor, "Save cancelled, rolling back");
                rollback(txn).await;
                return Err(RepoError::Cancelled);
            }
            match entry.apply(&txn, &stamp).await {
                Ok(applied) => {
                    rows += applied.rows;
                    inserted.extend(applied.key);
                }
                Err(e) => {
                    tracing::warn!(
                        entity = entry.entity(),
                        state = ?entry.state(),
                        actor,
                        error = %e,
                        "Save failed, rolling back"
                    );
                    rollback(txn).await;
                    return Err(e.into());
                }
            }
        }

        if cancelled() {
            tracing::warn!(actor, "Save cancelled before commit, rolling back");
            rollback(txn).await;
            return Err(RepoError::Cancelled);
        }

        txn.commit().await?;
        tracing::info!(
            entries = self.pending.len(),
            rows,
            actor,
            "Saved changes"
        );
        self.pending.clear();
        self.inserted = inserted;
        Ok(rows)
    }
}

async fn rollback(txn: DatabaseTransaction) {
    if let Err(e) = txn.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
}

impl std::fmt::Debug for AuditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditContext")
            .field("default_actor", &self.default_actor)
            .field("pending", &self.pending.len())
            .field("inserted", &self.inserted.len())
            .finish_non_exhaustive()
    }
}
