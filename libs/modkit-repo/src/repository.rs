//! Generic repository over any audited SeaORM entity

use crate::audit::{carry_created, AuditContext, AuditedEntity};
use crate::config::RepositoryConfig;
use crate::contract::{PageRequest, PageResult};
use crate::error::RepoResult;
use crate::meta::EntityMeta;
use crate::paginator::{PageOrder, Paginator};
use crate::query::{Include, QueryBuilder, QuerySpec, Related};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, Value,
};
use std::sync::Arc;

/// Maps a fetched row and its loaded relations to the caller's type
pub type Projection<E, D> = Arc<dyn Fn(<E as EntityTrait>::Model, Related) -> D + Send + Sync>;

/// Data access for one entity type, returning `D`
#[async_trait]
pub trait Repository<E: EntityTrait, D>: Send + Sync {
    /// Insert unless a row with the same key exists; returns the stored row.
    /// An auto-increment key left at zero is assigned by the database.
    async fn add(&self, entity: E::Model) -> RepoResult<D>;

    /// Delete by key; `false` when no such row exists
    async fn delete(&self, entity: E::Model) -> RepoResult<bool>;

    /// Update by key; `false` when no such row exists
    async fn update(&self, entity: E::Model) -> RepoResult<bool>;

    async fn get_all(&self) -> RepoResult<Vec<D>>;

    async fn get_by_id(&self, id: Value) -> RepoResult<Option<D>>;

    async fn query(&self, spec: QuerySpec<E>) -> RepoResult<Vec<D>>;

    /// Filter, sort, then window. Explicit sort columns take precedence over
    /// the `QuerySpec` ordering, which takes precedence over newest-first.
    async fn query_paged(
        &self,
        request: &PageRequest,
        spec: QuerySpec<E>,
    ) -> RepoResult<PageResult<D>>;

    async fn query_first(&self, spec: QuerySpec<E>) -> RepoResult<Option<D>>;

    /// Size of the filtered set
    async fn count(&self, spec: QuerySpec<E>) -> RepoResult<u64>;

    async fn exists(&self, id: Value) -> RepoResult<bool>;
}

/// SeaORM implementation of [`Repository`].
///
/// `D` defaults to the entity model itself.
pub struct GenericRepository<E: AuditedEntity, D = <E as EntityTrait>::Model> {
    db: Arc<DatabaseConnection>,
    meta: Arc<EntityMeta<E>>,
    project: Projection<E, D>,
    config: RepositoryConfig,
    actor: Option<String>,
}

impl<E: AuditedEntity, D> Clone for GenericRepository<E, D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            meta: self.meta.clone(),
            project: self.project.clone(),
            config: self.config.clone(),
            actor: self.actor.clone(),
        }
    }
}

impl<E: AuditedEntity> GenericRepository<E> {
    /// Repository returning entity models
    pub fn new(db: Arc<DatabaseConnection>) -> RepoResult<Self> {
        Self::with_projection(db, |model, _| model)
    }
}

impl<E: AuditedEntity, D> GenericRepository<E, D> {
    /// Repository projecting each row with `project`
    pub fn with_projection(
        db: Arc<DatabaseConnection>,
        project: impl Fn(E::Model, Related) -> D + Send + Sync + 'static,
    ) -> RepoResult<Self> {
        Ok(Self {
            db,
            meta: Arc::new(EntityMeta::resolve()?),
            project: Arc::new(project),
            config: RepositoryConfig::default(),
            actor: None,
        })
    }

    /// Repository converting each row with `D::from`
    pub fn mapped(db: Arc<DatabaseConnection>) -> RepoResult<Self>
    where
        D: From<E::Model>,
    {
        Self::with_projection(db, |model, _| D::from(model))
    }

    /// Use pre-built (e.g. registry cached) metadata
    #[must_use]
    pub fn with_meta(mut self, meta: Arc<EntityMeta<E>>) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Actor stamped on writes, overriding the configured default
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn meta(&self) -> &EntityMeta<E> {
        &self.meta
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn actor(&self) -> &str {
        self.actor
            .as_deref()
            .unwrap_or(&self.config.default_actor)
    }

    fn context(&self) -> AuditContext {
        AuditContext::new(self.db.clone()).with_default_actor(self.actor())
    }

    async fn find_model(&self, id: Value) -> Result<Option<E::Model>, DbErr> {
        E::find()
            .filter(self.meta.key().matches(id))
            .one(&*self.db)
            .await
    }

    async fn project_rows(
        &self,
        models: Vec<E::Model>,
        includes: &[Arc<dyn Include<E>>],
    ) -> RepoResult<Vec<D>> {
        let rows = QueryBuilder::hydrate(models, includes, &self.db).await?;
        Ok(rows
            .into_iter()
            .map(|(model, related)| (self.project)(model, related))
            .collect())
    }
}

#[async_trait]
impl<E, D> Repository<E, D> for GenericRepository<E, D>
where
    E: AuditedEntity,
    E::Model: Clone + Send + Sync + IntoActiveModel<E::ActiveModel> + 'static,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
    D: Send + 'static,
{
    async fn add(&self, entity: E::Model) -> RepoResult<D> {
        let mut key = self.meta.key().value_of(&entity);
        let generated = self.meta.key().is_generated(&key);

        if !generated && self.find_model(key.clone()).await?.is_some() {
            tracing::debug!(
                entity = self.meta.entity(),
                key = ?key,
                "Row already exists, insert skipped"
            );
        } else {
            let mut ctx = self.context();
            ctx.add::<E>(entity);
            ctx.save_changes().await?;
            if let Some(stored) = ctx.inserted_keys().first() {
                key = stored.clone();
            }
        }

        let stored = self.find_model(key.clone()).await?.ok_or_else(|| {
            DbErr::RecordNotFound(format!(
                "{} with {} = {:?}",
                self.meta.entity(),
                self.meta.key().name(),
                key
            ))
        })?;
        Ok((self.project)(stored, Related::default()))
    }

    async fn delete(&self, entity: E::Model) -> RepoResult<bool> {
        let key = self.meta.key().value_of(&entity);
        let Some(existing) = self.find_model(key.clone()).await? else {
            tracing::debug!(
                entity = self.meta.entity(),
                key = ?key,
                "Row not found, delete skipped"
            );
            return Ok(false);
        };

        let mut ctx = self.context();
        ctx.remove::<E>(existing);
        ctx.save_changes().await?;
        Ok(true)
    }

    async fn update(&self, entity: E::Model) -> RepoResult<bool> {
        let key = self.meta.key().value_of(&entity);
        let Some(stored) = self.find_model(key.clone()).await? else {
            tracing::debug!(
                entity = self.meta.entity(),
                key = ?key,
                "Row not found, update skipped"
            );
            return Ok(false);
        };

        let mut entity = entity;
        carry_created::<E>(&stored, &mut entity);

        let mut ctx = self.context();
        ctx.update::<E>(entity);
        ctx.save_changes().await?;
        Ok(true)
    }

    async fn get_all(&self) -> RepoResult<Vec<D>> {
        let models = E::find().all(&*self.db).await?;
        self.project_rows(models, &[]).await
    }

    async fn get_by_id(&self, id: Value) -> RepoResult<Option<D>> {
        Ok(self
            .find_model(id)
            .await?
            .map(|model| (self.project)(model, Related::default())))
    }

    async fn query(&self, spec: QuerySpec<E>) -> RepoResult<Vec<D>> {
        let models = QueryBuilder::build(&spec).all(&*self.db).await?;
        self.project_rows(models, spec.includes()).await
    }

    async fn query_paged(
        &self,
        request: &PageRequest,
        spec: QuerySpec<E>,
    ) -> RepoResult<PageResult<D>> {
        let window = request.window(self.config.max_page_size)?;
        let sort = self.meta.sort_resolver().resolve(
            request.sort_column.as_deref(),
            request.sort_direction.as_deref(),
        )?;

        let order = match spec.ordering() {
            Some(order) if !sort.is_explicit() => PageOrder::Custom(order.clone()),
            _ => PageOrder::Sort(sort),
        };
        let tiebreak = self
            .config
            .key_tiebreak
            .then(|| self.meta.key().column());

        let (total, models) = Paginator::new(&self.db)
            .fetch(QueryBuilder::filtered(&spec), window, &order, tiebreak)
            .await?;
        let items = self.project_rows(models, spec.includes()).await?;

        Ok(PageResult {
            total_count: total,
            page: request.page,
            page_size: window.take,
            sort_column: request.sort_column.clone(),
            sort_direction: request.sort_direction.clone(),
            items,
        })
    }

    async fn query_first(&self, spec: QuerySpec<E>) -> RepoResult<Option<D>> {
        let Some(model) = QueryBuilder::build(&spec).one(&*self.db).await? else {
            return Ok(None);
        };
        Ok(self.project_rows(vec![model], spec.includes()).await?.pop())
    }

    async fn count(&self, spec: QuerySpec<E>) -> RepoResult<u64> {
        Ok(QueryBuilder::filtered(&spec).count(&*self.db).await?)
    }

    async fn exists(&self, id: Value) -> RepoResult<bool> {
        Ok(self.find_model(id).await?.is_some())
    }
}
