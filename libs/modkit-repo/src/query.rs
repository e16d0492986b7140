//! Query specs, include loaders and the shared query builder

use crate::audit::entity_name;
use async_trait::async_trait;
use sea_orm::sea_query::IntoCondition;
use sea_orm::{
    Condition, DatabaseConnection, DbErr, EntityTrait, LoaderTrait, QueryFilter, RelationType,
    Select,
};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Ordering function applied to a built query
pub type OrderFn<E> = Arc<dyn Fn(Select<E>) -> Select<E> + Send + Sync>;

/// Related rows loaded for one row, per include
type LoadedRows = Box<dyn Any + Send + Sync>;

/// Loads one relation for a batch of rows.
///
/// Implementations return one entry per input model, in input order.
#[async_trait]
pub trait Include<E: EntityTrait>: Send + Sync {
    /// Identifies the related entity type in a [`Related`] bag
    fn key(&self) -> TypeId;

    fn relation(&self) -> String;

    async fn load(
        &self,
        models: &[E::Model],
        db: &DatabaseConnection,
    ) -> Result<Vec<LoadedRows>, DbErr>;
}

/// Include for any `R` with `E: sea_orm::Related<R>`
pub struct IncludeRelated<R>(PhantomData<fn() -> R>);

impl<R> IncludeRelated<R> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<R> Default for IncludeRelated<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E, R> Include<E> for IncludeRelated<R>
where
    E: EntityTrait + sea_orm::Related<R>,
    E::Model: Sync,
    R: EntityTrait,
    R::Model: Send + Sync + 'static,
{
    fn key(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn relation(&self) -> String {
        entity_name::<R>()
    }

    async fn load(
        &self,
        models: &[E::Model],
        db: &DatabaseConnection,
    ) -> Result<Vec<LoadedRows>, DbErr> {
        let rows: Vec<Vec<R::Model>> = match <E as sea_orm::Related<R>>::to().rel_type {
            RelationType::HasOne => {
                let loaded: Vec<Option<R::Model>> = models.load_one(R::default(), db).await?;
                loaded.into_iter().map(|m| m.into_iter().collect()).collect()
            }
            RelationType::HasMany => models.load_many(R::default(), db).await?,
        };
        Ok(rows
            .into_iter()
            .map(|v| Box::new(v) as LoadedRows)
            .collect())
    }
}

/// Related rows attached to one fetched row
#[derive(Default)]
pub struct Related {
    loaded: HashMap<TypeId, LoadedRows>,
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Related")
            .field("includes", &self.loaded.len())
            .finish()
    }
}

impl Related {
    /// Loaded rows of `R`; empty when `R` was not included
    pub fn get<R>(&self) -> &[R::Model]
    where
        R: EntityTrait,
        R::Model: 'static,
    {
        self.loaded
            .get(&TypeId::of::<R>())
            .and_then(|rows| rows.downcast_ref::<Vec<R::Model>>())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First loaded row of `R`, for to-one relations
    pub fn first<R>(&self) -> Option<&R::Model>
    where
        R: EntityTrait,
        R::Model: 'static,
    {
        self.get::<R>().first()
    }

    /// Move the loaded rows of `R` out of the bag
    pub fn take<R>(&mut self) -> Vec<R::Model>
    where
        R: EntityTrait,
        R::Model: 'static,
    {
        self.loaded
            .remove(&TypeId::of::<R>())
            .and_then(|rows| rows.downcast::<Vec<R::Model>>().ok())
            .map(|rows| *rows)
            .unwrap_or_default()
    }

    /// Whether `R` was included
    pub fn contains<R: EntityTrait>(&self) -> bool {
        self.loaded.contains_key(&TypeId::of::<R>())
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

/// What to fetch: a filter, relations to load, and an optional ordering.
///
/// ```rust,ignore
/// let spec = QuerySpec::<product::Entity>::new()
///     .filter(product::Column::Price.gt(10))
///     .include::<category::Entity>()
///     .order_by(|q| q.order_by_asc(product::Column::Name));
/// ```
pub struct QuerySpec<E: EntityTrait> {
    filter: Option<Condition>,
    includes: Vec<Arc<dyn Include<E>>>,
    order: Option<OrderFn<E>>,
}

impl<E: EntityTrait> Default for QuerySpec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> Clone for QuerySpec<E> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            includes: self.includes.clone(),
            order: self.order.clone(),
        }
    }
}

impl<E: EntityTrait> fmt::Debug for QuerySpec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("filter", &self.filter)
            .field(
                "includes",
                &self.includes.iter().map(|i| i.relation()).collect::<Vec<_>>(),
            )
            .field("ordered", &self.order.is_some())
            .finish()
    }
}

impl<E: EntityTrait> QuerySpec<E> {
    /// No filter, no includes, store order
    pub fn new() -> Self {
        Self {
            filter: None,
            includes: Vec::new(),
            order: None,
        }
    }

    /// AND `condition` into the filter
    #[must_use]
    pub fn filter(mut self, condition: impl IntoCondition) -> Self {
        let condition = condition.into_condition();
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.add(condition),
            None => Condition::all().add(condition),
        });
        self
    }

    /// Load `R` for every fetched row
    #[must_use]
    pub fn include<R>(self) -> Self
    where
        E: sea_orm::Related<R>,
        E::Model: Sync,
        R: EntityTrait,
        R::Model: Send + Sync + 'static,
    {
        self.include_with(IncludeRelated::<R>::new())
    }

    /// Load rows with a custom loader
    #[must_use]
    pub fn include_with(mut self, include: impl Include<E> + 'static) -> Self {
        self.includes.push(Arc::new(include));
        self
    }

    #[must_use]
    pub fn order_by(
        mut self,
        order: impl Fn(Select<E>) -> Select<E> + Send + Sync + 'static,
    ) -> Self {
        self.order = Some(Arc::new(order));
        self
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.filter.as_ref()
    }

    pub fn includes(&self) -> &[Arc<dyn Include<E>>] {
        &self.includes
    }

    pub fn ordering(&self) -> Option<&OrderFn<E>> {
        self.order.as_ref()
    }
}

/// Builds the primary query of a [`QuerySpec`] and hydrates its includes
pub struct QueryBuilder;

impl QueryBuilder {
    /// `E::find()` with the filter applied, unordered
    pub fn filtered<E: EntityTrait>(spec: &QuerySpec<E>) -> Select<E> {
        let select = E::find();
        match &spec.filter {
            Some(condition) => select.filter(condition.clone()),
            None => select,
        }
    }

    /// Filtered query with the ordering function applied
    pub fn build<E: EntityTrait>(spec: &QuerySpec<E>) -> Select<E> {
        let select = Self::filtered(spec);
        tracing::debug!(
            entity = %entity_name::<E>(),
            filtered = spec.filter.is_some(),
            ordered = spec.order.is_some(),
            includes = spec.includes.len(),
            "Built query"
        );
        match &spec.order {
            Some(order) => order(select),
            None => select,
        }
    }

    /// Run every include against the fetched rows, one batched query each
    pub async fn hydrate<E: EntityTrait>(
        models: Vec<E::Model>,
        includes: &[Arc<dyn Include<E>>],
        db: &DatabaseConnection,
    ) -> Result<Vec<(E::Model, Related)>, DbErr> {
        let mut bags: Vec<Related> = models.iter().map(|_| Related::default()).collect();

        if !models.is_empty() {
            for include in includes {
                let loaded = include.load(&models, db).await?;
                tracing::debug!(
                    relation = %include.relation(),
                    rows = models.len(),
                    "Loaded include"
                );
                let key = include.key();
                for (bag, rows) in bags.iter_mut().zip(loaded) {
                    bag.loaded.insert(key, rows);
                }
            }
        }

        Ok(models.into_iter().zip(bags).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ColumnTrait, DbBackend, QueryOrder, QueryTrait};

    mod item {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "items")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: i32,
            pub name: String,
            pub qty: i32,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    fn sql(select: Select<item::Entity>) -> String {
        select.build(DbBackend::Sqlite).to_string()
    }

    #[test]
    fn empty_query_selects_everything() {
        let spec = QuerySpec::<item::Entity>::new();
        let sql = sql(QueryBuilder::build(&spec));
        assert!(!sql.contains("WHERE"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn filters_are_and_composed() {
        let spec = QuerySpec::<item::Entity>::new()
            .filter(item::Column::Qty.gt(1))
            .filter(item::Column::Name.eq("a"));
        let sql = sql(QueryBuilder::build(&spec));
        assert!(sql.contains(r#""items"."qty" > 1"#), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
        assert!(sql.contains(r#""items"."name" = 'a'"#), "{sql}");
    }

    #[test]
    fn ordering_applies_only_to_built_query() {
        let spec = QuerySpec::<item::Entity>::new()
            .filter(item::Column::Qty.gt(1))
            .order_by(|q| q.order_by_desc(item::Column::Name));
        assert!(spec.ordering().is_some());

        let built = sql(QueryBuilder::build(&spec));
        assert!(built.ends_with(r#"ORDER BY "items"."name" DESC"#), "{built}");

        let filtered = sql(QueryBuilder::filtered(&spec));
        assert!(!filtered.contains("ORDER BY"), "{filtered}");
    }

    #[test]
    fn clone_keeps_every_part() {
        let spec = QuerySpec::<item::Entity>::new()
            .filter(item::Column::Qty.gt(1))
            .order_by(|q| q.order_by_asc(item::Column::Id));
        let copy = spec.clone();
        assert_eq!(sql(QueryBuilder::build(&spec)), sql(QueryBuilder::build(&copy)));
    }

    #[test]
    fn empty_bag_returns_nothing() {
        let mut related = Related::default();
        assert!(related.is_empty());
        assert!(!related.contains::<item::Entity>());
        assert!(related.get::<item::Entity>().is_empty());
        assert!(related.first::<item::Entity>().is_none());
        assert!(related.take::<item::Entity>().is_empty());
    }
}
