//! Count-then-window page fetching
//!
//! The total and the page rows come from two separate round trips. Under
//! non-serializable isolation a concurrent write between them can make the
//! total disagree with the rows returned.

use crate::contract::PageWindow;
use crate::query::OrderFn;
use crate::sort::ResolvedSort;
use sea_orm::{
    DatabaseConnection, DbErr, EntityTrait, IdenStatic, PaginatorTrait, QueryOrder, QuerySelect,
    Select,
};
use std::fmt;

/// How a page is ordered
pub enum PageOrder<E: EntityTrait> {
    /// A resolved sort column (explicit or the newest-first default)
    Sort(ResolvedSort<E>),
    /// The caller's ordering function
    Custom(OrderFn<E>),
}

impl<E: EntityTrait> PageOrder<E> {
    fn apply(&self, select: Select<E>) -> Select<E> {
        match self {
            Self::Sort(sort) => sort.apply(select),
            Self::Custom(order) => order(select),
        }
    }

    fn sorts_by(&self, column: E::Column) -> bool {
        match self {
            Self::Sort(sort) => sort.column_name() == column.as_str(),
            Self::Custom(_) => false,
        }
    }
}

impl<E: EntityTrait> fmt::Debug for PageOrder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sort(sort) => f.debug_tuple("Sort").field(sort).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Fetches one window of a filtered query together with the filtered total
pub struct Paginator<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> Paginator<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Count `select`, order it, then fetch `window`.
    ///
    /// `tiebreak` is appended ascending after the page order so rows with
    /// equal sort values keep a stable position across pages.
    pub async fn fetch<E>(
        &self,
        select: Select<E>,
        window: PageWindow,
        order: &PageOrder<E>,
        tiebreak: Option<E::Column>,
    ) -> Result<(u64, Vec<E::Model>), DbErr>
    where
        E: EntityTrait,
        E::Model: Send + Sync,
    {
        let total = select.clone().count(self.db).await?;
        if total == 0 || window.skip >= total {
            tracing::debug!(total, skip = window.skip, "Page window is past the end");
            return Ok((total, Vec::new()));
        }

        let mut select = order.apply(select);
        if let Some(key) = tiebreak.filter(|key| !order.sorts_by(*key)) {
            select = select.order_by_asc(key);
        }

        let rows = select
            .offset(window.skip)
            .limit(window.take)
            .all(self.db)
            .await?;

        tracing::debug!(
            total,
            skip = window.skip,
            take = window.take,
            fetched = rows.len(),
            "Fetched page"
        );
        Ok((total, rows))
    }
}
