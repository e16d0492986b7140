//! Generic Repository
//!
//! Entity-agnostic data access over SeaORM: add/update/delete with audit
//! stamping, filtered and projected queries with eager-loaded relations,
//! and sorted, paged queries driven by free-form sort input.
//!
//! Entities opt in by implementing [`AuditedEntity`]. Their key column,
//! sortable columns and audit columns are resolved once into an
//! [`EntityMeta`].

pub mod audit;
pub use audit::{AuditColumns, AuditContext, AuditStamp, AuditedEntity, EntryState};

pub mod config;
pub use config::RepositoryConfig;

pub mod contract;
pub use contract::{PageRequest, PageResult, PageWindow, SortDirection};

pub mod error;
pub use error::{RepoError, RepoResult};

pub mod meta;
pub use meta::{EntityMeta, KeyAccessor, MetaRegistry};

pub mod paginator;
pub use paginator::{PageOrder, Paginator};

pub mod query;
pub use query::{Include, IncludeRelated, QueryBuilder, QuerySpec, Related};

pub mod repository;
pub use repository::{GenericRepository, Projection, Repository};

pub mod sort;
pub use sort::{ResolvedSort, SortFields, SortResolver};
