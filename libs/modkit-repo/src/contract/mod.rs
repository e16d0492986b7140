//! Contract layer - transport-shaped request and result types
//!
//! These types carry no SeaORM dependency and serialize with the camelCase
//! field names HTTP callers expect.

pub mod page;
pub mod sort;

pub use page::{PageRequest, PageResult, PageWindow};
pub use sort::{ParseSortDirectionError, SortDirection};
