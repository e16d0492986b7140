//! Shared fixtures: a category/product schema on in-memory SQLite
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use modkit_repo::{AuditColumns, AuditedEntity};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;

pub mod category {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "categories")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub name: String,
        pub created_at_utc: DateTimeUtc,
        pub created_by: String,
        pub updated_at_utc: DateTimeUtc,
        pub updated_by: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::product::Entity")]
        Products,
    }

    impl Related<super::product::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Products.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod product {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "products")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub name: String,
        pub price: i32,
        pub category_id: i32,
        pub created_at_utc: DateTimeUtc,
        pub created_by: String,
        pub updated_at_utc: DateTimeUtc,
        pub updated_by: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::category::Entity",
            from = "Column::CategoryId",
            to = "super::category::Column::Id"
        )]
        Category,
    }

    impl Related<super::category::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Category.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod widget {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "widgets")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub created_at_utc: DateTimeUtc,
        pub created_by: String,
        pub updated_at_utc: DateTimeUtc,
        pub updated_by: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl AuditedEntity for category::Entity {
    fn audit_columns() -> AuditColumns<category::Column> {
        AuditColumns {
            created_at: category::Column::CreatedAtUtc,
            created_by: category::Column::CreatedBy,
            updated_at: category::Column::UpdatedAtUtc,
            updated_by: category::Column::UpdatedBy,
        }
    }
}

impl AuditedEntity for product::Entity {
    fn audit_columns() -> AuditColumns<product::Column> {
        AuditColumns {
            created_at: product::Column::CreatedAtUtc,
            created_by: product::Column::CreatedBy,
            updated_at: product::Column::UpdatedAtUtc,
            updated_by: product::Column::UpdatedBy,
        }
    }
}

impl AuditedEntity for widget::Entity {
    fn audit_columns() -> AuditColumns<widget::Column> {
        AuditColumns {
            created_at: widget::Column::CreatedAtUtc,
            created_by: widget::Column::CreatedBy,
            updated_at: widget::Column::UpdatedAtUtc,
            updated_by: widget::Column::UpdatedBy,
        }
    }
}

pub mod migrations {
    use sea_orm_migration::prelude::*;

    pub struct Migrator;

    #[async_trait::async_trait]
    impl MigratorTrait for Migrator {
        fn migrations() -> Vec<Box<dyn MigrationTrait>> {
            vec![
                Box::new(m20250101_000001_create_categories::Migration),
                Box::new(m20250101_000002_create_products::Migration),
                Box::new(m20250101_000003_create_widgets::Migration),
            ]
        }
    }

    mod m20250101_000001_create_categories {
        use super::*;

        pub struct Migration;

        impl MigrationName for Migration {
            fn name(&self) -> &str {
                "m20250101_000001_create_categories"
            }
        }

        #[async_trait::async_trait]
        impl MigrationTrait for Migration {
            async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .create_table(
                        Table::create()
                            .table(Categories::Table)
                            .if_not_exists()
                            .col(
                                ColumnDef::new(Categories::Id)
                                    .integer()
                                    .not_null()
                                    .primary_key(),
                            )
                            .col(ColumnDef::new(Categories::Name).string().not_null())
                            .col(
                                ColumnDef::new(Categories::CreatedAtUtc)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .col(ColumnDef::new(Categories::CreatedBy).string().not_null())
                            .col(
                                ColumnDef::new(Categories::UpdatedAtUtc)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .col(ColumnDef::new(Categories::UpdatedBy).string().not_null())
                            .to_owned(),
                    )
                    .await
            }

            async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .drop_table(Table::drop().table(Categories::Table).to_owned())
                    .await
            }
        }

        #[derive(DeriveIden)]
        pub(super) enum Categories {
            Table,
            Id,
            Name,
            CreatedAtUtc,
            CreatedBy,
            UpdatedAtUtc,
            UpdatedBy,
        }
    }

    mod m20250101_000002_create_products {
        use super::m20250101_000001_create_categories::Categories;
        use super::*;

        pub struct Migration;

        impl MigrationName for Migration {
            fn name(&self) -> &str {
                "m20250101_000002_create_products"
            }
        }

        #[async_trait::async_trait]
        impl MigrationTrait for Migration {
            async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .create_table(
                        Table::create()
                            .table(Products::Table)
                            .if_not_exists()
                            .col(
                                ColumnDef::new(Products::Id)
                                    .integer()
                                    .not_null()
                                    .primary_key(),
                            )
                            .col(ColumnDef::new(Products::Name).string().not_null())
                            .col(ColumnDef::new(Products::Price).integer().not_null())
                            .col(ColumnDef::new(Products::CategoryId).integer().not_null())
                            .col(
                                ColumnDef::new(Products::CreatedAtUtc)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .col(ColumnDef::new(Products::CreatedBy).string().not_null())
                            .col(
                                ColumnDef::new(Products::UpdatedAtUtc)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .col(ColumnDef::new(Products::UpdatedBy).string().not_null())
                            .foreign_key(
                                ForeignKey::create()
                                    .name("fk_products_category")
                                    .from(Products::Table, Products::CategoryId)
                                    .to(Categories::Table, Categories::Id)
                                    .on_delete(ForeignKeyAction::Restrict),
                            )
                            .to_owned(),
                    )
                    .await?;

                manager
                    .create_index(
                        Index::create()
                            .name("idx_products_category")
                            .table(Products::Table)
                            .col(Products::CategoryId)
                            .to_owned(),
                    )
                    .await
            }

            async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .drop_table(Table::drop().table(Products::Table).to_owned())
                    .await
            }
        }

        #[derive(DeriveIden)]
        enum Products {
            Table,
            Id,
            Name,
            Price,
            CategoryId,
            CreatedAtUtc,
            CreatedBy,
            UpdatedAtUtc,
            UpdatedBy,
        }
    }

    mod m20250101_000003_create_widgets {
        use super::*;

        pub struct Migration;

        impl MigrationName for Migration {
            fn name(&self) -> &str {
                "m20250101_000003_create_widgets"
            }
        }

        #[async_trait::async_trait]
        impl MigrationTrait for Migration {
            async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .create_table(
                        Table::create()
                            .table(Widgets::Table)
                            .if_not_exists()
                            .col(
                                ColumnDef::new(Widgets::Id)
                                    .integer()
                                    .not_null()
                                    .auto_increment()
                                    .primary_key(),
                            )
                            .col(ColumnDef::new(Widgets::Name).string().not_null())
                            .col(
                                ColumnDef::new(Widgets::CreatedAtUtc)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .col(ColumnDef::new(Widgets::CreatedBy).string().not_null())
                            .col(
                                ColumnDef::new(Widgets::UpdatedAtUtc)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .col(ColumnDef::new(Widgets::UpdatedBy).string().not_null())
                            .to_owned(),
                    )
                    .await
            }

            async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
                manager
                    .drop_table(Table::drop().table(Widgets::Table).to_owned())
                    .await
            }
        }

        #[derive(DeriveIden)]
        enum Widgets {
            Table,
            Id,
            Name,
            CreatedAtUtc,
            CreatedBy,
            UpdatedAtUtc,
            UpdatedBy,
        }
    }
}

/// Fresh in-memory database with the schema applied.
///
/// A single pooled connection keeps every query on the same in-memory store.
pub async fn setup() -> anyhow::Result<Arc<DatabaseConnection>> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await?;
    migrations::Migrator::up(&db, None).await?;
    Ok(Arc::new(db))
}

/// Placeholder stamp; the audit context overwrites it on save
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub fn new_category(id: i32, name: &str) -> category::Model {
    category::Model {
        id,
        name: name.to_string(),
        created_at_utc: epoch(),
        created_by: String::new(),
        updated_at_utc: epoch(),
        updated_by: String::new(),
    }
}

pub fn new_product(id: i32, name: &str, price: i32, category_id: i32) -> product::Model {
    product::Model {
        id,
        name: name.to_string(),
        price,
        category_id,
        created_at_utc: epoch(),
        created_by: String::new(),
        updated_at_utc: epoch(),
        updated_by: String::new(),
    }
}

/// Widget without a key; the database assigns one on insert
pub fn new_widget(name: &str) -> widget::Model {
    widget::Model {
        id: 0,
        name: name.to_string(),
        created_at_utc: epoch(),
        created_by: String::new(),
        updated_at_utc: epoch(),
        updated_by: String::new(),
    }
}

/// Let the clock advance so successive stamps differ
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
