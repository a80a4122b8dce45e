use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    // Categories and tags share a shape: unique name, unique derived slug.
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Category::Table)
                    .col(pk_uuid(Category::Id))
                    .col(string_uniq(Category::Name))
                    .col(string_uniq(Category::Slug))
                    .col(string_null(Category::Description))
                    .col(timestamp_with_time_zone(Category::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tag::Table)
                    .col(pk_uuid(Tag::Id))
                    .col(string_uniq(Tag::Name))
                    .col(string_uniq(Tag::Slug))
                    .col(string_null(Tag::Description))
                    .col(timestamp_with_time_zone(Tag::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tag::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Category::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Category {
    Table,
    Id,
    Name,
    Slug,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Tag {
    Table,
    Id,
    Name,
    Slug,
    Description,
    CreatedAt,
}
