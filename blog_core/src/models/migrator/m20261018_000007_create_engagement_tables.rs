use sea_orm_migration::{prelude::*, schema::*};

use super::m20261018_000002_create_users_table::User;
use super::m20261018_000006_create_posts_table::Post;

#[derive(DeriveMigrationName)]
pub struct Migration;

// One row per (post, user) membership. The composite primary key is what
// makes add-if-absent / remove-if-present atomic.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(membership_table(PostLike::Table, "post-like"))
            .await?;
        manager
            .create_table(membership_table(PostFavorite::Table, "post-favorite"))
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_favorites_user_id")
                    .table(PostFavorite::Table)
                    .col(Membership::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostFavorite::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PostLike::Table).to_owned())
            .await
    }
}

fn membership_table<T: IntoIden + Copy + 'static>(table: T, fk_prefix: &str) -> TableCreateStatement {
    Table::create()
        .table(table)
        .col(uuid(Membership::PostId))
        .col(uuid(Membership::UserId))
        .col(timestamp_with_time_zone(Membership::CreatedAt))
        .primary_key(
            Index::create()
                .col(Membership::PostId)
                .col(Membership::UserId),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk-{fk_prefix}-post_id"))
                .from(table, Membership::PostId)
                .to(Post::Table, Post::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .on_update(ForeignKeyAction::Cascade),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk-{fk_prefix}-user_id"))
                .from(table, Membership::UserId)
                .to(User::Table, User::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .on_update(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

#[derive(DeriveIden, Clone, Copy)]
pub enum PostLike {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum PostFavorite {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum Membership {
    PostId,
    UserId,
    CreatedAt,
}
