use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscriber::Table)
                    .col(pk_uuid(Subscriber::Id))
                    .col(string_uniq(Subscriber::Email))
                    .col(timestamp_with_time_zone(Subscriber::CreatedAt))
                    .col(timestamp_with_time_zone(Subscriber::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SubscriberScope::Table)
                    .col(uuid(SubscriberScope::SubscriberId))
                    .col(uuid(SubscriberScope::TargetId))
                    .col(string_len(SubscriberScope::Kind, 16))
                    .primary_key(
                        Index::create()
                            .col(SubscriberScope::SubscriberId)
                            .col(SubscriberScope::TargetId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-subscriber-scope-subscriber_id")
                            .from(SubscriberScope::Table, SubscriberScope::SubscriberId)
                            .to(Subscriber::Table, Subscriber::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscriber_scopes_target_id")
                    .table(SubscriberScope::Table)
                    .col(SubscriberScope::TargetId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SubscriberScope::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriber::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Subscriber {
    Table,
    Id,
    Email,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum SubscriberScope {
    Table,
    SubscriberId,
    TargetId,
    Kind,
}
