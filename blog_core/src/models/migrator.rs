use sea_orm_migration::prelude::*;

mod m20261018_000001_create_roles_table;
mod m20261018_000002_create_users_table;
mod m20261018_000003_create_user_roles_table;
mod m20261018_000004_create_sessions_table;
mod m20261018_000005_create_taxonomy_tables;
mod m20261018_000006_create_posts_table;
mod m20261018_000007_create_engagement_tables;
mod m20261018_000008_create_comments_table;
mod m20261018_000009_create_newsletter_tables;
mod m20261018_000010_create_audit_log_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261018_000001_create_roles_table::Migration),
            Box::new(m20261018_000002_create_users_table::Migration),
            Box::new(m20261018_000003_create_user_roles_table::Migration),
            Box::new(m20261018_000004_create_sessions_table::Migration),
            Box::new(m20261018_000005_create_taxonomy_tables::Migration),
            Box::new(m20261018_000006_create_posts_table::Migration),
            Box::new(m20261018_000007_create_engagement_tables::Migration),
            Box::new(m20261018_000008_create_comments_table::Migration),
            Box::new(m20261018_000009_create_newsletter_tables::Migration),
            Box::new(m20261018_000010_create_audit_log_table::Migration),
        ]
    }
}

#[cfg(test)]
use sea_orm::{Database, DbErr};

#[tokio::test]
async fn test_migrations_okay() -> Result<(), DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let schema_manager = SchemaManager::new(&db);

    Migrator::refresh(&db).await?;

    for table in [
        "role",
        "user",
        "user_role",
        "session",
        "category",
        "tag",
        "post",
        "post_tag",
        "post_like",
        "post_favorite",
        "comment",
        "subscriber",
        "subscriber_scope",
        "audit_log",
    ] {
        assert!(schema_manager.has_table(table).await?, "missing table {table}");
    }

    Ok(())
}

#[tokio::test]
async fn test_migrations_roll_back() -> Result<(), DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let schema_manager = SchemaManager::new(&db);

    Migrator::up(&db, None).await?;
    Migrator::down(&db, None).await?;

    assert!(!schema_manager.has_table("post").await?);
    assert!(!schema_manager.has_table("user").await?);

    Ok(())
}
