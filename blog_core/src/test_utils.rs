//! Fixtures shared by the database-backed tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm_migration::MigratorTrait;

use crate::{
    access::{AuthenticatedUser, Role, Viewer},
    entity::prelude::*,
    ids::{CategoryId, PostId, RoleId, TagId, UserId},
    mailer::{MailError, Mailer, OutgoingMail},
    models::migrator::Migrator,
    slug::{search_text, slugify},
};

/// Fresh in-memory database with every migration applied.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

pub async fn create_role(db: &DatabaseConnection, name: &str) -> RoleModel {
    let name = Role::parse(name).to_string();
    if let Some(existing) = RoleEntity::find()
        .filter(RoleColumn::Name.eq(name.clone()))
        .one(db)
        .await
        .unwrap()
    {
        return existing;
    }

    RoleEntity::insert(RoleActiveModel {
        id: Set(RoleId::new()),
        name: Set(name),
        description: Set(None),
    })
    .exec_with_returning(db)
    .await
    .unwrap()
}

/// Active user `<username>@example.com` holding `roles`.
pub async fn create_user(db: &DatabaseConnection, username: &str, roles: &[&str]) -> UserModel {
    let user = User::insert(UserActiveModel {
        id: Set(UserId::new()),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        password_hash: Set("not-a-real-hash".to_string()),
        is_active: Set(true),
        activation_token: Set(None),
        activation_expires_at: Set(None),
        reset_token: Set(None),
        reset_expires_at: Set(None),
        created_at: Set(Utc::now()),
    })
    .exec_with_returning(db)
    .await
    .unwrap();

    for name in roles {
        let role = create_role(db, name).await;
        UserRole::insert(UserRoleActiveModel {
            user_id: Set(user.id),
            role_id: Set(role.id),
        })
        .exec(db)
        .await
        .unwrap();
    }

    user
}

/// Session for `user_id` expiring `ttl` from now (negative = already expired).
pub async fn create_session(db: &DatabaseConnection, user_id: UserId, ttl: Duration) -> String {
    let token = format!("test-session-{}", UserId::new());
    let now = Utc::now();
    Session::insert(SessionActiveModel {
        token: Set(token.clone()),
        user_id: Set(user_id),
        created_at: Set(now),
        expires_at: Set(now + ttl),
    })
    .exec(db)
    .await
    .unwrap();
    token
}

/// Viewer for a user created with `create_user`, without going through a session.
pub fn viewer(user: &UserModel, roles: &[&str]) -> Viewer {
    Viewer::User(AuthenticatedUser {
        id: user.id,
        username: user.username.clone(),
        roles: roles.iter().map(|r| Role::parse(r)).collect(),
    })
}

pub async fn create_category(db: &DatabaseConnection, name: &str) -> CategoryModel {
    Category::insert(CategoryActiveModel {
        id: Set(CategoryId::new()),
        name: Set(name.to_string()),
        slug: Set(slugify(name)),
        description: Set(None),
        created_at: Set(Utc::now()),
    })
    .exec_with_returning(db)
    .await
    .unwrap()
}

pub async fn create_tag(db: &DatabaseConnection, name: &str) -> TagModel {
    Tag::insert(TagActiveModel {
        id: Set(TagId::new()),
        name: Set(name.to_string()),
        slug: Set(slugify(name)),
        description: Set(None),
        created_at: Set(Utc::now()),
    })
    .exec_with_returning(db)
    .await
    .unwrap()
}

/// Shape of a seeded post. Defaults to published, visible, created and
/// published one day ago.
#[derive(Clone)]
pub struct PostSeed {
    pub title: String,
    pub body: String,
    pub status: PostStatus,
    pub is_visible: bool,
    pub publish_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<TagId>,
}

impl PostSeed {
    pub fn published(title: &str) -> Self {
        let yesterday = Utc::now() - Duration::days(1);
        Self {
            title: title.to_string(),
            body: format!("Body of {title}"),
            status: PostStatus::Published,
            is_visible: true,
            publish_date: yesterday,
            created_at: yesterday,
            tags: Vec::new(),
        }
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }

    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.publish_date = at;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn tagged(mut self, tag: TagId) -> Self {
        self.tags.push(tag);
        self
    }
}

pub async fn create_post(
    db: &DatabaseConnection,
    author: UserId,
    category: CategoryId,
    seed: PostSeed,
) -> PostModel {
    let id = PostId::new();
    let suffix = id.to_string();
    let post = Post::insert(PostActiveModel {
        id: Set(id),
        title: Set(seed.title.clone()),
        slug: Set(format!("{}-{}", slugify(&seed.title), &suffix[24..])),
        summary: Set(format!("Summary of {}", seed.title)),
        search_text: Set(search_text(&seed.title, &seed.body)),
        body: Set(seed.body),
        category_id: Set(category),
        author_id: Set(author),
        status: Set(seed.status),
        is_visible: Set(seed.is_visible),
        publish_date: Set(seed.publish_date),
        created_at: Set(seed.created_at),
        updated_at: Set(seed.created_at),
    })
    .exec_with_returning(db)
    .await
    .unwrap();

    for tag in seed.tags {
        PostTag::insert(PostTagActiveModel {
            post_id: Set(post.id),
            tag_id: Set(tag),
        })
        .exec(db)
        .await
        .unwrap();
    }

    post
}

/// Mailer that keeps every message for inspection.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Mailer whose transport is always down.
#[derive(Clone, Default)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".to_string()))
    }
}
