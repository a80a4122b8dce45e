use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{OnConflict, Query},
    DatabaseConnection,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zel_core::prelude::*;

use crate::{
    access::{authorize, AccessGate, Viewer, ADMIN_ROLES},
    config::ListingConfig,
    entity::prelude::*,
    error::{BlogError, BlogResult},
    ids::{CategoryId, PostId, SubscriberId, TagId, UserId},
    listing::{paginate, CategoryRef, Page, PageRequest, TagRef},
};

/// One author, category or tag a subscriber follows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeTarget {
    pub kind: ScopeKind,
    pub target_id: Uuid,
}

impl ScopeTarget {
    pub fn author(id: UserId) -> Self {
        Self {
            kind: ScopeKind::Author,
            target_id: id.into_uuid(),
        }
    }

    pub fn category(id: CategoryId) -> Self {
        Self {
            kind: ScopeKind::Category,
            target_id: id.into_uuid(),
        }
    }

    pub fn tag(id: TagId) -> Self {
        Self {
            kind: ScopeKind::Tag,
            target_id: id.into_uuid(),
        }
    }
}

/// A subscriber with their scopes. No scopes means every post.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriberView {
    pub id: SubscriberId,
    pub email: String,
    pub scopes: Vec<ScopeTarget>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public choices for the sign-up form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    pub categories: Vec<CategoryRef>,
    pub tags: Vec<TagRef>,
    pub authors: Vec<AuthorRef>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorRef {
    pub id: UserId,
    pub username: String,
}

fn scope_conflict() -> OnConflict {
    OnConflict::columns([
        SubscriberScopeColumn::SubscriberId,
        SubscriberScopeColumn::TargetId,
    ])
    .do_nothing()
    .to_owned()
}

fn normalize_email(raw: &str) -> BlogResult<String> {
    let email = raw.trim().to_lowercase();
    if email.contains('@') {
        Ok(email)
    } else {
        Err(BlogError::validation("a valid email is required"))
    }
}

#[derive(Clone)]
pub struct NewsletterService {
    db: DatabaseConnection,
    gate: AccessGate,
    admin_per_page: u64,
}

impl NewsletterService {
    pub fn new(db: DatabaseConnection, config: ListingConfig) -> Self {
        Self {
            gate: AccessGate::new(db.clone()),
            db,
            admin_per_page: config.admin_per_page,
        }
    }

    async fn ensure_target(&self, target: ScopeTarget) -> BlogResult<()> {
        let exists = match target.kind {
            ScopeKind::Author => User::find_by_id(UserId::from_uuid(target.target_id))
                .count(&self.db)
                .await?,
            ScopeKind::Category => Category::find_by_id(CategoryId::from_uuid(target.target_id))
                .count(&self.db)
                .await?,
            ScopeKind::Tag => Tag::find_by_id(TagId::from_uuid(target.target_id))
                .count(&self.db)
                .await?,
        };
        if exists == 0 {
            return Err(BlogError::NotFound(match target.kind {
                ScopeKind::Author => "author",
                ScopeKind::Category => "category",
                ScopeKind::Tag => "tag",
            }));
        }
        Ok(())
    }

    async fn find_subscriber(&self, subscriber_id: SubscriberId) -> BlogResult<SubscriberModel> {
        Subscriber::find_by_id(subscriber_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("subscriber"))
    }

    async fn views(&self, subscribers: Vec<SubscriberModel>) -> BlogResult<Vec<SubscriberView>> {
        let mut scopes: HashMap<SubscriberId, Vec<ScopeTarget>> = HashMap::new();
        if !subscribers.is_empty() {
            let rows = SubscriberScope::find()
                .filter(SubscriberScopeColumn::SubscriberId.is_in(subscribers.iter().map(|s| s.id)))
                .order_by_asc(SubscriberScopeColumn::TargetId)
                .all(&self.db)
                .await?;
            for row in rows {
                scopes.entry(row.subscriber_id).or_default().push(ScopeTarget {
                    kind: row.kind,
                    target_id: row.target_id,
                });
            }
        }

        Ok(subscribers
            .into_iter()
            .map(|s| SubscriberView {
                scopes: scopes.remove(&s.id).unwrap_or_default(),
                id: s.id,
                email: s.email,
                created_at: s.created_at,
                updated_at: s.updated_at,
            })
            .collect())
    }

    async fn view(&self, subscriber: SubscriberModel) -> BlogResult<SubscriberView> {
        let mut views = self.views(vec![subscriber]).await?;
        views.pop().ok_or(BlogError::NotFound("subscriber"))
    }

    /// Public sign-up. Subscribing an address again adds the new scopes to
    /// the ones it already has.
    pub async fn _subscribe(&self, email: &str, scopes: Vec<ScopeTarget>) -> BlogResult<SubscriberView> {
        let email = normalize_email(email)?;
        // One row per target.
        let scopes: BTreeMap<Uuid, ScopeKind> = scopes
            .into_iter()
            .map(|s| (s.target_id, s.kind))
            .collect();
        for (target_id, kind) in &scopes {
            self.ensure_target(ScopeTarget {
                kind: *kind,
                target_id: *target_id,
            })
            .await?;
        }
        let existing = Subscriber::find()
            .filter(SubscriberColumn::Email.eq(email.as_str()))
            .one(&self.db)
            .await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let subscriber = match existing {
            Some(subscriber) => {
                let mut active: SubscriberActiveModel = subscriber.into();
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => Subscriber::insert(SubscriberActiveModel {
                id: Set(SubscriberId::new()),
                email: Set(email),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .exec_with_returning(&txn)
            .await
            .map_err(|e| BlogError::from_unique(e, "subscription"))?,
        };
        if !scopes.is_empty() {
            SubscriberScope::insert_many(scopes.iter().map(|(target_id, kind)| {
                SubscriberScopeActiveModel {
                    subscriber_id: Set(subscriber.id),
                    target_id: Set(*target_id),
                    kind: Set(*kind),
                }
            }))
            .on_conflict(scope_conflict())
            .do_nothing()
            .exec(&txn)
            .await?;
        }
        txn.commit().await?;

        tracing::info!(subscriber_id = %subscriber.id, scopes = scopes.len(), "newsletter subscription");
        self.view(subscriber).await
    }

    /// What the sign-up form offers: every category and tag, and every
    /// user who has written a post.
    pub async fn _subscription_options(&self) -> BlogResult<SubscriptionOptions> {
        let categories = Category::find()
            .order_by_asc(CategoryColumn::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| CategoryRef {
                id: c.id,
                name: c.name,
                slug: c.slug,
            })
            .collect();
        let tags = Tag::find()
            .order_by_asc(TagColumn::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|t| TagRef {
                id: t.id,
                name: t.name,
                slug: t.slug,
            })
            .collect();
        let authors = User::find()
            .filter(
                UserColumn::Id.in_subquery(
                    Query::select()
                        .column(PostColumn::AuthorId)
                        .from(Post)
                        .to_owned(),
                ),
            )
            .order_by_asc(UserColumn::Username)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| AuthorRef {
                id: u.id,
                username: u.username,
            })
            .collect();

        Ok(SubscriptionOptions {
            categories,
            tags,
            authors,
        })
    }

    /// Unknown addresses are ignored.
    pub async fn _unsubscribe(&self, email: &str) -> BlogResult<()> {
        let email = normalize_email(email)?;
        let deleted = Subscriber::delete_many()
            .filter(SubscriberColumn::Email.eq(email))
            .exec(&self.db)
            .await?;
        if deleted.rows_affected > 0 {
            tracing::info!("newsletter unsubscription");
        }
        Ok(())
    }

    pub async fn _list_subscribers(&self, viewer: &Viewer, page: PageRequest) -> BlogResult<Page<SubscriberView>> {
        authorize(viewer, ADMIN_ROLES)?;
        let window = page.resolve(self.admin_per_page)?;
        let mut page = paginate(
            &self.db,
            Subscriber::find()
                .order_by_desc(SubscriberColumn::CreatedAt)
                .order_by_desc(SubscriberColumn::Id),
            window,
        )
        .await?;

        let views = self.views(std::mem::take(&mut page.items)).await?;
        Ok(page.with_items(views))
    }

    pub async fn _update_subscriber(
        &self,
        viewer: &Viewer,
        subscriber_id: SubscriberId,
        email: &str,
    ) -> BlogResult<SubscriberView> {
        authorize(viewer, ADMIN_ROLES)?;
        let email = normalize_email(email)?;
        let subscriber = self.find_subscriber(subscriber_id).await?;

        let mut active: SubscriberActiveModel = subscriber.into();
        active.email = Set(email);
        active.updated_at = Set(Utc::now());
        let subscriber = active
            .update(&self.db)
            .await
            .map_err(|e| BlogError::from_unique(e, "subscription"))?;
        self.view(subscriber).await
    }

    pub async fn _delete_subscriber(&self, viewer: &Viewer, subscriber_id: SubscriberId) -> BlogResult<()> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        let deleted = Subscriber::delete_by_id(subscriber_id).exec(&self.db).await?;
        if deleted.rows_affected == 0 {
            return Err(BlogError::NotFound("subscriber"));
        }
        tracing::info!(%subscriber_id, admin = %admin.username, "subscriber deleted");
        Ok(())
    }

    /// Adding a scope the subscriber already has is a no-op.
    pub async fn _add_scope(
        &self,
        viewer: &Viewer,
        subscriber_id: SubscriberId,
        target: ScopeTarget,
    ) -> BlogResult<SubscriberView> {
        authorize(viewer, ADMIN_ROLES)?;
        let subscriber = self.find_subscriber(subscriber_id).await?;
        self.ensure_target(target).await?;

        SubscriberScope::insert(SubscriberScopeActiveModel {
            subscriber_id: Set(subscriber_id),
            target_id: Set(target.target_id),
            kind: Set(target.kind),
        })
        .on_conflict(scope_conflict())
        .do_nothing()
        .exec(&self.db)
        .await?;

        self.view(subscriber).await
    }

    pub async fn _remove_scope(
        &self,
        viewer: &Viewer,
        subscriber_id: SubscriberId,
        target_id: Uuid,
    ) -> BlogResult<SubscriberView> {
        authorize(viewer, ADMIN_ROLES)?;
        let subscriber = self.find_subscriber(subscriber_id).await?;
        SubscriberScope::delete_by_id((subscriber_id, target_id))
            .exec(&self.db)
            .await?;
        self.view(subscriber).await
    }

    /// Addresses a new post should be announced to: every unscoped
    /// subscriber plus those following its author, category or a tag.
    pub async fn recipients_for_post(&self, post_id: PostId) -> BlogResult<Vec<String>> {
        let post = Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("post"))?;
        let tag_ids: Vec<TagId> = PostTag::find()
            .filter(PostTagColumn::PostId.eq(post_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|link| link.tag_id)
            .collect();

        let mut matches = Condition::any()
            .add(
                Condition::all()
                    .add(SubscriberScopeColumn::Kind.eq(ScopeKind::Author))
                    .add(SubscriberScopeColumn::TargetId.eq(post.author_id.into_uuid())),
            )
            .add(
                Condition::all()
                    .add(SubscriberScopeColumn::Kind.eq(ScopeKind::Category))
                    .add(SubscriberScopeColumn::TargetId.eq(post.category_id.into_uuid())),
            );
        if !tag_ids.is_empty() {
            matches = matches.add(
                Condition::all()
                    .add(SubscriberScopeColumn::Kind.eq(ScopeKind::Tag))
                    .add(SubscriberScopeColumn::TargetId.is_in(tag_ids.into_iter().map(TagId::into_uuid))),
            );
        }
        let scoped: BTreeSet<SubscriberId> = SubscriberScope::find()
            .filter(matches)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|scope| scope.subscriber_id)
            .collect();

        let recipients = Subscriber::find()
            .filter(
                Condition::any()
                    .add(
                        SubscriberColumn::Id.not_in_subquery(
                            Query::select()
                                .column(SubscriberScopeColumn::SubscriberId)
                                .from(SubscriberScope)
                                .to_owned(),
                        ),
                    )
                    .add(SubscriberColumn::Id.is_in(scoped)),
            )
            .order_by_asc(SubscriberColumn::Email)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|s| s.email)
            .collect();
        Ok(recipients)
    }

    async fn viewer(&self, session: Option<String>) -> BlogResult<Viewer> {
        self.gate.authenticate(session.as_deref()).await
    }
}

#[zel_service(name = "newsletter")]
trait Newsletter {
    #[doc = "Subscribe an address, optionally to specific authors, categories or tags"]
    #[method(name = "subscribe")]
    async fn subscribe(&self, email: String, scopes: Vec<ScopeTarget>) -> Result<SubscriberView, ResourceError>;

    #[doc = "Categories, tags and authors an address can subscribe to"]
    #[method(name = "subscription_options")]
    async fn subscription_options(&self) -> Result<SubscriptionOptions, ResourceError>;

    #[doc = "Remove an address from the newsletter"]
    #[method(name = "unsubscribe")]
    async fn unsubscribe(&self, email: String) -> Result<(), ResourceError>;

    #[doc = "List subscribers, newest first (admin)"]
    #[method(name = "list_subscribers")]
    async fn list_subscribers(
        &self,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<SubscriberView>, ResourceError>;

    #[doc = "Change a subscriber's address (admin)"]
    #[method(name = "update_subscriber")]
    async fn update_subscriber(
        &self,
        session: Option<String>,
        subscriber_id: SubscriberId,
        email: String,
    ) -> Result<SubscriberView, ResourceError>;

    #[doc = "Delete a subscriber (admin)"]
    #[method(name = "delete_subscriber")]
    async fn delete_subscriber(
        &self,
        session: Option<String>,
        subscriber_id: SubscriberId,
    ) -> Result<(), ResourceError>;

    #[doc = "Add a scope to a subscriber (admin)"]
    #[method(name = "add_scope")]
    async fn add_scope(
        &self,
        session: Option<String>,
        subscriber_id: SubscriberId,
        target: ScopeTarget,
    ) -> Result<SubscriberView, ResourceError>;

    #[doc = "Remove a scope from a subscriber (admin)"]
    #[method(name = "remove_scope")]
    async fn remove_scope(
        &self,
        session: Option<String>,
        subscriber_id: SubscriberId,
        target_id: Uuid,
    ) -> Result<SubscriberView, ResourceError>;

    #[doc = "Addresses a post should be announced to (admin)"]
    #[method(name = "recipients_for_post")]
    async fn recipients_for_post(
        &self,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<Vec<String>, ResourceError>;
}

#[async_trait]
impl NewsletterServer for NewsletterService {
    async fn subscribe(
        &self,
        _ctx: RequestContext,
        email: String,
        scopes: Vec<ScopeTarget>,
    ) -> Result<SubscriberView, ResourceError> {
        Ok(self._subscribe(&email, scopes).await?)
    }

    async fn subscription_options(&self, _ctx: RequestContext) -> Result<SubscriptionOptions, ResourceError> {
        Ok(self._subscription_options().await?)
    }

    async fn unsubscribe(&self, _ctx: RequestContext, email: String) -> Result<(), ResourceError> {
        Ok(self._unsubscribe(&email).await?)
    }

    async fn list_subscribers(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<SubscriberView>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_subscribers(&viewer, page).await?)
    }

    async fn update_subscriber(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        subscriber_id: SubscriberId,
        email: String,
    ) -> Result<SubscriberView, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._update_subscriber(&viewer, subscriber_id, &email).await?)
    }

    async fn delete_subscriber(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        subscriber_id: SubscriberId,
    ) -> Result<(), ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._delete_subscriber(&viewer, subscriber_id).await?)
    }

    async fn add_scope(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        subscriber_id: SubscriberId,
        target: ScopeTarget,
    ) -> Result<SubscriberView, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._add_scope(&viewer, subscriber_id, target).await?)
    }

    async fn remove_scope(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        subscriber_id: SubscriberId,
        target_id: Uuid,
    ) -> Result<SubscriberView, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._remove_scope(&viewer, subscriber_id, target_id).await?)
    }

    async fn recipients_for_post(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<Vec<String>, ResourceError> {
        let viewer = self.viewer(session).await?;
        authorize(&viewer, ADMIN_ROLES)?;
        Ok(self.recipients_for_post(post_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, PostSeed};

    async fn setup_test_service() -> (NewsletterService, DatabaseConnection, Viewer) {
        let db = test_utils::setup_test_db().await;
        let root = test_utils::create_user(&db, "root", &["admin"]).await;
        let service = NewsletterService::new(db.clone(), ListingConfig::default());
        (service, db, test_utils::viewer(&root, &["admin"]))
    }

    #[tokio::test]
    async fn test_subscribe_normalizes_and_keeps_one_row_per_address() {
        let (service, db, _admin) = setup_test_service().await;

        let view = service._subscribe("  Reader@Example.COM ", vec![]).await.unwrap();
        assert_eq!(view.email, "reader@example.com");
        assert!(view.scopes.is_empty());

        let again = service._subscribe("reader@example.com", vec![]).await.unwrap();
        assert_eq!(again.id, view.id);
        assert_eq!(Subscriber::find().count(&db).await.unwrap(), 1);
        assert!(matches!(
            service._subscribe("no-at-sign", vec![]).await,
            Err(BlogError::Validation(_))
        ));

        service._unsubscribe("READER@example.com").await.unwrap();
        service._unsubscribe("ghost@example.com").await.unwrap();
        service._subscribe("reader@example.com", vec![]).await.unwrap();
    }

    #[tokio::test]
    async fn test_scopes_must_reference_existing_rows() {
        let (service, db, admin) = setup_test_service().await;
        let tag = test_utils::create_tag(&db, "Rust").await;

        let view = service
            ._subscribe(
                "reader@example.com",
                vec![ScopeTarget::tag(tag.id), ScopeTarget::tag(tag.id)],
            )
            .await
            .unwrap();
        assert_eq!(view.scopes, vec![ScopeTarget::tag(tag.id)]);

        assert!(matches!(
            service
                ._subscribe("other@example.com", vec![ScopeTarget::category(CategoryId::new())])
                .await,
            Err(BlogError::NotFound("category"))
        ));

        let category = test_utils::create_category(&db, "Backend").await;
        let view = service
            ._add_scope(&admin, view.id, ScopeTarget::category(category.id))
            .await
            .unwrap();
        assert_eq!(view.scopes.len(), 2);
        let again = service
            ._add_scope(&admin, view.id, ScopeTarget::category(category.id))
            .await
            .unwrap();
        assert_eq!(again.scopes.len(), 2);

        let view = service
            ._remove_scope(&admin, view.id, tag.id.into_uuid())
            .await
            .unwrap();
        assert_eq!(view.scopes, vec![ScopeTarget::category(category.id)]);
    }

    #[tokio::test]
    async fn test_subscribing_again_merges_scopes() {
        let (service, db, _admin) = setup_test_service().await;
        let author = test_utils::create_user(&db, "eva", &["editor"]).await;
        let rust = test_utils::create_tag(&db, "Rust").await;
        let backend = test_utils::create_category(&db, "Backend").await;

        let first = service
            ._subscribe("reader@example.com", vec![ScopeTarget::tag(rust.id)])
            .await
            .unwrap();
        let merged = service
            ._subscribe(
                "READER@example.com",
                vec![
                    ScopeTarget::tag(rust.id),
                    ScopeTarget::category(backend.id),
                    ScopeTarget::author(author.id),
                ],
            )
            .await
            .unwrap();

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.created_at, first.created_at);
        assert_eq!(merged.scopes.len(), 3);
        assert!(merged.scopes.contains(&ScopeTarget::tag(rust.id)));
        assert!(merged.scopes.contains(&ScopeTarget::category(backend.id)));
        assert!(merged.scopes.contains(&ScopeTarget::author(author.id)));
        assert_eq!(SubscriberScope::find().count(&db).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_subscription_options_list_targets_and_authors() {
        let (service, db, _admin) = setup_test_service().await;
        let writer = test_utils::create_user(&db, "eva", &["editor"]).await;
        test_utils::create_user(&db, "lurker", &["user"]).await;
        let backend = test_utils::create_category(&db, "Backend").await;
        test_utils::create_category(&db, "Adopt").await;
        test_utils::create_tag(&db, "Rust").await;
        test_utils::create_post(&db, writer.id, backend.id, PostSeed::published("Hello")).await;

        let options = service._subscription_options().await.unwrap();
        let categories: Vec<_> = options.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(categories, vec!["Adopt", "Backend"]);
        assert_eq!(options.tags.len(), 1);
        assert_eq!(options.tags[0].slug, "rust");
        assert_eq!(
            options.authors,
            vec![AuthorRef {
                id: writer.id,
                username: "eva".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_admin_manages_subscribers() {
        let (service, db, admin) = setup_test_service().await;
        let first = service._subscribe("a@example.com", vec![]).await.unwrap();
        let second = service._subscribe("b@example.com", vec![]).await.unwrap();

        let page = service._list_subscribers(&admin, PageRequest::first()).await.unwrap();
        assert_eq!(page.total_items, 2);
        assert_eq!(page.items[0].id, second.id);

        let updated = service
            ._update_subscriber(&admin, first.id, " C@Example.com")
            .await
            .unwrap();
        assert_eq!(updated.email, "c@example.com");
        assert!(matches!(
            service._update_subscriber(&admin, first.id, "b@example.com").await,
            Err(BlogError::Conflict(_))
        ));

        service._delete_subscriber(&admin, second.id).await.unwrap();
        assert!(matches!(
            service._delete_subscriber(&admin, second.id).await,
            Err(BlogError::NotFound("subscriber"))
        ));

        let reader = test_utils::create_user(&db, "ana", &["user"]).await;
        assert!(matches!(
            service
                ._list_subscribers(&test_utils::viewer(&reader, &["user"]), PageRequest::first())
                .await,
            Err(BlogError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_recipients_follow_scopes() {
        let (service, db, _admin) = setup_test_service().await;
        let author = test_utils::create_user(&db, "eva", &["editor"]).await;
        let other_author = test_utils::create_user(&db, "max", &["editor"]).await;
        let backend = test_utils::create_category(&db, "Backend").await;
        let frontend = test_utils::create_category(&db, "Frontend").await;
        let rust = test_utils::create_tag(&db, "Rust").await;
        let css = test_utils::create_tag(&db, "CSS").await;
        let post = test_utils::create_post(
            &db,
            author.id,
            backend.id,
            PostSeed::published("Async Rust").tagged(rust.id),
        )
        .await;

        service._subscribe("everything@example.com", vec![]).await.unwrap();
        service
            ._subscribe("author@example.com", vec![ScopeTarget::author(author.id)])
            .await
            .unwrap();
        service
            ._subscribe("tag@example.com", vec![ScopeTarget::tag(rust.id), ScopeTarget::tag(css.id)])
            .await
            .unwrap();
        service
            ._subscribe("category@example.com", vec![ScopeTarget::category(backend.id)])
            .await
            .unwrap();
        service
            ._subscribe(
                "elsewhere@example.com",
                vec![
                    ScopeTarget::author(other_author.id),
                    ScopeTarget::category(frontend.id),
                    ScopeTarget::tag(css.id),
                ],
            )
            .await
            .unwrap();

        let recipients = service.recipients_for_post(post.id).await.unwrap();
        assert_eq!(
            recipients,
            vec![
                "author@example.com",
                "category@example.com",
                "everything@example.com",
                "tag@example.com",
            ]
        );

        assert!(matches!(
            service.recipients_for_post(PostId::new()).await,
            Err(BlogError::NotFound("post"))
        ));
    }
}
