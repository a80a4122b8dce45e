use std::sync::Arc;

use chrono::Utc;
use sea_orm::{sea_query::OnConflict, DatabaseConnection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use zel_core::prelude::*;

use crate::{
    access::{AccessGate, Viewer},
    audit::{self, AuditEntry, AuditSink},
    config::ListingConfig,
    entity::prelude::*,
    error::BlogResult,
    ids::{PostId, UserId},
    listing::{self, ListingEngine, Page, PageRequest, PostCard, PostFilter},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementKind {
    Like,
    Favorite,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToggleAction {
    Like,
    Unlike,
    Favorite,
    Unfavorite,
}

impl ToggleAction {
    fn new(kind: EngagementKind, active: bool) -> Self {
        match (kind, active) {
            (EngagementKind::Like, true) => ToggleAction::Like,
            (EngagementKind::Like, false) => ToggleAction::Unlike,
            (EngagementKind::Favorite, true) => ToggleAction::Favorite,
            (EngagementKind::Favorite, false) => ToggleAction::Unfavorite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleAction::Like => "LIKE",
            ToggleAction::Unlike => "UNLIKE",
            ToggleAction::Favorite => "FAVORITE",
            ToggleAction::Unfavorite => "UNFAVORITE",
        }
    }
}

/// Result of one toggle. `before`/`after` are the membership counts around
/// the flip, read inside the same transaction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub post_id: PostId,
    pub actor: UserId,
    pub action: ToggleAction,
    /// Whether the actor is a member after the toggle.
    pub active: bool,
    pub before: u64,
    pub after: u64,
}

impl ToggleOutcome {
    fn audit_entry(&self, kind: EngagementKind) -> AuditEntry {
        let counter = match kind {
            EngagementKind::Like => "likesCount",
            EngagementKind::Favorite => "favoritesCount",
        };
        AuditEntry::new("Post", self.action.as_str(), self.post_id)
            .by(self.actor)
            .before(json!({ counter: self.before }))
            .after(json!({ counter: self.after }))
    }
}

/// Deletes the (post, user) row if present, inserts it otherwise. Returns
/// whether the row exists afterwards.
async fn flip_membership<E, C>(
    conn: &C,
    post_column: E::Column,
    user_column: E::Column,
    post_id: PostId,
    user_id: UserId,
    row: E::ActiveModel,
) -> Result<bool, DbErr>
where
    E: EntityTrait,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    let removed = E::delete_many()
        .filter(post_column.eq(post_id))
        .filter(user_column.eq(user_id))
        .exec(conn)
        .await?
        .rows_affected;
    if removed > 0 {
        return Ok(false);
    }

    E::insert(row)
        .on_conflict(
            OnConflict::columns([post_column, user_column])
                .do_nothing()
                .to_owned(),
        )
        .do_nothing()
        .exec(conn)
        .await?;
    Ok(true)
}

#[derive(Clone)]
pub struct EngagementService {
    db: DatabaseConnection,
    gate: AccessGate,
    listing: ListingEngine,
    audit: Arc<dyn AuditSink>,
}

impl EngagementService {
    pub fn new(db: DatabaseConnection, config: ListingConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            gate: AccessGate::new(db.clone()),
            listing: ListingEngine::new(db.clone(), config),
            db,
            audit,
        }
    }

    pub async fn _toggle_like(&self, viewer: &Viewer, post_id: PostId) -> BlogResult<ToggleOutcome> {
        self.toggle(viewer, post_id, EngagementKind::Like).await
    }

    pub async fn _toggle_favorite(&self, viewer: &Viewer, post_id: PostId) -> BlogResult<ToggleOutcome> {
        self.toggle(viewer, post_id, EngagementKind::Favorite).await
    }

    /// Flips exactly one membership. The audit entry is emitted after the
    /// commit; losing it does not fail the toggle.
    pub async fn toggle(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        kind: EngagementKind,
    ) -> BlogResult<ToggleOutcome> {
        let user = viewer.require_user()?;
        let post = listing::find_visible_post(&self.db, post_id, viewer).await?;
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let (before, active, after) = match kind {
            EngagementKind::Like => {
                let before = listing::count_likes(&txn, post.id).await?;
                let active = flip_membership::<PostLike, _>(
                    &txn,
                    PostLikeColumn::PostId,
                    PostLikeColumn::UserId,
                    post.id,
                    user.id,
                    PostLikeActiveModel {
                        post_id: Set(post.id),
                        user_id: Set(user.id),
                        created_at: Set(now),
                    },
                )
                .await?;
                (before, active, listing::count_likes(&txn, post.id).await?)
            }
            EngagementKind::Favorite => {
                let before = listing::count_favorites(&txn, post.id).await?;
                let active = flip_membership::<PostFavorite, _>(
                    &txn,
                    PostFavoriteColumn::PostId,
                    PostFavoriteColumn::UserId,
                    post.id,
                    user.id,
                    PostFavoriteActiveModel {
                        post_id: Set(post.id),
                        user_id: Set(user.id),
                        created_at: Set(now),
                    },
                )
                .await?;
                (before, active, listing::count_favorites(&txn, post.id).await?)
            }
        };
        txn.commit().await?;

        let outcome = ToggleOutcome {
            post_id: post.id,
            actor: user.id,
            action: ToggleAction::new(kind, active),
            active,
            before,
            after,
        };
        tracing::info!(
            %post_id,
            actor = %user.username,
            action = outcome.action.as_str(),
            count = after,
            "engagement toggled"
        );

        audit::emit(self.audit.as_ref(), outcome.audit_entry(kind)).await;
        Ok(outcome)
    }

    /// The viewer's favorited posts that are still visible to them.
    pub async fn _list_favorites(&self, viewer: &Viewer, page: PageRequest) -> BlogResult<Page<PostCard>> {
        let user = viewer.require_user()?;
        let filter = PostFilter {
            favorited_by: Some(user.id),
            ..Default::default()
        };
        self.listing.list(&filter, page, viewer).await
    }

    async fn viewer(&self, session: Option<String>) -> BlogResult<Viewer> {
        self.gate.authenticate(session.as_deref()).await
    }
}

#[zel_service(name = "engagement")]
trait Engagement {
    #[doc = "Like a post, or take the like back"]
    #[method(name = "toggle_like")]
    async fn toggle_like(
        &self,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<ToggleOutcome, ResourceError>;

    #[doc = "Favorite a post, or take the favorite back"]
    #[method(name = "toggle_favorite")]
    async fn toggle_favorite(
        &self,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<ToggleOutcome, ResourceError>;

    #[doc = "The caller's favorited posts"]
    #[method(name = "list_favorites")]
    async fn list_favorites(
        &self,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<PostCard>, ResourceError>;
}

#[async_trait]
impl EngagementServer for EngagementService {
    async fn toggle_like(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<ToggleOutcome, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._toggle_like(&viewer, post_id).await?)
    }

    async fn toggle_favorite(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<ToggleOutcome, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._toggle_favorite(&viewer, post_id).await?)
    }

    async fn list_favorites(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<PostCard>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_favorites(&viewer, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::BlogError,
        test_utils::{self, PostSeed},
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn record(&self, entry: AuditEntry) -> BlogResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn record(&self, _entry: AuditEntry) -> BlogResult<()> {
            Err(BlogError::Db(DbErr::Custom("audit store offline".into())))
        }
    }

    async fn setup(
        audit: Arc<dyn AuditSink>,
    ) -> (EngagementService, DatabaseConnection, PostModel, Viewer) {
        let db = test_utils::setup_test_db().await;
        let author = test_utils::create_user(&db, "ana", &["editor"]).await;
        let reader = test_utils::create_user(&db, "luis", &["user"]).await;
        let category = test_utils::create_category(&db, "General").await;
        let post = test_utils::create_post(&db, author.id, category.id, PostSeed::published("Toggle me")).await;
        let service = EngagementService::new(db.clone(), ListingConfig::default(), audit);
        (service, db, post, test_utils::viewer(&reader, &["user"]))
    }

    #[tokio::test]
    async fn test_like_twice_restores_membership() {
        let sink = Arc::new(RecordingSink::default());
        let (service, _db, post, reader) = setup(sink.clone()).await;

        let first = service._toggle_like(&reader, post.id).await.unwrap();
        assert_eq!(first.action, ToggleAction::Like);
        assert!(first.active);
        assert_eq!((first.before, first.after), (0, 1));

        let second = service._toggle_like(&reader, post.id).await.unwrap();
        assert_eq!(second.action, ToggleAction::Unlike);
        assert!(!second.active);
        assert_eq!((second.before, second.after), (1, 0));

        let entries = sink.entries.lock().unwrap().clone();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity, "Post");
        assert_eq!(entries[0].action, "LIKE");
        assert_eq!(entries[0].entity_id, post.id.into_uuid());
        assert_eq!(entries[0].performed_by, Some(first.actor));
        assert_eq!(entries[0].before, Some(json!({"likesCount": 0})));
        assert_eq!(entries[0].after, Some(json!({"likesCount": 1})));
        assert_eq!(entries[1].action, "UNLIKE");
    }

    #[tokio::test]
    async fn test_favorite_is_independent_of_like() {
        let sink = Arc::new(RecordingSink::default());
        let (service, db, post, reader) = setup(sink.clone()).await;

        service._toggle_like(&reader, post.id).await.unwrap();
        let fav = service._toggle_favorite(&reader, post.id).await.unwrap();
        assert_eq!(fav.action, ToggleAction::Favorite);
        assert_eq!((fav.before, fav.after), (0, 1));
        assert_eq!(listing::count_likes(&db, post.id).await.unwrap(), 1);

        let favorites = service._list_favorites(&reader, PageRequest::first()).await.unwrap();
        assert_eq!(favorites.total_items, 1);
        assert_eq!(favorites.items[0].id, post.id);

        let entries = sink.entries.lock().unwrap().clone();
        assert_eq!(entries[1].after, Some(json!({"favoritesCount": 1})));
    }

    #[tokio::test]
    async fn test_rejected_toggles_emit_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (service, db, post, reader) = setup(sink.clone()).await;

        assert!(matches!(
            service._toggle_like(&Viewer::Anonymous, post.id).await,
            Err(BlogError::Unauthenticated)
        ));
        assert!(matches!(
            service._toggle_like(&reader, PostId::new()).await,
            Err(BlogError::NotFound("post"))
        ));

        let author = test_utils::create_user(&db, "maria", &[]).await;
        let category = test_utils::create_category(&db, "Drafts").await;
        let draft = test_utils::create_post(
            &db,
            author.id,
            category.id,
            PostSeed::published("Draft").status(PostStatus::Draft),
        )
        .await;
        assert!(matches!(
            service._toggle_favorite(&reader, draft.id).await,
            Err(BlogError::NotFound("post"))
        ));
        assert!(matches!(
            service._list_favorites(&Viewer::Anonymous, PageRequest::first()).await,
            Err(BlogError::Unauthenticated)
        ));

        assert!(sink.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_toggle() {
        let (service, db, post, reader) = setup(Arc::new(BrokenSink)).await;

        let outcome = service._toggle_like(&reader, post.id).await.unwrap();
        assert!(outcome.active);
        assert_eq!(listing::count_likes(&db, post.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_by_two_users_both_land() {
        let (service, db, post, reader) = setup(Arc::new(RecordingSink::default())).await;
        let other = test_utils::create_user(&db, "sofia", &["user"]).await;
        let other = test_utils::viewer(&other, &["user"]);

        let (a, b) = tokio::join!(
            service._toggle_like(&reader, post.id),
            service._toggle_like(&other, post.id)
        );
        assert!(a.unwrap().active);
        assert!(b.unwrap().active);
        assert_eq!(listing::count_likes(&db, post.id).await.unwrap(), 2);
    }
}
