use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use zel_core::prelude::*;

use crate::{
    access::{authorize, AccessGate, Viewer, CONTENT_ROLES},
    audit::{self, AuditEntry, AuditSink},
    config::ListingConfig,
    entity::prelude::*,
    error::{BlogError, BlogResult},
    ids::{CategoryId, PostId, TagId, UserId},
    listing::{self, ListingEngine, Page, PageRequest, PostCard, PostFilter},
    service::comments::load_thread,
    slug::{base_slug, search_text, unique_slug},
    thread::CommentNode,
};

/// Fields for a new post.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub status: PostStatus,
    pub is_visible: bool,
    /// Defaults to now.
    pub publish_date: Option<DateTime<Utc>>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Replaces the whole tag set.
    pub tags: Option<Vec<TagId>>,
    pub status: Option<PostStatus>,
    pub is_visible: Option<bool>,
    pub publish_date: Option<DateTime<Utc>>,
}

/// Everything a post page shows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub post: PostCard,
    pub body: String,
    pub comments: Vec<CommentNode>,
    pub likes_count: u64,
    pub favorites_count: u64,
    pub is_liked: bool,
    pub is_favorited: bool,
}

fn required(field: &str, value: &str) -> BlogResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(BlogError::validation(format!("{field} is required")))
    } else {
        Ok(value.to_string())
    }
}

fn snapshot(post: &PostModel) -> serde_json::Value {
    json!({
        "title": post.title,
        "slug": post.slug,
        "status": post.status,
        "isVisible": post.is_visible,
        "categoryId": post.category_id,
        "publishDate": post.publish_date,
    })
}

#[derive(Clone)]
pub struct PostsService {
    db: DatabaseConnection,
    gate: AccessGate,
    listing: ListingEngine,
    audit: Arc<dyn AuditSink>,
}

impl PostsService {
    pub fn new(db: DatabaseConnection, config: ListingConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            gate: AccessGate::new(db.clone()),
            listing: ListingEngine::new(db.clone(), config),
            db,
            audit,
        }
    }

    /// Filtered listing of the posts `viewer` may see.
    pub async fn _list_posts(
        &self,
        viewer: &Viewer,
        filter: PostFilter,
        page: PageRequest,
    ) -> BlogResult<Page<PostCard>> {
        self.listing.list(&filter, page, viewer).await
    }

    pub async fn _get_post(&self, viewer: &Viewer, post_id: PostId) -> BlogResult<PostDetail> {
        let post = listing::find_visible_post(&self.db, post_id, viewer).await?;
        self.detail(viewer, post).await
    }

    pub async fn _get_post_by_slug(&self, viewer: &Viewer, slug: &str) -> BlogResult<PostDetail> {
        let post = listing::find_visible_post_by_slug(&self.db, slug, viewer).await?;
        self.detail(viewer, post).await
    }

    async fn detail(&self, viewer: &Viewer, post: PostModel) -> BlogResult<PostDetail> {
        let comments = load_thread(&self.db, post.id, viewer).await?;

        let (is_liked, is_favorited) = match viewer.id() {
            Some(user_id) => (
                PostLike::find_by_id((post.id, user_id))
                    .one(&self.db)
                    .await?
                    .is_some(),
                PostFavorite::find_by_id((post.id, user_id))
                    .one(&self.db)
                    .await?
                    .is_some(),
            ),
            None => (false, false),
        };

        let body = post.body.clone();
        let card = self.listing.card(post).await?;
        Ok(PostDetail {
            likes_count: card.likes_count,
            favorites_count: card.favorites_count,
            post: card,
            body,
            comments,
            is_liked,
            is_favorited,
        })
    }

    async fn ensure_category<C: ConnectionTrait>(conn: &C, id: CategoryId) -> BlogResult<()> {
        Category::find_by_id(id)
            .one(conn)
            .await?
            .map(|_| ())
            .ok_or(BlogError::NotFound("category"))
    }

    async fn ensure_tags<C: ConnectionTrait>(conn: &C, tags: &[TagId]) -> BlogResult<Vec<TagId>> {
        let wanted: Vec<TagId> = tags
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if wanted.is_empty() {
            return Ok(wanted);
        }
        let found = Tag::find()
            .filter(TagColumn::Id.is_in(wanted.iter().copied()))
            .count(conn)
            .await?;
        if found as usize != wanted.len() {
            return Err(BlogError::NotFound("tag"));
        }
        Ok(wanted)
    }

    async fn replace_tags<C: ConnectionTrait>(conn: &C, post_id: PostId, tags: &[TagId]) -> BlogResult<()> {
        PostTag::delete_many()
            .filter(PostTagColumn::PostId.eq(post_id))
            .exec(conn)
            .await?;
        if tags.is_empty() {
            return Ok(());
        }
        PostTag::insert_many(tags.iter().map(|&tag_id| PostTagActiveModel {
            post_id: Set(post_id),
            tag_id: Set(tag_id),
        }))
        .exec(conn)
        .await?;
        Ok(())
    }

    async fn find_post(&self, post_id: PostId) -> BlogResult<PostModel> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("post"))
    }

    pub async fn _create_post(&self, viewer: &Viewer, input: NewPost) -> BlogResult<PostCard> {
        let editor = authorize(viewer, CONTENT_ROLES)?;

        let title = required("title", &input.title)?;
        let summary = required("summary", &input.summary)?;
        let body = required("body", &input.body)?;
        Self::ensure_category(&self.db, input.category_id).await?;
        let tags = Self::ensure_tags(&self.db, &input.tags).await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let slug = unique_slug(&txn, Post::find(), PostColumn::Slug, &base_slug(&title, "post")).await?;
        let post = Post::insert(PostActiveModel {
            id: Set(PostId::new()),
            search_text: Set(search_text(&title, &body)),
            title: Set(title),
            slug: Set(slug),
            summary: Set(summary),
            body: Set(body),
            category_id: Set(input.category_id),
            author_id: Set(editor.id),
            status: Set(input.status),
            is_visible: Set(input.is_visible),
            publish_date: Set(input.publish_date.unwrap_or(now)),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_with_returning(&txn)
        .await
        .map_err(|e| BlogError::from_unique(e, "post slug"))?;
        Self::replace_tags(&txn, post.id, &tags).await?;
        txn.commit().await?;

        tracing::info!(post_id = %post.id, slug = %post.slug, author = %editor.username, "post created");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("Post", "CREATE", post.id)
                .by(editor.id)
                .after(snapshot(&post)),
        )
        .await;

        self.listing.card(post).await
    }

    /// The slug is regenerated only when the title actually changes.
    pub async fn _update_post(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        changes: PostChanges,
    ) -> BlogResult<PostCard> {
        let editor = authorize(viewer, CONTENT_ROLES)?;
        let post = self.find_post(post_id).await?;
        let before = snapshot(&post);

        if let Some(category_id) = changes.category_id {
            Self::ensure_category(&self.db, category_id).await?;
        }
        let tags = match &changes.tags {
            Some(tags) => Some(Self::ensure_tags(&self.db, tags).await?),
            None => None,
        };

        let txn = self.db.begin().await?;
        let mut active: PostActiveModel = post.clone().into();

        let mut title_now = post.title.clone();
        let mut body_now = post.body.clone();

        if let Some(title) = &changes.title {
            let title = required("title", title)?;
            if title != post.title {
                let slug = unique_slug(
                    &txn,
                    Post::find().filter(PostColumn::Id.ne(post_id)),
                    PostColumn::Slug,
                    &base_slug(&title, "post"),
                )
                .await?;
                active.slug = Set(slug);
                active.title = Set(title.clone());
                title_now = title;
            }
        }
        if let Some(summary) = &changes.summary {
            active.summary = Set(required("summary", summary)?);
        }
        if let Some(body) = &changes.body {
            body_now = required("body", body)?;
            active.body = Set(body_now.clone());
        }
        active.search_text = Set(search_text(&title_now, &body_now));
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(visible) = changes.is_visible {
            active.is_visible = Set(visible);
        }
        if let Some(publish_date) = changes.publish_date {
            active.publish_date = Set(publish_date);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| BlogError::from_unique(e, "post slug"))?;
        if let Some(tags) = tags {
            Self::replace_tags(&txn, post_id, &tags).await?;
        }
        txn.commit().await?;

        tracing::info!(%post_id, slug = %updated.slug, editor = %editor.username, "post updated");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("Post", "UPDATE", post_id)
                .by(editor.id)
                .before(before)
                .after(snapshot(&updated)),
        )
        .await;

        self.listing.card(updated).await
    }

    pub async fn _set_status(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        status: PostStatus,
    ) -> BlogResult<PostCard> {
        self._update_post(
            viewer,
            post_id,
            PostChanges {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn _set_visibility(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        is_visible: bool,
    ) -> BlogResult<PostCard> {
        self._update_post(
            viewer,
            post_id,
            PostChanges {
                is_visible: Some(is_visible),
                ..Default::default()
            },
        )
        .await
    }

    /// Comments, tag links, likes and favorites go with the post.
    pub async fn _delete_post(&self, viewer: &Viewer, post_id: PostId) -> BlogResult<()> {
        let editor = authorize(viewer, CONTENT_ROLES)?;
        let post = self.find_post(post_id).await?;

        Post::delete_by_id(post_id).exec(&self.db).await?;

        tracing::info!(%post_id, editor = %editor.username, "post deleted");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("Post", "DELETE", post_id)
                .by(editor.id)
                .before(snapshot(&post)),
        )
        .await;
        Ok(())
    }

    /// Posts written by `author_id`, as `viewer` may see them.
    pub async fn _list_posts_by_author(
        &self,
        viewer: &Viewer,
        author_id: UserId,
        page: PageRequest,
    ) -> BlogResult<Page<PostCard>> {
        let author = User::find_by_id(author_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("author"))?;
        let filter = PostFilter {
            author: Some(author.username),
            ..Default::default()
        };
        self.listing.list(&filter, page, viewer).await
    }

    async fn viewer(&self, session: Option<String>) -> BlogResult<Viewer> {
        self.gate.authenticate(session.as_deref()).await
    }
}

#[zel_service(name = "posts")]
trait Posts {
    #[doc = "List the posts visible to the caller, filtered and paginated"]
    #[method(name = "list_posts")]
    async fn list_posts(
        &self,
        session: Option<String>,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Page<PostCard>, ResourceError>;

    #[doc = "List posts written by one author"]
    #[method(name = "list_posts_by_author")]
    async fn list_posts_by_author(
        &self,
        session: Option<String>,
        author_id: UserId,
        page: PageRequest,
    ) -> Result<Page<PostCard>, ResourceError>;

    #[doc = "Get a post page by id"]
    #[method(name = "get_post")]
    async fn get_post(&self, session: Option<String>, post_id: PostId) -> Result<PostDetail, ResourceError>;

    #[doc = "Get a post page by slug"]
    #[method(name = "get_post_by_slug")]
    async fn get_post_by_slug(
        &self,
        session: Option<String>,
        slug: String,
    ) -> Result<PostDetail, ResourceError>;

    #[doc = "Create a post (admin or editor)"]
    #[method(name = "create_post")]
    async fn create_post(&self, session: Option<String>, input: NewPost) -> Result<PostCard, ResourceError>;

    #[doc = "Update a post (admin or editor); the slug follows title changes"]
    #[method(name = "update_post")]
    async fn update_post(
        &self,
        session: Option<String>,
        post_id: PostId,
        changes: PostChanges,
    ) -> Result<PostCard, ResourceError>;

    #[doc = "Move a post between draft, review and published"]
    #[method(name = "set_status")]
    async fn set_status(
        &self,
        session: Option<String>,
        post_id: PostId,
        status: PostStatus,
    ) -> Result<PostCard, ResourceError>;

    #[doc = "Show or hide a post"]
    #[method(name = "set_visibility")]
    async fn set_visibility(
        &self,
        session: Option<String>,
        post_id: PostId,
        is_visible: bool,
    ) -> Result<PostCard, ResourceError>;

    #[doc = "Delete a post with its comments and engagement"]
    #[method(name = "delete_post")]
    async fn delete_post(&self, session: Option<String>, post_id: PostId) -> Result<(), ResourceError>;
}

#[async_trait]
impl PostsServer for PostsService {
    async fn list_posts(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Page<PostCard>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_posts(&viewer, filter, page).await?)
    }

    async fn list_posts_by_author(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        author_id: UserId,
        page: PageRequest,
    ) -> Result<Page<PostCard>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_posts_by_author(&viewer, author_id, page).await?)
    }

    async fn get_post(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<PostDetail, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._get_post(&viewer, post_id).await?)
    }

    async fn get_post_by_slug(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        slug: String,
    ) -> Result<PostDetail, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._get_post_by_slug(&viewer, &slug).await?)
    }

    async fn create_post(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        input: NewPost,
    ) -> Result<PostCard, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._create_post(&viewer, input).await?)
    }

    async fn update_post(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
        changes: PostChanges,
    ) -> Result<PostCard, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._update_post(&viewer, post_id, changes).await?)
    }

    async fn set_status(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
        status: PostStatus,
    ) -> Result<PostCard, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._set_status(&viewer, post_id, status).await?)
    }

    async fn set_visibility(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
        is_visible: bool,
    ) -> Result<PostCard, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._set_visibility(&viewer, post_id, is_visible).await?)
    }

    async fn delete_post(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<(), ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._delete_post(&viewer, post_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::DbAuditSink,
        test_utils::{self, PostSeed},
    };
    use chrono::Duration;

    async fn setup_test_service() -> (PostsService, DatabaseConnection) {
        let db = test_utils::setup_test_db().await;
        let audit = Arc::new(DbAuditSink::new(db.clone()));
        (
            PostsService::new(db.clone(), ListingConfig::default(), audit),
            db,
        )
    }

    fn new_post(title: &str, category_id: CategoryId) -> NewPost {
        NewPost {
            title: title.to_string(),
            summary: "A short summary".to_string(),
            body: "The body".to_string(),
            category_id,
            tags: Vec::new(),
            status: PostStatus::Published,
            is_visible: true,
            publish_date: Some(Utc::now() - Duration::minutes(1)),
        }
    }

    #[tokio::test]
    async fn test_same_title_gets_distinct_stable_slugs() {
        let (service, db) = setup_test_service().await;
        let editor = test_utils::create_user(&db, "ana", &["editor"]).await;
        let viewer = test_utils::viewer(&editor, &["editor"]);
        let category = test_utils::create_category(&db, "General").await;

        let first = service
            ._create_post(&viewer, new_post("Hello World", category.id))
            .await
            .unwrap();
        let second = service
            ._create_post(&viewer, new_post("Hello World", category.id))
            .await
            .unwrap();
        assert_eq!(first.slug, "hello-world");
        assert_eq!(second.slug, "hello-world-2");

        // Non-title edits keep the slug.
        let edited = service
            ._update_post(
                &viewer,
                second.id,
                PostChanges {
                    body: Some("New body".into()),
                    title: Some("Hello World".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.slug, "hello-world-2");

        let renamed = service
            ._update_post(
                &viewer,
                first.id,
                PostChanges {
                    title: Some("Goodbye World".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.slug, "goodbye-world");
        assert_eq!(renamed.title, "Goodbye World");
    }

    #[tokio::test]
    async fn test_create_post_validates_input() {
        let (service, db) = setup_test_service().await;
        let editor = test_utils::create_user(&db, "ana", &["admin"]).await;
        let viewer = test_utils::viewer(&editor, &["admin"]);
        let category = test_utils::create_category(&db, "General").await;

        let mut blank = new_post("  ", category.id);
        blank.title = "   ".into();
        assert!(matches!(
            service._create_post(&viewer, blank).await,
            Err(BlogError::Validation(_))
        ));

        assert!(matches!(
            service._create_post(&viewer, new_post("Orphan", CategoryId::new())).await,
            Err(BlogError::NotFound("category"))
        ));

        let mut bad_tags = new_post("Tagged", category.id);
        bad_tags.tags = vec![TagId::new()];
        assert!(matches!(
            service._create_post(&viewer, bad_tags).await,
            Err(BlogError::NotFound("tag"))
        ));
    }

    #[tokio::test]
    async fn test_post_admin_requires_content_role() {
        let (service, db) = setup_test_service().await;
        let reader = test_utils::create_user(&db, "luis", &["user"]).await;
        let category = test_utils::create_category(&db, "General").await;

        let anonymous = service
            ._create_post(&Viewer::Anonymous, new_post("Nope", category.id))
            .await
            .unwrap_err();
        assert!(matches!(anonymous, BlogError::Unauthenticated));

        let forbidden = service
            ._create_post(&test_utils::viewer(&reader, &["user"]), new_post("Nope", category.id))
            .await
            .unwrap_err();
        assert!(matches!(forbidden, BlogError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_post_detail_respects_visibility() {
        let (service, db) = setup_test_service().await;
        let author = test_utils::create_user(&db, "ana", &["editor"]).await;
        let category = test_utils::create_category(&db, "General").await;
        let draft = test_utils::create_post(
            &db,
            author.id,
            category.id,
            PostSeed::published("Draft").status(PostStatus::Draft),
        )
        .await;

        let err = service._get_post(&Viewer::Anonymous, draft.id).await.unwrap_err();
        assert!(matches!(err, BlogError::NotFound("post")));
        let err = service
            ._get_post_by_slug(&Viewer::Anonymous, &draft.slug)
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::NotFound("post")));

        let editor = test_utils::viewer(&author, &["editor"]);
        let detail = service._get_post_by_slug(&editor, &draft.slug).await.unwrap();
        assert_eq!(detail.post.id, draft.id);
        assert_eq!(detail.body, draft.body);
    }

    #[tokio::test]
    async fn test_post_detail_merges_comments_and_engagement() {
        let (service, db) = setup_test_service().await;
        let author = test_utils::create_user(&db, "ana", &["editor"]).await;
        let reader = test_utils::create_user(&db, "luis", &["user"]).await;
        let category = test_utils::create_category(&db, "General").await;
        let post = test_utils::create_post(&db, author.id, category.id, PostSeed::published("Liked")).await;

        PostLike::insert(PostLikeActiveModel {
            post_id: Set(post.id),
            user_id: Set(reader.id),
            created_at: Set(Utc::now()),
        })
        .exec(&db)
        .await
        .unwrap();
        Comment::insert(CommentActiveModel {
            id: Set(crate::ids::CommentId::new()),
            post_id: Set(post.id),
            parent_id: Set(None),
            user_id: Set(Some(reader.id)),
            author: Set("luis".into()),
            author_email: Set(None),
            body: Set("Nice".into()),
            is_visible: Set(true),
            is_reported: Set(false),
            created_at: Set(Utc::now()),
        })
        .exec(&db)
        .await
        .unwrap();

        let as_reader = service
            ._get_post(&test_utils::viewer(&reader, &["user"]), post.id)
            .await
            .unwrap();
        assert_eq!(as_reader.likes_count, 1);
        assert!(as_reader.is_liked);
        assert!(!as_reader.is_favorited);
        assert_eq!(as_reader.comments.len(), 1);

        let as_public = service._get_post(&Viewer::Anonymous, post.id).await.unwrap();
        assert!(!as_public.is_liked);
        assert_eq!(as_public.likes_count, 1);
    }

    #[tokio::test]
    async fn test_delete_post_cascades_and_audits() {
        let (service, db) = setup_test_service().await;
        let author = test_utils::create_user(&db, "ana", &["admin"]).await;
        let viewer = test_utils::viewer(&author, &["admin"]);
        let category = test_utils::create_category(&db, "General").await;
        let tag = test_utils::create_tag(&db, "Rust").await;

        let mut input = new_post("Short lived", category.id);
        input.tags = vec![tag.id, tag.id];
        let card = service._create_post(&viewer, input).await.unwrap();
        assert_eq!(card.tags.len(), 1);

        PostFavorite::insert(PostFavoriteActiveModel {
            post_id: Set(card.id),
            user_id: Set(author.id),
            created_at: Set(Utc::now()),
        })
        .exec(&db)
        .await
        .unwrap();

        service._delete_post(&viewer, card.id).await.unwrap();

        assert!(Post::find_by_id(card.id).one(&db).await.unwrap().is_none());
        assert_eq!(PostTag::find().count(&db).await.unwrap(), 0);
        assert_eq!(PostFavorite::find().count(&db).await.unwrap(), 0);

        let actions: Vec<String> = audit::entries_for(&db, card.id.into_uuid())
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.action)
            .collect();
        assert_eq!(actions, vec!["CREATE", "DELETE"]);

        assert!(matches!(
            service._delete_post(&viewer, card.id).await,
            Err(BlogError::NotFound("post"))
        ));
    }

    #[tokio::test]
    async fn test_set_status_publishes_a_draft() {
        let (service, db) = setup_test_service().await;
        let author = test_utils::create_user(&db, "ana", &["editor"]).await;
        let viewer = test_utils::viewer(&author, &["editor"]);
        let category = test_utils::create_category(&db, "General").await;
        let draft = test_utils::create_post(
            &db,
            author.id,
            category.id,
            PostSeed::published("Soon").status(PostStatus::Draft),
        )
        .await;

        let public = service
            ._list_posts(&Viewer::Anonymous, PostFilter::default(), PageRequest::first())
            .await
            .unwrap();
        assert_eq!(public.total_items, 0);

        service._set_status(&viewer, draft.id, PostStatus::Published).await.unwrap();
        let public = service
            ._list_posts(&Viewer::Anonymous, PostFilter::default(), PageRequest::first())
            .await
            .unwrap();
        assert_eq!(public.total_items, 1);

        service._set_visibility(&viewer, draft.id, false).await.unwrap();
        let by_author = service
            ._list_posts_by_author(&Viewer::Anonymous, author.id, PageRequest::first())
            .await
            .unwrap();
        assert_eq!(by_author.total_items, 0);
    }
}
