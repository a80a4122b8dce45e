use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use zel_core::prelude::*;

use crate::{
    access::{authorize, AccessGate, Viewer, ADMIN_ROLES},
    config::ListingConfig,
    entity::prelude::*,
    error::{BlogError, BlogResult},
    ids::{CommentId, PostId, UserId},
    listing::{self, paginate, Page, PageRequest},
    thread::{build_comment_forest, CommentNode},
};

/// A comment as submitted. `author` and `email` are only read for anonymous
/// viewers; signed-in viewers comment under their username.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NewComment {
    pub author: Option<String>,
    pub email: Option<String>,
    pub body: String,
    pub parent_id: Option<CommentId>,
}

/// Row of the moderation dashboard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModeratedComment {
    pub id: CommentId,
    pub post_id: PostId,
    pub post_title: String,
    pub parent_id: Option<CommentId>,
    pub user_id: Option<UserId>,
    pub author: String,
    pub author_email: Option<String>,
    pub body: String,
    pub is_visible: bool,
    pub is_reported: bool,
    pub created_at: DateTime<Utc>,
}

/// The comment forest of `post_id` as `viewer` sees it. Hidden comments are
/// left out for non-privileged viewers, so their visible replies surface as
/// orphans.
pub(crate) async fn load_thread<C: ConnectionTrait>(
    conn: &C,
    post_id: PostId,
    viewer: &Viewer,
) -> BlogResult<Vec<CommentNode>> {
    let mut query = Comment::find().filter(CommentColumn::PostId.eq(post_id));
    if !viewer.is_privileged() {
        query = query.filter(CommentColumn::IsVisible.eq(true));
    }
    Ok(build_comment_forest(query.all(conn).await?))
}

#[derive(Clone)]
pub struct CommentsService {
    db: DatabaseConnection,
    gate: AccessGate,
    config: ListingConfig,
}

impl CommentsService {
    pub fn new(db: DatabaseConnection, config: ListingConfig) -> Self {
        Self {
            gate: AccessGate::new(db.clone()),
            db,
            config,
        }
    }

    pub async fn _add_comment(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        comment: NewComment,
    ) -> BlogResult<CommentModel> {
        let post = listing::find_visible_post(&self.db, post_id, viewer).await?;

        let body = comment.body.trim();
        if body.is_empty() {
            return Err(BlogError::validation("comment body is required"));
        }

        let (author, author_email, user_id) = match viewer.user() {
            Some(user) => (user.username.clone(), None, Some(user.id)),
            None => {
                let author = comment
                    .author
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| BlogError::validation("name is required"))?;
                let email = comment
                    .email
                    .as_deref()
                    .map(str::trim)
                    .filter(|email| email.contains('@'))
                    .ok_or_else(|| BlogError::validation("a valid email is required"))?;
                (author.to_string(), Some(email.to_lowercase()), None)
            }
        };

        if let Some(parent_id) = comment.parent_id {
            let parent = Comment::find_by_id(parent_id)
                .one(&self.db)
                .await?
                .ok_or(BlogError::NotFound("parent comment"))?;
            if parent.post_id != post.id {
                return Err(BlogError::validation("parent comment belongs to another post"));
            }
        }

        let created = Comment::insert(CommentActiveModel {
            id: Set(CommentId::new()),
            post_id: Set(post.id),
            parent_id: Set(comment.parent_id),
            user_id: Set(user_id),
            author: Set(author),
            author_email: Set(author_email),
            body: Set(body.to_string()),
            is_visible: Set(true),
            is_reported: Set(false),
            created_at: Set(Utc::now()),
        })
        .exec_with_returning(&self.db)
        .await?;

        tracing::info!(comment_id = %created.id, %post_id, "comment added");
        Ok(created)
    }

    pub async fn _thread(&self, viewer: &Viewer, post_id: PostId) -> BlogResult<Vec<CommentNode>> {
        let post = listing::find_visible_post(&self.db, post_id, viewer).await?;
        load_thread(&self.db, post.id, viewer).await
    }

    /// Flags a comment for moderation. Open to everyone who can see it.
    pub async fn _report_comment(&self, viewer: &Viewer, comment_id: CommentId) -> BlogResult<()> {
        let comment = self.find_comment(comment_id).await?;
        listing::find_visible_post(&self.db, comment.post_id, viewer).await?;
        if !comment.is_visible && !viewer.is_privileged() {
            return Err(BlogError::NotFound("comment"));
        }

        let mut active: CommentActiveModel = comment.into();
        active.is_reported = Set(true);
        active.update(&self.db).await?;

        tracing::info!(%comment_id, "comment reported");
        Ok(())
    }

    /// Newest first, with the title of the post each comment belongs to.
    pub async fn _list_comments(
        &self,
        viewer: &Viewer,
        page: PageRequest,
    ) -> BlogResult<Page<ModeratedComment>> {
        authorize(viewer, ADMIN_ROLES)?;
        let window = page.resolve(self.config.admin_per_page)?;

        let page = paginate(
            &self.db,
            Comment::find()
                .order_by_desc(CommentColumn::CreatedAt)
                .order_by_desc(CommentColumn::Id),
            window,
        )
        .await?;

        let titles: HashMap<PostId, String> = if page.items.is_empty() {
            HashMap::new()
        } else {
            Post::find()
                .filter(PostColumn::Id.is_in(page.items.iter().map(|c| c.post_id)))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|post| (post.id, post.title))
                .collect()
        };

        Ok(page.map(|comment| ModeratedComment {
            post_title: titles.get(&comment.post_id).cloned().unwrap_or_default(),
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            user_id: comment.user_id,
            author: comment.author,
            author_email: comment.author_email,
            body: comment.body,
            is_visible: comment.is_visible,
            is_reported: comment.is_reported,
            created_at: comment.created_at,
        }))
    }

    /// Replies stay in place and show up as orphans afterwards.
    pub async fn _delete_comment(&self, viewer: &Viewer, comment_id: CommentId) -> BlogResult<()> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        let deleted = Comment::delete_by_id(comment_id).exec(&self.db).await?;
        if deleted.rows_affected == 0 {
            return Err(BlogError::NotFound("comment"));
        }
        tracing::info!(%comment_id, admin = %admin.username, "comment deleted");
        Ok(())
    }

    pub async fn _set_comment_visibility(
        &self,
        viewer: &Viewer,
        comment_id: CommentId,
        is_visible: bool,
    ) -> BlogResult<CommentModel> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        let comment = self.find_comment(comment_id).await?;

        let mut active: CommentActiveModel = comment.into();
        active.is_visible = Set(is_visible);
        let updated = active.update(&self.db).await?;

        tracing::info!(%comment_id, is_visible, admin = %admin.username, "comment visibility changed");
        Ok(updated)
    }

    async fn find_comment(&self, comment_id: CommentId) -> BlogResult<CommentModel> {
        Comment::find_by_id(comment_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("comment"))
    }

    async fn viewer(&self, session: Option<String>) -> BlogResult<Viewer> {
        self.gate.authenticate(session.as_deref()).await
    }
}

#[zel_service(name = "comments")]
trait Comments {
    #[doc = "Comment on a post, optionally as a reply to another comment"]
    #[method(name = "add_comment")]
    async fn add_comment(
        &self,
        session: Option<String>,
        post_id: PostId,
        comment: NewComment,
    ) -> Result<CommentModel, ResourceError>;

    #[doc = "The nested comment thread of a post"]
    #[method(name = "thread")]
    async fn thread(
        &self,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<Vec<CommentNode>, ResourceError>;

    #[doc = "Flag a comment for moderation"]
    #[method(name = "report_comment")]
    async fn report_comment(
        &self,
        session: Option<String>,
        comment_id: CommentId,
    ) -> Result<(), ResourceError>;

    #[doc = "All comments, newest first (admin)"]
    #[method(name = "list_comments")]
    async fn list_comments(
        &self,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<ModeratedComment>, ResourceError>;

    #[doc = "Delete a comment (admin)"]
    #[method(name = "delete_comment")]
    async fn delete_comment(
        &self,
        session: Option<String>,
        comment_id: CommentId,
    ) -> Result<(), ResourceError>;

    #[doc = "Show or hide a comment (admin)"]
    #[method(name = "set_comment_visibility")]
    async fn set_comment_visibility(
        &self,
        session: Option<String>,
        comment_id: CommentId,
        is_visible: bool,
    ) -> Result<CommentModel, ResourceError>;
}

#[async_trait]
impl CommentsServer for CommentsService {
    async fn add_comment(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
        comment: NewComment,
    ) -> Result<CommentModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._add_comment(&viewer, post_id, comment).await?)
    }

    async fn thread(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        post_id: PostId,
    ) -> Result<Vec<CommentNode>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._thread(&viewer, post_id).await?)
    }

    async fn report_comment(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        comment_id: CommentId,
    ) -> Result<(), ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._report_comment(&viewer, comment_id).await?)
    }

    async fn list_comments(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<ModeratedComment>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_comments(&viewer, page).await?)
    }

    async fn delete_comment(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        comment_id: CommentId,
    ) -> Result<(), ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._delete_comment(&viewer, comment_id).await?)
    }

    async fn set_comment_visibility(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        comment_id: CommentId,
        is_visible: bool,
    ) -> Result<CommentModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._set_comment_visibility(&viewer, comment_id, is_visible).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, PostSeed};

    async fn setup_test_service() -> (CommentsService, DatabaseConnection, PostModel) {
        let db = test_utils::setup_test_db().await;
        let author = test_utils::create_user(&db, "ana", &["editor"]).await;
        let category = test_utils::create_category(&db, "General").await;
        let post = test_utils::create_post(&db, author.id, category.id, PostSeed::published("Threaded")).await;
        (CommentsService::new(db.clone(), ListingConfig::default()), db, post)
    }

    fn anonymous(body: &str) -> NewComment {
        NewComment {
            author: Some("Visitante".into()),
            email: Some("Visit@Example.com".into()),
            body: body.into(),
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn test_anonymous_comment_needs_name_and_email() {
        let (service, _db, post) = setup_test_service().await;

        let created = service
            ._add_comment(&Viewer::Anonymous, post.id, anonymous("Hola"))
            .await
            .unwrap();
        assert_eq!(created.author, "Visitante");
        assert_eq!(created.author_email.as_deref(), Some("visit@example.com"));
        assert_eq!(created.user_id, None);

        let mut nameless = anonymous("Hola");
        nameless.author = Some("  ".into());
        assert!(matches!(
            service._add_comment(&Viewer::Anonymous, post.id, nameless).await,
            Err(BlogError::Validation(_))
        ));

        let mut no_email = anonymous("Hola");
        no_email.email = Some("not-an-email".into());
        assert!(matches!(
            service._add_comment(&Viewer::Anonymous, post.id, no_email).await,
            Err(BlogError::Validation(_))
        ));

        assert!(matches!(
            service._add_comment(&Viewer::Anonymous, post.id, anonymous("   ")).await,
            Err(BlogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_in_comment_uses_username() {
        let (service, db, post) = setup_test_service().await;
        let reader = test_utils::create_user(&db, "luis", &["user"]).await;

        let created = service
            ._add_comment(
                &test_utils::viewer(&reader, &["user"]),
                post.id,
                NewComment {
                    author: Some("Someone Else".into()),
                    body: "Great post".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.author, "luis");
        assert_eq!(created.user_id, Some(reader.id));
        assert_eq!(created.author_email, None);
    }

    #[tokio::test]
    async fn test_replies_require_parent_on_same_post() {
        let (service, db, post) = setup_test_service().await;
        let author = test_utils::create_user(&db, "maria", &[]).await;
        let category = test_utils::create_category(&db, "Other").await;
        let other_post = test_utils::create_post(&db, author.id, category.id, PostSeed::published("Elsewhere")).await;

        let root = service
            ._add_comment(&Viewer::Anonymous, post.id, anonymous("Root"))
            .await
            .unwrap();
        let foreign = service
            ._add_comment(&Viewer::Anonymous, other_post.id, anonymous("Foreign"))
            .await
            .unwrap();

        let mut reply = anonymous("Reply");
        reply.parent_id = Some(root.id);
        let reply = service._add_comment(&Viewer::Anonymous, post.id, reply).await.unwrap();

        let mut cross = anonymous("Cross");
        cross.parent_id = Some(foreign.id);
        assert!(matches!(
            service._add_comment(&Viewer::Anonymous, post.id, cross).await,
            Err(BlogError::Validation(_))
        ));

        let mut dangling = anonymous("Dangling");
        dangling.parent_id = Some(CommentId::new());
        assert!(matches!(
            service._add_comment(&Viewer::Anonymous, post.id, dangling).await,
            Err(BlogError::NotFound("parent comment"))
        ));

        let thread = service._thread(&Viewer::Anonymous, post.id).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].id, root.id);
        assert_eq!(thread[0].replies[0].id, reply.id);
    }

    #[tokio::test]
    async fn test_comments_on_hidden_posts_are_not_found() {
        let (service, db, _post) = setup_test_service().await;
        let author = test_utils::create_user(&db, "maria", &[]).await;
        let category = test_utils::create_category(&db, "Other").await;
        let hidden = test_utils::create_post(&db, author.id, category.id, PostSeed::published("Hidden").hidden()).await;

        assert!(matches!(
            service._add_comment(&Viewer::Anonymous, hidden.id, anonymous("Hi")).await,
            Err(BlogError::NotFound("post"))
        ));
        assert!(matches!(
            service._thread(&Viewer::Anonymous, hidden.id).await,
            Err(BlogError::NotFound("post"))
        ));
    }

    #[tokio::test]
    async fn test_moderation_hides_and_orphans() {
        let (service, db, post) = setup_test_service().await;
        let admin_user = test_utils::create_user(&db, "root", &["admin"]).await;
        let admin = test_utils::viewer(&admin_user, &["admin"]);

        let root = service
            ._add_comment(&Viewer::Anonymous, post.id, anonymous("Root"))
            .await
            .unwrap();
        let mut reply = anonymous("Reply");
        reply.parent_id = Some(root.id);
        let reply = service._add_comment(&Viewer::Anonymous, post.id, reply).await.unwrap();

        service._report_comment(&Viewer::Anonymous, root.id).await.unwrap();
        service._set_comment_visibility(&admin, root.id, false).await.unwrap();

        // The public no longer sees the root; its reply surfaces as an orphan.
        let public = service._thread(&Viewer::Anonymous, post.id).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, reply.id);
        assert!(public[0].orphaned);

        // Admins still see the full tree.
        let full = service._thread(&admin, post.id).await.unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].id, root.id);
        assert!(full[0].is_reported);
        assert!(!full[0].is_visible);

        let listed = service._list_comments(&admin, PageRequest::first()).await.unwrap();
        assert_eq!(listed.total_items, 2);
        assert_eq!(listed.items[0].id, reply.id);
        assert_eq!(listed.items[0].post_title, "Threaded");

        service._delete_comment(&admin, root.id).await.unwrap();
        let after_delete = service._thread(&admin, post.id).await.unwrap();
        assert_eq!(after_delete.len(), 1);
        assert!(after_delete[0].orphaned);
        assert!(matches!(
            service._delete_comment(&admin, root.id).await,
            Err(BlogError::NotFound("comment"))
        ));
    }

    #[tokio::test]
    async fn test_moderation_is_admin_only() {
        let (service, db, _post) = setup_test_service().await;
        let editor = test_utils::create_user(&db, "eva", &["editor"]).await;

        assert!(matches!(
            service._list_comments(&Viewer::Anonymous, PageRequest::first()).await,
            Err(BlogError::Unauthenticated)
        ));
        assert!(matches!(
            service
                ._list_comments(&test_utils::viewer(&editor, &["editor"]), PageRequest::first())
                .await,
            Err(BlogError::Forbidden(_))
        ));
    }
}
