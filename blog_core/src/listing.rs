//! Filtered, paginated post listings joined with their category, author,
//! tags and engagement counts.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::{Expr, Query},
    DatabaseConnection, Select,
};
use serde::{Deserialize, Serialize};

use crate::{
    access::Viewer,
    config::ListingConfig,
    entity::prelude::*,
    error::{BlogError, BlogResult},
    ids::{CategoryId, PostId, TagId, UserId},
    slug::fold_search,
};

pub const MAX_PER_PAGE: u64 = 100;
const MAX_KEYWORD_TERMS: usize = 8;
const MAX_KEYWORD_LEN: usize = 100;
const DATE_FORMAT: &str = "%d/%m/%Y";

static KEYWORD_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9áéíóúÁÉÍÓÚñÑ ]").expect("keyword pattern is valid"));

/// Narrowing applied on top of the viewer's visibility. `status` and
/// `is_visible` are honoured for privileged viewers only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Tag slug.
    pub tag: Option<String>,
    /// Author username.
    pub author: Option<String>,
    /// Calendar day as `DD/MM/YYYY`.
    pub date: Option<String>,
    pub keyword: Option<String>,
    pub status: Option<PostStatus>,
    pub is_visible: Option<bool>,
    pub favorited_by: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    /// Falls back to the configured page size.
    pub per_page: Option<u64>,
}

impl PageRequest {
    pub fn new(page: u64) -> Self {
        Self {
            page,
            per_page: None,
        }
    }

    pub fn first() -> Self {
        Self::new(1)
    }

    pub fn with_per_page(mut self, per_page: u64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Clamps the page to 1 and validates the size against `default_per_page`.
    pub fn resolve(self, default_per_page: u64) -> BlogResult<PageWindow> {
        let per_page = self.per_page.unwrap_or(default_per_page);
        if per_page == 0 {
            return Err(BlogError::validation("per_page must be greater than zero"));
        }
        Ok(PageWindow {
            page: self.page.max(1),
            per_page: per_page.min(MAX_PER_PAGE),
        })
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub per_page: u64,
}

impl PageWindow {
    /// Rows to skip. Saturates, and stays within SQLite's signed 64-bit range.
    pub fn offset(&self) -> u64 {
        self.per_page
            .saturating_mul(self.page.saturating_sub(1))
            .min(i64::MAX as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(window.per_page);
        Self {
            items,
            page: window.page,
            per_page: window.per_page,
            total_items,
            total_pages,
            has_next_page: window.page < total_pages,
            has_prev_page: window.page > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        let items = self.items.into_iter().map(f).collect();
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next_page: self.has_next_page,
            has_prev_page: self.has_prev_page,
        }
    }

    /// Same window, different items. Used when items are shaped in a batch.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next_page: self.has_next_page,
            has_prev_page: self.has_prev_page,
        }
    }
}

/// Runs `query` for one page window.
pub async fn paginate<E, C>(
    conn: &C,
    query: Select<E>,
    window: PageWindow,
) -> Result<Page<E::Model>, DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let total = query.clone().count(conn).await?;
    if window.offset() >= total {
        return Ok(Page::new(Vec::new(), window, total));
    }
    let items = query
        .offset(window.offset())
        .limit(window.per_page)
        .all(conn)
        .await?;
    Ok(Page::new(items, window, total))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: TagId,
    pub name: String,
    pub slug: String,
}

/// A post as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCard {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub status: PostStatus,
    pub is_visible: bool,
    pub publish_date: DateTime<Utc>,
    /// `publish_date` as `DD/MM/YYYY`.
    pub publish_date_formatted: String,
    pub created_at: DateTime<Utc>,
    pub category: Option<CategoryRef>,
    pub author: String,
    pub tags: Vec<TagRef>,
    pub likes_count: u64,
    pub favorites_count: u64,
}

/// Splits a raw search string into lowercase terms.
///
/// Characters outside latin letters, digits, Spanish accented vowels, `ñ` and
/// spaces are removed. At most 8 terms are kept, 100 characters in total.
pub fn keyword_terms(raw: &str) -> BlogResult<Vec<String>> {
    let cleaned = KEYWORD_STRIP.replace_all(raw, "");

    let mut terms = Vec::new();
    let mut budget = MAX_KEYWORD_LEN;
    for term in cleaned.split_whitespace() {
        if terms.len() == MAX_KEYWORD_TERMS || budget == 0 {
            break;
        }
        let term: String = term.chars().take(budget).collect();
        budget -= term.chars().count();
        terms.push(term.to_lowercase());
    }

    if terms.is_empty() {
        return Err(BlogError::validation("search keyword is empty"));
    }
    Ok(terms)
}

/// Posts whose title or body contains any of `terms`, ignoring case and
/// accents.
pub fn keyword_condition(terms: &[String]) -> Condition {
    terms.iter().fold(Condition::any(), |cond, term| {
        cond.add(PostColumn::SearchText.like(format!("%{}%", fold_search(term))))
    })
}

pub fn parse_day(raw: &str) -> BlogResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| BlogError::validation(format!("`{raw}` is not a DD/MM/YYYY date")))
}

/// `[start of day, start of next day)` in UTC.
pub fn day_window(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

pub fn format_day(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// What `viewer` may see: everything for admins and editors, otherwise
/// visible published posts whose publish date has passed.
pub fn visibility_condition(viewer: &Viewer, now: DateTime<Utc>) -> Condition {
    if viewer.is_privileged() {
        Condition::all()
    } else {
        Condition::all()
            .add(PostColumn::IsVisible.eq(true))
            .add(PostColumn::Status.eq(PostStatus::Published))
            .add(PostColumn::PublishDate.lte(now))
    }
}

/// The post with `post_id`, if `viewer` may see it.
pub async fn find_visible_post<C: ConnectionTrait>(
    conn: &C,
    post_id: PostId,
    viewer: &Viewer,
) -> BlogResult<PostModel> {
    Post::find_by_id(post_id)
        .filter(visibility_condition(viewer, Utc::now()))
        .one(conn)
        .await?
        .ok_or(BlogError::NotFound("post"))
}

pub async fn find_visible_post_by_slug<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    viewer: &Viewer,
) -> BlogResult<PostModel> {
    Post::find()
        .filter(PostColumn::Slug.eq(slug))
        .filter(visibility_condition(viewer, Utc::now()))
        .one(conn)
        .await?
        .ok_or(BlogError::NotFound("post"))
}

pub async fn count_likes<C: ConnectionTrait>(conn: &C, post_id: PostId) -> Result<u64, DbErr> {
    PostLike::find()
        .filter(PostLikeColumn::PostId.eq(post_id))
        .count(conn)
        .await
}

pub async fn count_favorites<C: ConnectionTrait>(conn: &C, post_id: PostId) -> Result<u64, DbErr> {
    PostFavorite::find()
        .filter(PostFavoriteColumn::PostId.eq(post_id))
        .count(conn)
        .await
}

async fn membership_counts<E, C>(
    conn: &C,
    post_column: E::Column,
    ids: &[PostId],
) -> Result<HashMap<PostId, u64>, DbErr>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let rows: Vec<(PostId, i64)> = E::find()
        .select_only()
        .column(post_column)
        .column_as(Expr::col(post_column).count(), "count")
        .filter(post_column.is_in(ids.iter().copied()))
        .group_by(post_column)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, count)| (id, u64::try_from(count).unwrap_or_default()))
        .collect())
}

#[derive(Clone)]
pub struct ListingEngine {
    db: DatabaseConnection,
    config: ListingConfig,
}

impl ListingEngine {
    pub fn new(db: DatabaseConnection, config: ListingConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> ListingConfig {
        self.config
    }

    /// Dashboard size for privileged viewers, public size otherwise.
    pub fn default_per_page(&self, viewer: &Viewer) -> u64 {
        if viewer.is_privileged() {
            self.config.admin_per_page
        } else {
            self.config.per_page
        }
    }

    /// Newest first, ties by id.
    pub async fn list(
        &self,
        filter: &PostFilter,
        page: PageRequest,
        viewer: &Viewer,
    ) -> BlogResult<Page<PostCard>> {
        let window = page.resolve(self.default_per_page(viewer))?;
        let query = self.filtered_query(filter, viewer).await?;

        let page = paginate(
            &self.db,
            query
                .order_by_desc(PostColumn::CreatedAt)
                .order_by_desc(PostColumn::Id),
            window,
        )
        .await?;

        let cards = self.hydrate(page.items).await?;
        Ok(Page {
            items: cards,
            page: page.page,
            per_page: page.per_page,
            total_items: page.total_items,
            total_pages: page.total_pages,
            has_next_page: page.has_next_page,
            has_prev_page: page.has_prev_page,
        })
    }

    async fn filtered_query(&self, filter: &PostFilter, viewer: &Viewer) -> BlogResult<Select<Post>> {
        let privileged = viewer.is_privileged();
        let mut query = Post::find().filter(visibility_condition(viewer, Utc::now()));

        if let Some(slug) = &filter.category {
            let category = Category::find()
                .filter(CategoryColumn::Slug.eq(slug.as_str()))
                .one(&self.db)
                .await?
                .ok_or(BlogError::NotFound("category"))?;
            query = query.filter(PostColumn::CategoryId.eq(category.id));
        }

        if let Some(slug) = &filter.tag {
            let tag = Tag::find()
                .filter(TagColumn::Slug.eq(slug.as_str()))
                .one(&self.db)
                .await?
                .ok_or(BlogError::NotFound("tag"))?;
            query = query.filter(
                PostColumn::Id.in_subquery(
                    Query::select()
                        .column(PostTagColumn::PostId)
                        .from(PostTag)
                        .and_where(PostTagColumn::TagId.eq(tag.id))
                        .to_owned(),
                ),
            );
        }

        if let Some(username) = &filter.author {
            let author = User::find()
                .filter(UserColumn::Username.eq(username.as_str()))
                .one(&self.db)
                .await?
                .ok_or(BlogError::NotFound("author"))?;
            query = query.filter(PostColumn::AuthorId.eq(author.id));
        }

        if let Some(raw) = &filter.date {
            let (start, end) = day_window(parse_day(raw)?);
            let column = if privileged {
                PostColumn::CreatedAt
            } else {
                PostColumn::PublishDate
            };
            query = query.filter(column.gte(start)).filter(column.lt(end));
        }

        if let Some(raw) = &filter.keyword {
            query = query.filter(keyword_condition(&keyword_terms(raw)?));
        }

        if privileged {
            if let Some(status) = filter.status {
                query = query.filter(PostColumn::Status.eq(status));
            }
            if let Some(visible) = filter.is_visible {
                query = query.filter(PostColumn::IsVisible.eq(visible));
            }
        }

        if let Some(user_id) = filter.favorited_by {
            query = query.filter(
                PostColumn::Id.in_subquery(
                    Query::select()
                        .column(PostFavoriteColumn::PostId)
                        .from(PostFavorite)
                        .and_where(PostFavoriteColumn::UserId.eq(user_id))
                        .to_owned(),
                ),
            );
        }

        Ok(query)
    }

    /// Joins posts with their category, author, tags and counts. Keeps the
    /// input order.
    pub async fn hydrate(&self, posts: Vec<PostModel>) -> BlogResult<Vec<PostCard>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<PostId> = posts.iter().map(|p| p.id).collect();

        let categories: HashMap<CategoryId, CategoryModel> = Category::find()
            .filter(CategoryColumn::Id.is_in(posts.iter().map(|p| p.category_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let authors: HashMap<UserId, String> = User::find()
            .filter(UserColumn::Id.is_in(posts.iter().map(|p| p.author_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let links = PostTag::find()
            .filter(PostTagColumn::PostId.is_in(post_ids.iter().copied()))
            .all(&self.db)
            .await?;
        let tags: HashMap<TagId, TagModel> = if links.is_empty() {
            HashMap::new()
        } else {
            Tag::find()
                .filter(TagColumn::Id.is_in(links.iter().map(|l| l.tag_id)))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|t| (t.id, t))
                .collect()
        };
        let mut tags_by_post: HashMap<PostId, Vec<TagRef>> = HashMap::new();
        for link in links {
            if let Some(tag) = tags.get(&link.tag_id) {
                tags_by_post.entry(link.post_id).or_default().push(TagRef {
                    id: tag.id,
                    name: tag.name.clone(),
                    slug: tag.slug.clone(),
                });
            }
        }

        let likes = membership_counts::<PostLike, _>(&self.db, PostLikeColumn::PostId, &post_ids).await?;
        let favorites =
            membership_counts::<PostFavorite, _>(&self.db, PostFavoriteColumn::PostId, &post_ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let mut post_tags = tags_by_post.remove(&post.id).unwrap_or_default();
                post_tags.sort_by(|a, b| a.name.cmp(&b.name));

                PostCard {
                    id: post.id,
                    category: categories.get(&post.category_id).map(|c| CategoryRef {
                        id: c.id,
                        name: c.name.clone(),
                        slug: c.slug.clone(),
                    }),
                    author: authors.get(&post.author_id).cloned().unwrap_or_default(),
                    tags: post_tags,
                    likes_count: likes.get(&post.id).copied().unwrap_or(0),
                    favorites_count: favorites.get(&post.id).copied().unwrap_or(0),
                    publish_date_formatted: format_day(post.publish_date),
                    title: post.title,
                    slug: post.slug,
                    summary: post.summary,
                    status: post.status,
                    is_visible: post.is_visible,
                    publish_date: post.publish_date,
                    created_at: post.created_at,
                }
            })
            .collect())
    }

    pub async fn card(&self, post: PostModel) -> BlogResult<PostCard> {
        self.hydrate(vec![post])
            .await?
            .pop()
            .ok_or(BlogError::NotFound("post"))
    }
}
