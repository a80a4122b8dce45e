use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use zel_core::prelude::*;

use crate::{
    access::{authorize, AccessGate, Viewer, ADMIN_ROLES},
    config::ListingConfig,
    entity::prelude::*,
    error::{BlogError, BlogResult},
    ids::{CategoryId, TagId},
    listing::{paginate, Page, PageRequest},
    slug::{base_slug, unique_slug},
};

/// Name and description of a new category or tag.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewTerm {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update of a category or tag; `None` leaves a field untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TermChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn clean_name(raw: &str) -> BlogResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(BlogError::validation("name is required"));
    }
    Ok(name.to_string())
}

fn clean_description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

#[derive(Clone)]
pub struct TaxonomyService {
    db: DatabaseConnection,
    gate: AccessGate,
    admin_per_page: u64,
}

impl TaxonomyService {
    pub fn new(db: DatabaseConnection, config: ListingConfig) -> Self {
        Self {
            gate: AccessGate::new(db.clone()),
            db,
            admin_per_page: config.admin_per_page,
        }
    }

    pub async fn _create_category(&self, viewer: &Viewer, input: NewTerm) -> BlogResult<CategoryModel> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        let name = clean_name(&input.name)?;
        let slug = unique_slug(
            &self.db,
            Category::find(),
            CategoryColumn::Slug,
            &base_slug(&name, "category"),
        )
        .await?;

        let category = Category::insert(CategoryActiveModel {
            id: Set(CategoryId::new()),
            name: Set(name),
            slug: Set(slug),
            description: Set(clean_description(input.description)),
            created_at: Set(Utc::now()),
        })
        .exec_with_returning(&self.db)
        .await
        .map_err(|e| BlogError::from_unique(e, "category"))?;

        tracing::info!(category_id = %category.id, slug = %category.slug, admin = %admin.username, "category created");
        Ok(category)
    }

    pub async fn _update_category(
        &self,
        viewer: &Viewer,
        category_id: CategoryId,
        changes: TermChanges,
    ) -> BlogResult<CategoryModel> {
        authorize(viewer, ADMIN_ROLES)?;
        let current = Category::find_by_id(category_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("category"))?;

        let renamed = match changes.name {
            Some(raw) => Some(clean_name(&raw)?).filter(|name| *name != current.name),
            None => None,
        };

        let mut active: CategoryActiveModel = current.into();
        if let Some(name) = renamed {
            let slug = unique_slug(
                &self.db,
                Category::find().filter(CategoryColumn::Id.ne(category_id)),
                CategoryColumn::Slug,
                &base_slug(&name, "category"),
            )
            .await?;
            active.slug = Set(slug);
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(clean_description(Some(description)));
        }

        active
            .update(&self.db)
            .await
            .map_err(|e| BlogError::from_unique(e, "category"))
    }

    /// Categories still referenced by posts cannot be removed.
    pub async fn _delete_category(&self, viewer: &Viewer, category_id: CategoryId) -> BlogResult<()> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        let in_use = Post::find()
            .filter(PostColumn::CategoryId.eq(category_id))
            .count(&self.db)
            .await?;
        if in_use > 0 {
            return Err(BlogError::Conflict(format!(
                "category is used by {in_use} post(s)"
            )));
        }

        let deleted = Category::delete_by_id(category_id).exec(&self.db).await?;
        if deleted.rows_affected == 0 {
            return Err(BlogError::NotFound("category"));
        }
        tracing::info!(%category_id, admin = %admin.username, "category deleted");
        Ok(())
    }

    /// Newest first; `name` matches any part of the name.
    pub async fn _list_categories(
        &self,
        viewer: &Viewer,
        name: Option<String>,
        page: PageRequest,
    ) -> BlogResult<Page<CategoryModel>> {
        authorize(viewer, ADMIN_ROLES)?;
        let window = page.resolve(self.admin_per_page)?;
        let mut query = Category::find()
            .order_by_desc(CategoryColumn::CreatedAt)
            .order_by_desc(CategoryColumn::Id);
        if let Some(name) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            query = query.filter(CategoryColumn::Name.contains(name));
        }
        Ok(paginate(&self.db, query, window).await?)
    }

    pub async fn _category_by_slug(&self, viewer: &Viewer, slug: &str) -> BlogResult<CategoryModel> {
        authorize(viewer, ADMIN_ROLES)?;
        Category::find()
            .filter(CategoryColumn::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("category"))
    }

    pub async fn _create_tag(&self, viewer: &Viewer, input: NewTerm) -> BlogResult<TagModel> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        let name = clean_name(&input.name)?;
        let slug = unique_slug(&self.db, Tag::find(), TagColumn::Slug, &base_slug(&name, "tag")).await?;

        let tag = Tag::insert(TagActiveModel {
            id: Set(TagId::new()),
            name: Set(name),
            slug: Set(slug),
            description: Set(clean_description(input.description)),
            created_at: Set(Utc::now()),
        })
        .exec_with_returning(&self.db)
        .await
        .map_err(|e| BlogError::from_unique(e, "tag"))?;

        tracing::info!(tag_id = %tag.id, slug = %tag.slug, admin = %admin.username, "tag created");
        Ok(tag)
    }

    pub async fn _update_tag(&self, viewer: &Viewer, tag_id: TagId, changes: TermChanges) -> BlogResult<TagModel> {
        authorize(viewer, ADMIN_ROLES)?;
        let current = Tag::find_by_id(tag_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("tag"))?;

        let renamed = match changes.name {
            Some(raw) => Some(clean_name(&raw)?).filter(|name| *name != current.name),
            None => None,
        };

        let mut active: TagActiveModel = current.into();
        if let Some(name) = renamed {
            let slug = unique_slug(
                &self.db,
                Tag::find().filter(TagColumn::Id.ne(tag_id)),
                TagColumn::Slug,
                &base_slug(&name, "tag"),
            )
            .await?;
            active.slug = Set(slug);
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(clean_description(Some(description)));
        }

        active
            .update(&self.db)
            .await
            .map_err(|e| BlogError::from_unique(e, "tag"))
    }

    /// Post links go with the tag.
    pub async fn _delete_tag(&self, viewer: &Viewer, tag_id: TagId) -> BlogResult<()> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        let deleted = Tag::delete_by_id(tag_id).exec(&self.db).await?;
        if deleted.rows_affected == 0 {
            return Err(BlogError::NotFound("tag"));
        }
        tracing::info!(%tag_id, admin = %admin.username, "tag deleted");
        Ok(())
    }

    pub async fn _list_tags(
        &self,
        viewer: &Viewer,
        name: Option<String>,
        page: PageRequest,
    ) -> BlogResult<Page<TagModel>> {
        authorize(viewer, ADMIN_ROLES)?;
        let window = page.resolve(self.admin_per_page)?;
        let mut query = Tag::find()
            .order_by_desc(TagColumn::CreatedAt)
            .order_by_desc(TagColumn::Id);
        if let Some(name) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            query = query.filter(TagColumn::Name.contains(name));
        }
        Ok(paginate(&self.db, query, window).await?)
    }

    pub async fn _tag_by_slug(&self, viewer: &Viewer, slug: &str) -> BlogResult<TagModel> {
        authorize(viewer, ADMIN_ROLES)?;
        Tag::find()
            .filter(TagColumn::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("tag"))
    }

    async fn viewer(&self, session: Option<String>) -> BlogResult<Viewer> {
        self.gate.authenticate(session.as_deref()).await
    }
}

#[zel_service(name = "taxonomy")]
trait Taxonomy {
    #[doc = "Create a category"]
    #[method(name = "create_category")]
    async fn create_category(
        &self,
        session: Option<String>,
        input: NewTerm,
    ) -> Result<CategoryModel, ResourceError>;

    #[doc = "Rename or describe a category"]
    #[method(name = "update_category")]
    async fn update_category(
        &self,
        session: Option<String>,
        category_id: CategoryId,
        changes: TermChanges,
    ) -> Result<CategoryModel, ResourceError>;

    #[doc = "Delete an unused category"]
    #[method(name = "delete_category")]
    async fn delete_category(
        &self,
        session: Option<String>,
        category_id: CategoryId,
    ) -> Result<(), ResourceError>;

    #[doc = "List categories, newest first"]
    #[method(name = "list_categories")]
    async fn list_categories(
        &self,
        session: Option<String>,
        name: Option<String>,
        page: PageRequest,
    ) -> Result<Page<CategoryModel>, ResourceError>;

    #[doc = "Fetch a category by slug"]
    #[method(name = "category_by_slug")]
    async fn category_by_slug(
        &self,
        session: Option<String>,
        slug: String,
    ) -> Result<CategoryModel, ResourceError>;

    #[doc = "Create a tag"]
    #[method(name = "create_tag")]
    async fn create_tag(&self, session: Option<String>, input: NewTerm) -> Result<TagModel, ResourceError>;

    #[doc = "Rename or describe a tag"]
    #[method(name = "update_tag")]
    async fn update_tag(
        &self,
        session: Option<String>,
        tag_id: TagId,
        changes: TermChanges,
    ) -> Result<TagModel, ResourceError>;

    #[doc = "Delete a tag and its post links"]
    #[method(name = "delete_tag")]
    async fn delete_tag(&self, session: Option<String>, tag_id: TagId) -> Result<(), ResourceError>;

    #[doc = "List tags, newest first"]
    #[method(name = "list_tags")]
    async fn list_tags(
        &self,
        session: Option<String>,
        name: Option<String>,
        page: PageRequest,
    ) -> Result<Page<TagModel>, ResourceError>;

    #[doc = "Fetch a tag by slug"]
    #[method(name = "tag_by_slug")]
    async fn tag_by_slug(&self, session: Option<String>, slug: String) -> Result<TagModel, ResourceError>;
}

#[async_trait]
impl TaxonomyServer for TaxonomyService {
    async fn create_category(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        input: NewTerm,
    ) -> Result<CategoryModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._create_category(&viewer, input).await?)
    }

    async fn update_category(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        category_id: CategoryId,
        changes: TermChanges,
    ) -> Result<CategoryModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._update_category(&viewer, category_id, changes).await?)
    }

    async fn delete_category(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        category_id: CategoryId,
    ) -> Result<(), ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._delete_category(&viewer, category_id).await?)
    }

    async fn list_categories(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        name: Option<String>,
        page: PageRequest,
    ) -> Result<Page<CategoryModel>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_categories(&viewer, name, page).await?)
    }

    async fn category_by_slug(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        slug: String,
    ) -> Result<CategoryModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._category_by_slug(&viewer, &slug).await?)
    }

    async fn create_tag(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        input: NewTerm,
    ) -> Result<TagModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._create_tag(&viewer, input).await?)
    }

    async fn update_tag(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        tag_id: TagId,
        changes: TermChanges,
    ) -> Result<TagModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._update_tag(&viewer, tag_id, changes).await?)
    }

    async fn delete_tag(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        tag_id: TagId,
    ) -> Result<(), ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._delete_tag(&viewer, tag_id).await?)
    }

    async fn list_tags(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        name: Option<String>,
        page: PageRequest,
    ) -> Result<Page<TagModel>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_tags(&viewer, name, page).await?)
    }

    async fn tag_by_slug(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        slug: String,
    ) -> Result<TagModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._tag_by_slug(&viewer, &slug).await?)
    }
}
