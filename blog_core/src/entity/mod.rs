// SeaORM entities for every collection the blog persists.

pub mod audit_log;
pub mod category;
pub mod comment;
pub mod post;
pub mod post_favorite;
pub mod post_like;
pub mod post_tag;
pub mod role;
pub mod session;
pub mod subscriber;
pub mod subscriber_scope;
pub mod tag;
pub mod user;
pub mod user_role;


pub mod prelude {
    pub use super::audit_log::{
        ActiveModel as AuditLogActiveModel, Column as AuditLogColumn, Entity as AuditLog,
        Model as AuditLogModel,
    };
    pub use super::category::{
        ActiveModel as CategoryActiveModel, Column as CategoryColumn, Entity as Category,
        Model as CategoryModel,
    };
    pub use super::comment::{
        ActiveModel as CommentActiveModel, Column as CommentColumn, Entity as Comment,
        Model as CommentModel,
    };
    pub use super::post::{
        ActiveModel as PostActiveModel, Column as PostColumn, Entity as Post,
        Model as PostModel, PostStatus,
    };
    pub use super::post_favorite::{
        ActiveModel as PostFavoriteActiveModel, Column as PostFavoriteColumn,
        Entity as PostFavorite, Model as PostFavoriteModel,
    };
    pub use super::post_like::{
        ActiveModel as PostLikeActiveModel, Column as PostLikeColumn, Entity as PostLike,
        Model as PostLikeModel,
    };
    pub use super::post_tag::{
        ActiveModel as PostTagActiveModel, Column as PostTagColumn, Entity as PostTag,
        Model as PostTagModel,
    };
    pub use super::role::{
        ActiveModel as RoleActiveModel, Column as RoleColumn, Entity as RoleEntity,
        Model as RoleModel,
    };
    pub use super::session::{
        ActiveModel as SessionActiveModel, Column as SessionColumn, Entity as Session,
        Model as SessionModel,
    };
    pub use super::subscriber::{
        ActiveModel as SubscriberActiveModel, Column as SubscriberColumn, Entity as Subscriber,
        Model as SubscriberModel,
    };
    pub use super::subscriber_scope::{
        ActiveModel as SubscriberScopeActiveModel, Column as SubscriberScopeColumn,
        Entity as SubscriberScope, Model as SubscriberScopeModel, ScopeKind,
    };
    pub use super::tag::{
        ActiveModel as TagActiveModel, Column as TagColumn, Entity as Tag, Model as TagModel,
    };
    pub use super::user::{
        ActiveModel as UserActiveModel, Column as UserColumn, Entity as User, Model as UserModel,
    };
    pub use super::user_role::{
        ActiveModel as UserRoleActiveModel, Column as UserRoleColumn, Entity as UserRole,
        Model as UserRoleModel,
    };

    // Re-export commonly used SeaORM types and traits
    pub use sea_orm::{
        ActiveModelTrait,
        ActiveValue,

        ColumnTrait,
        Condition,
        ConnectionTrait,

        // Database and connection types
        Database,
        DatabaseConnection,
        DatabaseTransaction,
        DbConn,
        // Common result types
        DbErr,

        // Core traits
        EntityTrait,
        ModelTrait,
        NotSet,
        // Pagination
        PaginatorTrait,
        QueryFilter,
        QueryOrder,
        QuerySelect,
        Related,
        // Active model helpers
        Set,
        TransactionTrait,
        Unchanged,
    };
}
