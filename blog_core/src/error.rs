use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zel_core::prelude::*;

/// Error returned by every service in the crate.
///
/// `Db` and `Internal` render as a generic message. The detail is logged when
/// the error is converted for the wire.
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error")]
    Db(#[from] DbErr),

    #[error("internal error")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Unauthenticated,
    Forbidden,
    Conflict,
    Internal,
}

impl BlogError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BlogError::Validation(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BlogError::Validation(_) => ErrorCategory::Validation,
            BlogError::NotFound(_) => ErrorCategory::NotFound,
            BlogError::Unauthenticated => ErrorCategory::Unauthenticated,
            BlogError::Forbidden(_) => ErrorCategory::Forbidden,
            BlogError::Conflict(_) => ErrorCategory::Conflict,
            BlogError::Db(_) | BlogError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Maps a unique-constraint violation to `Conflict`, anything else to `Db`.
    pub fn from_unique(error: DbErr, what: &str) -> Self {
        match error.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                BlogError::Conflict(format!("{what} already exists"))
            }
            _ => BlogError::Db(error),
        }
    }

    /// HTTP-style status a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Unauthenticated => 401,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Internal => 500,
        }
    }

    /// Structured part of the wire error, so clients can branch without
    /// parsing the message.
    pub fn context(&self) -> serde_json::Value {
        serde_json::json!({
            "category": self.category(),
            "status": self.status_code(),
        })
    }
}

/// Wire form of a service error. Store and internal details are logged here
/// and never sent.
impl From<BlogError> for ResourceError {
    fn from(error: BlogError) -> Self {
        let context = error.context();
        let mut wire = match error {
            BlogError::Db(detail) => {
                tracing::error!(error = ?detail, "store failure");
                ResourceError::infra("internal error")
            }
            BlogError::Internal(detail) => {
                tracing::error!(%detail, "internal failure");
                ResourceError::infra("internal error")
            }
            other => ResourceError::app(other),
        };
        if let ResourceError::CallbackError { context: slot, .. } = &mut wire {
            *slot = Some(context);
        }
        wire
    }
}

pub type BlogResult<T> = Result<T, BlogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = BlogError::from(DbErr::Custom("disk I/O error at /var/db".to_string()));
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn unique_violations_become_conflicts() {
        use crate::{entity::prelude::*, ids::TagId, test_utils};

        let db = test_utils::setup_test_db().await;
        test_utils::create_tag(&db, "Rust").await;

        let duplicate = Tag::insert(TagActiveModel {
            id: Set(TagId::new()),
            name: Set("Rust".to_string()),
            slug: Set("rust-2".to_string()),
            description: Set(None),
            created_at: Set(chrono::Utc::now()),
        })
        .exec(&db)
        .await
        .unwrap_err();

        let err = BlogError::from_unique(duplicate, "tag");
        assert!(matches!(err, BlogError::Conflict(_)));
        assert_eq!(err.status_code(), 409);
    }

    fn wire(error: BlogError) -> (String, serde_json::Value) {
        match ResourceError::from(error) {
            ResourceError::CallbackError {
                message, context, ..
            } => (message, context.expect("service errors carry a context")),
            other => panic!("unexpected wire error {other:?}"),
        }
    }

    #[test]
    fn store_details_never_reach_the_wire() {
        let (message, context) = wire(BlogError::from(DbErr::Custom(
            "disk I/O error at /var/db/blog.sqlite".to_string(),
        )));
        assert_eq!(message, "internal error");
        assert!(!message.contains("/var/db"));
        assert_eq!(context["category"], "internal");
        assert_eq!(context["status"], 500);

        let (message, _) = wire(BlogError::Internal("argon2 params rejected".into()));
        assert_eq!(message, "internal error");
    }

    #[test]
    fn wire_errors_carry_category_and_status() {
        let (message, context) = wire(BlogError::Unauthenticated);
        assert_eq!(message, "authentication required");
        assert_eq!(context["category"], "unauthenticated");
        assert_eq!(context["status"], 401);

        let (_, context) = wire(BlogError::Forbidden("admin only".into()));
        assert_eq!(context["category"], "forbidden");
        assert_eq!(context["status"], 403);

        let (_, context) = wire(BlogError::NotFound("post"));
        assert_eq!(context["category"], "not_found");
        assert_eq!(context["status"], 404);

        let (_, context) = wire(BlogError::Conflict("tag already exists".into()));
        assert_eq!(context["status"], 409);
    }

    #[test]
    fn auth_outcomes_are_distinct() {
        assert_eq!(BlogError::Unauthenticated.status_code(), 401);
        assert_eq!(BlogError::Forbidden("admin only".into()).status_code(), 403);
        assert_ne!(
            BlogError::Unauthenticated.category(),
            BlogError::Forbidden(String::new()).category()
        );
    }
}
