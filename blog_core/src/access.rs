use std::fmt;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    entity::prelude::*,
    error::{BlogError, BlogResult},
    ids::UserId,
};

/// A role name normalized at the boundary. Unknown names are kept verbatim
/// (lowercased) so custom roles created by an admin still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Editor,
    User,
    Student,
    Instructor,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        let name = raw.trim().to_lowercase();
        match name.as_str() {
            "admin" => Role::Admin,
            "editor" => Role::Editor,
            "user" => Role::User,
            "student" => Role::Student,
            "instructor" => Role::Instructor,
            _ => Role::Other(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::User => "user",
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Other(name) => name,
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Role::parse(&raw)
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::parse(raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles allowed to manage content.
pub const CONTENT_ROLES: &[Role] = &[Role::Admin, Role::Editor];

/// Roles allowed to manage users, taxonomy, moderation and subscribers.
pub const ADMIN_ROLES: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    pub roles: Vec<Role>,
}

impl AuthenticatedUser {
    pub fn has_any(&self, required: &[Role]) -> bool {
        self.roles.iter().any(|role| required.contains(role))
    }

    pub fn is_privileged(&self) -> bool {
        self.roles.iter().any(Role::is_privileged)
    }
}

/// Who is asking. Every read path decides visibility from this alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Viewer {
    Anonymous,
    User(AuthenticatedUser),
}

impl Viewer {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(user) => Some(user),
        }
    }

    pub fn id(&self) -> Option<UserId> {
        self.user().map(|user| user.id)
    }

    pub fn is_privileged(&self) -> bool {
        self.user().is_some_and(AuthenticatedUser::is_privileged)
    }

    /// Any signed-in user, whatever their roles.
    pub fn require_user(&self) -> BlogResult<&AuthenticatedUser> {
        self.user().ok_or(BlogError::Unauthenticated)
    }
}

/// Anonymous viewers get `Unauthenticated`; signed-in viewers without one of
/// the `required` roles get `Forbidden`.
pub fn authorize<'a>(viewer: &'a Viewer, required: &[Role]) -> BlogResult<&'a AuthenticatedUser> {
    let user = viewer.require_user()?;
    if user.has_any(required) {
        Ok(user)
    } else {
        let names: Vec<&str> = required.iter().map(Role::as_str).collect();
        Err(BlogError::Forbidden(format!("requires one of: {}", names.join(", "))))
    }
}

/// Resolves session tokens into viewers.
#[derive(Clone)]
pub struct AccessGate {
    db: DatabaseConnection,
}

impl AccessGate {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Missing, unknown or expired tokens and inactive accounts all resolve
    /// to `Viewer::Anonymous`. Only store failures are errors.
    pub async fn authenticate(&self, token: Option<&str>) -> BlogResult<Viewer> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Viewer::Anonymous);
        };

        let Some(session) = Session::find_by_id(token.to_string()).one(&self.db).await? else {
            return Ok(Viewer::Anonymous);
        };

        if session.expires_at <= Utc::now() {
            Session::delete_by_id(session.token).exec(&self.db).await?;
            tracing::debug!(user_id = %session.user_id, "expired session dropped");
            return Ok(Viewer::Anonymous);
        }

        let Some(user) = User::find_by_id(session.user_id).one(&self.db).await? else {
            return Ok(Viewer::Anonymous);
        };
        if !user.is_active {
            return Ok(Viewer::Anonymous);
        }

        let roles = roles_of(&self.db, user.id).await?;
        Ok(Viewer::User(AuthenticatedUser {
            id: user.id,
            username: user.username,
            roles,
        }))
    }

    /// `authenticate` followed by `authorize`.
    pub async fn require(&self, token: Option<&str>, required: &[Role]) -> BlogResult<AuthenticatedUser> {
        let viewer = self.authenticate(token).await?;
        authorize(&viewer, required).cloned()
    }
}

/// Deletes every session past its expiry. Returns how many went.
pub async fn purge_expired_sessions<C: ConnectionTrait>(conn: &C) -> Result<u64, DbErr> {
    let purged = Session::delete_many()
        .filter(SessionColumn::ExpiresAt.lte(Utc::now()))
        .exec(conn)
        .await?
        .rows_affected;
    if purged > 0 {
        tracing::debug!(purged, "expired sessions purged");
    }
    Ok(purged)
}

/// Normalized, de-duplicated roles of a user.
pub(crate) async fn roles_of<C: ConnectionTrait>(conn: &C, user_id: UserId) -> Result<Vec<Role>, DbErr> {
    let role_ids: Vec<_> = UserRole::find()
        .filter(UserRoleColumn::UserId.eq(user_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|link| link.role_id)
        .collect();

    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut roles: Vec<Role> = RoleEntity::find()
        .filter(RoleColumn::Id.is_in(role_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|role| Role::parse(&role.name))
        .collect();
    roles.sort();
    roles.dedup();
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    fn user_with(roles: &[&str]) -> Viewer {
        Viewer::User(AuthenticatedUser {
            id: UserId::new(),
            username: "ana".to_string(),
            roles: roles.iter().map(|r| Role::parse(r)).collect(),
        })
    }

    #[test]
    fn roles_are_normalized() {
        assert_eq!(Role::parse("  ADMIN "), Role::Admin);
        assert_eq!(Role::parse("Editor"), Role::Editor);
        assert_eq!(Role::parse("Moderator"), Role::Other("moderator".to_string()));
        assert_eq!(Role::Other("moderator".into()).to_string(), "moderator");
    }

    #[test]
    fn roles_deserialize_from_any_case() {
        let roles: Vec<Role> = serde_json::from_str(r#"["Admin", "instructor", "Guest"]"#).unwrap();
        assert_eq!(
            roles,
            vec![Role::Admin, Role::Instructor, Role::Other("guest".into())]
        );
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
    }

    #[test]
    fn anonymous_is_unauthenticated_not_forbidden() {
        let err = authorize(&Viewer::Anonymous, ADMIN_ROLES).unwrap_err();
        assert!(matches!(err, BlogError::Unauthenticated));
    }

    #[test]
    fn missing_role_is_forbidden() {
        let viewer = user_with(&["user"]);
        let err = authorize(&viewer, ADMIN_ROLES).unwrap_err();
        assert!(matches!(err, BlogError::Forbidden(_)));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn any_matching_role_is_enough() {
        let viewer = user_with(&["user", "editor"]);
        assert!(authorize(&viewer, CONTENT_ROLES).is_ok());
        assert!(viewer.is_privileged());
        assert!(!user_with(&["student", "instructor"]).is_privileged());
        assert!(!Viewer::Anonymous.is_privileged());
    }

    #[tokio::test]
    async fn test_authenticate_resolves_session() {
        let db = test_utils::setup_test_db().await;
        let user = test_utils::create_user(&db, "ana", &["Editor"]).await;
        let token = test_utils::create_session(&db, user.id, chrono::Duration::hours(1)).await;

        let gate = AccessGate::new(db);
        let viewer = gate.authenticate(Some(&token)).await.unwrap();
        let authed = viewer.user().expect("session should resolve");
        assert_eq!(authed.id, user.id);
        assert_eq!(authed.username, "ana");
        assert_eq!(authed.roles, vec![Role::Editor]);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_missing_and_unknown_tokens() {
        let db = test_utils::setup_test_db().await;
        let gate = AccessGate::new(db);

        assert_eq!(gate.authenticate(None).await.unwrap(), Viewer::Anonymous);
        assert_eq!(gate.authenticate(Some("  ")).await.unwrap(), Viewer::Anonymous);
        assert_eq!(
            gate.authenticate(Some("no-such-token")).await.unwrap(),
            Viewer::Anonymous
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_anonymous_and_removed() {
        let db = test_utils::setup_test_db().await;
        let user = test_utils::create_user(&db, "ana", &["admin"]).await;
        let token = test_utils::create_session(&db, user.id, chrono::Duration::hours(-1)).await;

        let gate = AccessGate::new(db.clone());
        assert_eq!(gate.authenticate(Some(&token)).await.unwrap(), Viewer::Anonymous);
        assert!(Session::find_by_id(token).one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_user_is_anonymous() {
        let db = test_utils::setup_test_db().await;
        let user = test_utils::create_user(&db, "ana", &["admin"]).await;
        let token = test_utils::create_session(&db, user.id, chrono::Duration::hours(1)).await;

        let mut active: UserActiveModel = user.into();
        active.is_active = Set(false);
        active.update(&db).await.unwrap();

        let gate = AccessGate::new(db);
        assert_eq!(gate.authenticate(Some(&token)).await.unwrap(), Viewer::Anonymous);
        let err = gate.require(Some(&token), ADMIN_ROLES).await.unwrap_err();
        assert!(matches!(err, BlogError::Unauthenticated));
    }
}
