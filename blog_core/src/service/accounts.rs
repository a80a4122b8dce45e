use std::{collections::HashMap, sync::Arc};

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use sea_orm::{
    sea_query::{Expr, Func},
    DatabaseConnection,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use zel_core::prelude::*;

use crate::{
    access::{self, authorize, AccessGate, Role, Viewer, ADMIN_ROLES},
    audit::{self, AuditEntry, AuditSink},
    config::{AuthConfig, ListingConfig},
    entity::prelude::*,
    error::{BlogError, BlogResult},
    ids::{RoleId, UserId},
    listing::{paginate, Page, PageRequest},
    mailer::{self, Mailer, OutgoingMail},
};

const SESSION_TOKEN_LEN: usize = 48;
const ONE_TIME_TOKEN_LEN: usize = 40;
const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_ROLES: &[(&str, &str)] = &[
    ("admin", "Full access to the platform"),
    ("editor", "Writes and publishes posts"),
    ("user", "Registered reader"),
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl UserSummary {
    fn new(user: UserModel, roles: Vec<Role>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            roles,
            created_at: user.created_at,
        }
    }
}

/// What anyone may see about an account.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicProfile {
    pub id: UserId,
    pub username: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str) -> BlogResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BlogError::Internal(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, hash: &str) -> BlogResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| BlogError::Internal(format!("stored password hash is invalid: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub(crate) fn normalize_email(raw: &str) -> BlogResult<String> {
    let email = raw.trim().to_lowercase();
    if email.contains('@') && !email.starts_with('@') && !email.ends_with('@') {
        Ok(email)
    } else {
        Err(BlogError::validation("a valid email is required"))
    }
}

fn check_password(password: &str) -> BlogResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BlogError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Role row for `name`, created on first use.
async fn ensure_role<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    description: Option<&str>,
) -> BlogResult<RoleModel> {
    let name = Role::parse(name).to_string();
    if let Some(role) = RoleEntity::find()
        .filter(RoleColumn::Name.eq(name.as_str()))
        .one(conn)
        .await?
    {
        return Ok(role);
    }

    Ok(RoleEntity::insert(RoleActiveModel {
        id: Set(RoleId::new()),
        name: Set(name),
        description: Set(description.map(str::to_string)),
    })
    .exec_with_returning(conn)
    .await?)
}

#[derive(Clone)]
pub struct AccountsService {
    db: DatabaseConnection,
    gate: AccessGate,
    auth: AuthConfig,
    admin_per_page: u64,
    mailer: Arc<dyn Mailer>,
    audit: Arc<dyn AuditSink>,
}

impl AccountsService {
    pub fn new(
        db: DatabaseConnection,
        auth: AuthConfig,
        listing: ListingConfig,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            gate: AccessGate::new(db.clone()),
            db,
            auth,
            admin_per_page: listing.admin_per_page,
            mailer,
            audit,
        }
    }

    /// Seeds admin, editor and user. Safe to run on every start.
    pub async fn ensure_default_roles(&self) -> BlogResult<()> {
        for (name, description) in DEFAULT_ROLES {
            ensure_role(&self.db, name, Some(description)).await?;
        }
        Ok(())
    }

    async fn find_user(&self, user_id: UserId) -> BlogResult<UserModel> {
        User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("user"))
    }

    async fn find_by_email(&self, email: &str) -> BlogResult<Option<UserModel>> {
        Ok(User::find()
            .filter(UserColumn::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn summary(&self, user: UserModel) -> BlogResult<UserSummary> {
        let roles = access::roles_of(&self.db, user.id).await?;
        Ok(UserSummary::new(user, roles))
    }

    async fn send_activation(&self, user: &UserModel, token: &str) {
        mailer::deliver(
            self.mailer.as_ref(),
            OutgoingMail {
                to: user.email.clone(),
                subject: "Activate your account".to_string(),
                body: format!(
                    "Hi {},\n\nUse this code to activate your account: {token}\n\nIt expires in {} hours.",
                    user.username, self.auth.activation_ttl_hours
                ),
            },
        )
        .await;
    }

    /// Creates an inactive account with the `user` role and mails its
    /// activation token.
    pub async fn _register(&self, username: &str, email: &str, password: &str) -> BlogResult<UserSummary> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BlogError::validation("username is required"));
        }
        let email = normalize_email(email)?;
        check_password(password)?;

        let taken = User::find()
            .filter(
                Condition::any()
                    .add(UserColumn::Username.eq(username))
                    .add(UserColumn::Email.eq(email.as_str())),
            )
            .one(&self.db)
            .await?;
        if let Some(existing) = taken {
            let what = if existing.email == email { "email" } else { "username" };
            return Err(BlogError::Conflict(format!("{what} is already registered")));
        }

        let password_hash = hash_password(password)?;
        let token = random_token(ONE_TIME_TOKEN_LEN);
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let user = User::insert(UserActiveModel {
            id: Set(UserId::new()),
            username: Set(username.to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            is_active: Set(false),
            activation_token: Set(Some(token.clone())),
            activation_expires_at: Set(Some(now + Duration::hours(self.auth.activation_ttl_hours))),
            reset_token: Set(None),
            reset_expires_at: Set(None),
            created_at: Set(now),
        })
        .exec_with_returning(&txn)
        .await
        .map_err(|e| BlogError::from_unique(e, "account"))?;
        let role = ensure_role(&txn, Role::User.as_str(), None).await?;
        UserRole::insert(UserRoleActiveModel {
            user_id: Set(user.id),
            role_id: Set(role.id),
        })
        .exec(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "account registered");
        self.send_activation(&user, &token).await;

        Ok(UserSummary::new(user, vec![Role::User]))
    }

    pub async fn _activate(&self, token: &str) -> BlogResult<UserSummary> {
        let user = User::find()
            .filter(UserColumn::ActivationToken.eq(token.trim()))
            .one(&self.db)
            .await?
            .ok_or_else(|| BlogError::validation("activation link is invalid"))?;

        if user.activation_expires_at.is_none_or(|at| at <= Utc::now()) {
            return Err(BlogError::validation("activation link has expired"));
        }

        let mut active: UserActiveModel = user.into();
        active.is_active = Set(true);
        active.activation_token = Set(None);
        active.activation_expires_at = Set(None);
        let user = active.update(&self.db).await?;

        tracing::info!(user_id = %user.id, "account activated");
        self.summary(user).await
    }

    pub async fn _resend_activation(&self, email: &str) -> BlogResult<()> {
        let email = normalize_email(email)?;
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or(BlogError::NotFound("account"))?;
        if user.is_active {
            return Err(BlogError::Conflict("account is already active".to_string()));
        }

        let token = random_token(ONE_TIME_TOKEN_LEN);
        let expires_at = Utc::now() + Duration::hours(self.auth.activation_ttl_hours);
        let mut active: UserActiveModel = user.into();
        active.activation_token = Set(Some(token.clone()));
        active.activation_expires_at = Set(Some(expires_at));
        let user = active.update(&self.db).await?;

        self.send_activation(&user, &token).await;
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("User", "RESEND_ACTIVATION", user.id)
                .by(user.id)
                .after(json!({ "activationExpiresAt": expires_at })),
        )
        .await;
        Ok(())
    }

    /// `login` is an email or a username.
    pub async fn _sign_in(&self, login: &str, password: &str) -> BlogResult<SessionGrant> {
        let login = login.trim();
        let user = User::find()
            .filter(
                Condition::any()
                    .add(UserColumn::Email.eq(login.to_lowercase()))
                    .add(UserColumn::Username.eq(login)),
            )
            .one(&self.db)
            .await?
            .ok_or(BlogError::Unauthenticated)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "sign-in rejected");
            return Err(BlogError::Unauthenticated);
        }
        if !user.is_active {
            return Err(BlogError::Forbidden("account is not activated".to_string()));
        }

        access::purge_expired_sessions(&self.db).await?;
        let now = Utc::now();
        let grant = SessionGrant {
            token: random_token(SESSION_TOKEN_LEN),
            expires_at: now + Duration::hours(self.auth.session_ttl_hours),
        };
        Session::insert(SessionActiveModel {
            token: Set(grant.token.clone()),
            user_id: Set(user.id),
            created_at: Set(now),
            expires_at: Set(grant.expires_at),
        })
        .exec(&self.db)
        .await?;

        tracing::info!(user_id = %user.id, "signed in");
        Ok(grant)
    }

    pub async fn _sign_out(&self, token: &str) -> BlogResult<()> {
        Session::delete_by_id(token.to_string()).exec(&self.db).await?;
        Ok(())
    }

    pub async fn _current_user(&self, viewer: &Viewer) -> BlogResult<UserSummary> {
        let me = viewer.require_user()?;
        let user = self.find_user(me.id).await?;
        self.summary(user).await
    }

    /// Public profile. The username matches regardless of ASCII case.
    pub async fn _profile(&self, username: &str) -> BlogResult<PublicProfile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BlogError::validation("username is required"));
        }
        let user = User::find()
            .filter(Expr::expr(Func::lower(Expr::col(UserColumn::Username))).eq(username.to_lowercase()))
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound("user"))?;
        let roles = access::roles_of(&self.db, user.id).await?;
        Ok(PublicProfile {
            id: user.id,
            username: user.username,
            roles,
            created_at: user.created_at,
        })
    }

    /// Unknown emails succeed without doing anything.
    pub async fn _request_password_reset(&self, email: &str) -> BlogResult<()> {
        let email = normalize_email(email)?;
        let Some(user) = self.find_by_email(&email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };

        let token = random_token(ONE_TIME_TOKEN_LEN);
        let expires_at = Utc::now() + Duration::minutes(self.auth.reset_ttl_minutes);
        let mut active: UserActiveModel = user.into();
        active.reset_token = Set(Some(token.clone()));
        active.reset_expires_at = Set(Some(expires_at));
        let user = active.update(&self.db).await?;

        mailer::deliver(
            self.mailer.as_ref(),
            OutgoingMail {
                to: user.email.clone(),
                subject: "Reset your password".to_string(),
                body: format!(
                    "Hi {},\n\nUse this code to choose a new password: {token}\n\nIt expires in {} minutes.",
                    user.username, self.auth.reset_ttl_minutes
                ),
            },
        )
        .await;
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("User", "FORGOT_PASSWORD", user.id)
                .by(user.id)
                .after(json!({ "resetExpiresAt": expires_at })),
        )
        .await;
        Ok(())
    }

    /// Consumes the reset token and signs the user out everywhere.
    pub async fn _reset_password(&self, token: &str, password: &str) -> BlogResult<()> {
        check_password(password)?;
        let user = User::find()
            .filter(UserColumn::ResetToken.eq(token.trim()))
            .one(&self.db)
            .await?
            .ok_or_else(|| BlogError::validation("reset link is invalid"))?;
        if user.reset_expires_at.is_none_or(|at| at <= Utc::now()) {
            return Err(BlogError::validation("reset link has expired"));
        }

        let password_hash = hash_password(password)?;
        let user_id = user.id;

        let txn = self.db.begin().await?;
        let mut active: UserActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.reset_token = Set(None);
        active.reset_expires_at = Set(None);
        active.update(&txn).await?;
        let revoked = Session::delete_many()
            .filter(SessionColumn::UserId.eq(user_id))
            .exec(&txn)
            .await?
            .rows_affected;
        txn.commit().await?;

        tracing::info!(%user_id, revoked, "password reset");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("User", "RESET_PASSWORD", user_id)
                .by(user_id)
                .after(json!({ "sessionsRevoked": revoked })),
        )
        .await;
        Ok(())
    }

    pub async fn _list_users(&self, viewer: &Viewer, page: PageRequest) -> BlogResult<Page<UserSummary>> {
        authorize(viewer, ADMIN_ROLES)?;
        let window = page.resolve(self.admin_per_page)?;
        let page = paginate(
            &self.db,
            User::find()
                .order_by_desc(UserColumn::CreatedAt)
                .order_by_desc(UserColumn::Id),
            window,
        )
        .await?;

        let mut roles: HashMap<UserId, Vec<Role>> = HashMap::new();
        if !page.items.is_empty() {
            let links = UserRole::find()
                .filter(UserRoleColumn::UserId.is_in(page.items.iter().map(|u| u.id)))
                .all(&self.db)
                .await?;
            let names: HashMap<RoleId, String> = RoleEntity::find()
                .all(&self.db)
                .await?
                .into_iter()
                .map(|role| (role.id, role.name))
                .collect();
            for link in links {
                if let Some(name) = names.get(&link.role_id) {
                    roles.entry(link.user_id).or_default().push(Role::parse(name));
                }
            }
        }

        Ok(page.map(|user| {
            let mut user_roles = roles.remove(&user.id).unwrap_or_default();
            user_roles.sort();
            UserSummary::new(user, user_roles)
        }))
    }

    /// Replaces the user's roles. Every role must already exist.
    pub async fn _set_roles(
        &self,
        viewer: &Viewer,
        user_id: UserId,
        roles: Vec<Role>,
    ) -> BlogResult<UserSummary> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        if admin.id == user_id && !roles.contains(&Role::Admin) {
            return Err(BlogError::validation("you cannot remove your own admin role"));
        }
        let user = self.find_user(user_id).await?;

        let names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        let found = RoleEntity::find()
            .filter(RoleColumn::Name.is_in(names.iter().cloned()))
            .all(&self.db)
            .await?;
        if let Some(missing) = names.iter().find(|name| !found.iter().any(|r| &r.name == *name)) {
            return Err(BlogError::validation(format!("unknown role `{missing}`")));
        }

        let txn = self.db.begin().await?;
        UserRole::delete_many()
            .filter(UserRoleColumn::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        if !found.is_empty() {
            UserRole::insert_many(found.iter().map(|role| UserRoleActiveModel {
                user_id: Set(user_id),
                role_id: Set(role.id),
            }))
            .exec(&txn)
            .await?;
        }
        txn.commit().await?;

        tracing::info!(%user_id, roles = ?names, admin = %admin.username, "roles updated");
        self.summary(user).await
    }

    pub async fn _set_active(&self, viewer: &Viewer, user_id: UserId, is_active: bool) -> BlogResult<UserSummary> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        if admin.id == user_id && !is_active {
            return Err(BlogError::validation("you cannot deactivate your own account"));
        }
        let user = self.find_user(user_id).await?;

        let mut active: UserActiveModel = user.into();
        active.is_active = Set(is_active);
        let user = active.update(&self.db).await?;

        tracing::info!(%user_id, is_active, admin = %admin.username, "account status changed");
        self.summary(user).await
    }

    /// Sessions, role links and engagement go with the account. Authors
    /// keep their account until their posts are deleted or hidden by an
    /// editor, so removing a user never removes published content.
    pub async fn _delete_user(&self, viewer: &Viewer, user_id: UserId) -> BlogResult<()> {
        let admin = authorize(viewer, ADMIN_ROLES)?;
        if admin.id == user_id {
            return Err(BlogError::validation("you cannot delete your own account"));
        }
        let user = self.find_user(user_id).await?;
        let authored = Post::find()
            .filter(PostColumn::AuthorId.eq(user_id))
            .count(&self.db)
            .await?;
        if authored > 0 {
            return Err(BlogError::Conflict(format!(
                "user is the author of {authored} post(s)"
            )));
        }

        User::delete_by_id(user_id).exec(&self.db).await?;
        tracing::info!(%user_id, admin = %admin.username, "account deleted");
        audit::emit(
            self.audit.as_ref(),
            AuditEntry::new("User", "DELETE", user_id)
                .by(admin.id)
                .before(json!({ "username": user.username, "email": user.email })),
        )
        .await;
        Ok(())
    }

    pub async fn _create_role(
        &self,
        viewer: &Viewer,
        name: &str,
        description: Option<String>,
    ) -> BlogResult<RoleModel> {
        authorize(viewer, ADMIN_ROLES)?;
        let name = Role::parse(name).to_string();
        if name.is_empty() {
            return Err(BlogError::validation("role name is required"));
        }

        RoleEntity::insert(RoleActiveModel {
            id: Set(RoleId::new()),
            name: Set(name),
            description: Set(description),
        })
        .exec_with_returning(&self.db)
        .await
        .map_err(|e| BlogError::from_unique(e, "role"))
    }

    pub async fn _list_roles(&self, viewer: &Viewer) -> BlogResult<Vec<RoleModel>> {
        authorize(viewer, ADMIN_ROLES)?;
        Ok(RoleEntity::find()
            .order_by_asc(RoleColumn::Name)
            .all(&self.db)
            .await?)
    }

    /// Audit entries about one user, post or other entity, oldest first.
    pub async fn _audit_trail(&self, viewer: &Viewer, entity_id: Uuid) -> BlogResult<Vec<AuditLogModel>> {
        authorize(viewer, ADMIN_ROLES)?;
        audit::entries_for(&self.db, entity_id).await
    }

    async fn viewer(&self, session: Option<String>) -> BlogResult<Viewer> {
        self.gate.authenticate(session.as_deref()).await
    }
}

#[zel_service(name = "accounts")]
trait Accounts {
    #[doc = "Create an inactive account and mail its activation code"]
    #[method(name = "register")]
    async fn register(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<UserSummary, ResourceError>;

    #[doc = "Activate an account with the mailed code"]
    #[method(name = "activate")]
    async fn activate(&self, token: String) -> Result<UserSummary, ResourceError>;

    #[doc = "Mail a fresh activation code"]
    #[method(name = "resend_activation")]
    async fn resend_activation(&self, email: String) -> Result<(), ResourceError>;

    #[doc = "Open a session with an email or username and a password"]
    #[method(name = "sign_in")]
    async fn sign_in(&self, login: String, password: String) -> Result<SessionGrant, ResourceError>;

    #[doc = "Close a session"]
    #[method(name = "sign_out")]
    async fn sign_out(&self, session: String) -> Result<(), ResourceError>;

    #[doc = "The account behind a session"]
    #[method(name = "current_user")]
    async fn current_user(&self, session: Option<String>) -> Result<UserSummary, ResourceError>;

    #[doc = "Public profile of a user by username"]
    #[method(name = "profile")]
    async fn profile(&self, username: String) -> Result<PublicProfile, ResourceError>;

    #[doc = "Mail a password reset code"]
    #[method(name = "request_password_reset")]
    async fn request_password_reset(&self, email: String) -> Result<(), ResourceError>;

    #[doc = "Choose a new password with a reset code"]
    #[method(name = "reset_password")]
    async fn reset_password(&self, token: String, password: String) -> Result<(), ResourceError>;

    #[doc = "List accounts (admin)"]
    #[method(name = "list_users")]
    async fn list_users(
        &self,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<UserSummary>, ResourceError>;

    #[doc = "Replace an account's roles (admin)"]
    #[method(name = "set_roles")]
    async fn set_roles(
        &self,
        session: Option<String>,
        user_id: UserId,
        roles: Vec<Role>,
    ) -> Result<UserSummary, ResourceError>;

    #[doc = "Activate or deactivate an account (admin)"]
    #[method(name = "set_active")]
    async fn set_active(
        &self,
        session: Option<String>,
        user_id: UserId,
        is_active: bool,
    ) -> Result<UserSummary, ResourceError>;

    #[doc = "Delete an account (admin)"]
    #[method(name = "delete_user")]
    async fn delete_user(&self, session: Option<String>, user_id: UserId) -> Result<(), ResourceError>;

    #[doc = "Create a role (admin)"]
    #[method(name = "create_role")]
    async fn create_role(
        &self,
        session: Option<String>,
        name: String,
        description: Option<String>,
    ) -> Result<RoleModel, ResourceError>;

    #[doc = "List roles (admin)"]
    #[method(name = "list_roles")]
    async fn list_roles(&self, session: Option<String>) -> Result<Vec<RoleModel>, ResourceError>;

    #[doc = "Audit entries about an entity (admin)"]
    #[method(name = "audit_trail")]
    async fn audit_trail(
        &self,
        session: Option<String>,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogModel>, ResourceError>;
}

#[async_trait]
impl AccountsServer for AccountsService {
    async fn register(
        &self,
        _ctx: RequestContext,
        username: String,
        email: String,
        password: String,
    ) -> Result<UserSummary, ResourceError> {
        Ok(self._register(&username, &email, &password).await?)
    }

    async fn activate(&self, _ctx: RequestContext, token: String) -> Result<UserSummary, ResourceError> {
        Ok(self._activate(&token).await?)
    }

    async fn resend_activation(&self, _ctx: RequestContext, email: String) -> Result<(), ResourceError> {
        Ok(self._resend_activation(&email).await?)
    }

    async fn sign_in(
        &self,
        _ctx: RequestContext,
        login: String,
        password: String,
    ) -> Result<SessionGrant, ResourceError> {
        Ok(self._sign_in(&login, &password).await?)
    }

    async fn sign_out(&self, _ctx: RequestContext, session: String) -> Result<(), ResourceError> {
        Ok(self._sign_out(&session).await?)
    }

    async fn current_user(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
    ) -> Result<UserSummary, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._current_user(&viewer).await?)
    }

    async fn profile(&self, _ctx: RequestContext, username: String) -> Result<PublicProfile, ResourceError> {
        Ok(self._profile(&username).await?)
    }

    async fn request_password_reset(&self, _ctx: RequestContext, email: String) -> Result<(), ResourceError> {
        Ok(self._request_password_reset(&email).await?)
    }

    async fn reset_password(
        &self,
        _ctx: RequestContext,
        token: String,
        password: String,
    ) -> Result<(), ResourceError> {
        Ok(self._reset_password(&token, &password).await?)
    }

    async fn list_users(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        page: PageRequest,
    ) -> Result<Page<UserSummary>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_users(&viewer, page).await?)
    }

    async fn set_roles(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        user_id: UserId,
        roles: Vec<Role>,
    ) -> Result<UserSummary, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._set_roles(&viewer, user_id, roles).await?)
    }

    async fn set_active(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        user_id: UserId,
        is_active: bool,
    ) -> Result<UserSummary, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._set_active(&viewer, user_id, is_active).await?)
    }

    async fn delete_user(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        user_id: UserId,
    ) -> Result<(), ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._delete_user(&viewer, user_id).await?)
    }

    async fn create_role(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        name: String,
        description: Option<String>,
    ) -> Result<RoleModel, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._create_role(&viewer, &name, description).await?)
    }

    async fn list_roles(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
    ) -> Result<Vec<RoleModel>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._list_roles(&viewer).await?)
    }

    async fn audit_trail(
        &self,
        _ctx: RequestContext,
        session: Option<String>,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogModel>, ResourceError> {
        let viewer = self.viewer(session).await?;
        Ok(self._audit_trail(&viewer, entity_id).await?)
    }
}
