//! Accounts: registration, login, admin review and session resolution.

use std::sync::Arc;

use chrono::Utc;
use fl_core::{AccountStatus, Actor, AppError, AuthProvider, Result, Role, User, UserRepo};
use tracing::info;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Credentials and captcha response from the login form.
#[derive(Debug, Clone)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub captcha_answer: &'a str,
    pub captcha_token: &'a str,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepo>,
    auth: Arc<dyn AuthProvider>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepo>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { users, auth }
    }

    async fn get_user(&self, id: Uuid) -> Result<User> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("user", id))
    }

    /// Maps a user id from a verified session to an actor. Only active
    /// accounts act.
    pub async fn resolve_actor(&self, user_id: Uuid) -> Result<Actor> {
        match self.users.get_user(user_id).await? {
            Some(user) if user.status == AccountStatus::Active => Ok(Actor::from(&user)),
            _ => Err(AppError::Unauthorized("unknown session".into())),
        }
    }

    /// Resolves the raw session cookie value.
    pub async fn session_actor(&self, token: Option<&str>) -> Result<Actor> {
        let user_id = token
            .and_then(|t| self.auth.resolve_session(t))
            .ok_or_else(|| AppError::Unauthorized("login required".into()))?;
        self.resolve_actor(user_id).await
    }

    /// Creates a USER account awaiting admin approval.
    pub async fn register(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::invalid("valid email required"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::invalid(format!("password must be at least {MIN_PASSWORD_LEN} characters")));
        }
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(format!("{email} is already registered")));
        }

        let user = User {
            id: Uuid::now_v7(),
            email,
            password_hash: self.auth.hash_password(password)?,
            role: Role::User,
            status: AccountStatus::Pending,
            created_at: Utc::now(),
        };
        self.users.create_user(user.clone()).await?;
        info!(user = %user.id, "account registered");
        Ok(user)
    }

    /// Verifies captcha and credentials; returns the user and a session token.
    pub async fn login(&self, req: LoginRequest<'_>) -> Result<(User, String)> {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() || req.password.trim().is_empty() {
            return Err(AppError::invalid("invalid credentials"));
        }
        if !self.auth.verify_captcha(req.captcha_answer, req.captcha_token) {
            return Err(AppError::invalid("invalid captcha"));
        }

        let user = match self.users.find_user_by_email(&email).await? {
            Some(user) if self.auth.verify_password(req.password, &user.password_hash) => user,
            _ => return Err(AppError::Unauthorized("invalid credentials".into())),
        };
        match user.status {
            AccountStatus::Pending => return Err(AppError::forbidden("PENDING_APPROVAL")),
            AccountStatus::Rejected => return Err(AppError::forbidden("ACCOUNT_REJECTED")),
            AccountStatus::Active => {}
        }

        let token = self.auth.issue_session(user.id);
        info!(user = %user.id, "login");
        Ok((user, token))
    }

    /// Approves or rejects a pending registration.
    pub async fn review_registration(&self, actor: &Actor, target: Uuid, approve: bool) -> Result<User> {
        if actor.role != Role::Admin {
            return Err(AppError::forbidden("admins only"));
        }
        let mut user = self.get_user(target).await?;
        if user.status != AccountStatus::Pending {
            return Err(AppError::invalid("user is not pending"));
        }
        let status = if approve { AccountStatus::Active } else { AccountStatus::Rejected };
        self.users.set_user_status(user.id, status).await?;
        info!(admin = %actor.id, user = %user.id, status = status.as_str(), "registration reviewed");
        user.status = status;
        Ok(user)
    }

    pub async fn change_role(&self, actor: &Actor, target: Uuid, role: Role) -> Result<User> {
        if actor.role != Role::Admin {
            return Err(AppError::forbidden("admins only"));
        }
        let mut user = self.get_user(target).await?;
        self.users.set_user_role(user.id, role).await?;
        info!(admin = %actor.id, user = %user.id, %role, "role changed");
        user.role = role;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_core::{MockAuthProvider, MockUserRepo};

    fn user(status: AccountStatus) -> User {
        User {
            id: Uuid::now_v7(),
            email: "staff@example.com".into(),
            password_hash: "hash".into(),
            role: Role::Staff,
            status,
            created_at: Utc::now(),
        }
    }

    fn login_req() -> LoginRequest<'static> {
        LoginRequest {
            email: "Staff@Example.com ",
            password: "password123",
            captcha_answer: "7",
            captcha_token: "salt:digest",
        }
    }

    #[tokio::test]
    async fn pending_account_cannot_log_in() {
        let pending = user(AccountStatus::Pending);
        let mut users = MockUserRepo::new();
        users
            .expect_find_user_by_email()
            .withf(|email| email == "staff@example.com")
            .returning(move |_| Ok(Some(pending.clone())));
        let mut auth = MockAuthProvider::new();
        auth.expect_verify_captcha().returning(|_, _| true);
        auth.expect_verify_password().returning(|_, _| true);
        auth.expect_issue_session().never();

        let svc = AccountService::new(Arc::new(users), Arc::new(auth));
        let err = svc.login(login_req()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg == "PENDING_APPROVAL"));
    }

    #[tokio::test]
    async fn wrong_captcha_short_circuits() {
        let mut users = MockUserRepo::new();
        users.expect_find_user_by_email().never();
        let mut auth = MockAuthProvider::new();
        auth.expect_verify_captcha().returning(|_, _| false);

        let svc = AccountService::new(Arc::new(users), Arc::new(auth));
        assert!(matches!(svc.login(login_req()).await, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let existing = user(AccountStatus::Active);
        let mut users = MockUserRepo::new();
        users.expect_find_user_by_email().returning(move |_| Ok(Some(existing.clone())));
        users.expect_create_user().never();
        let svc = AccountService::new(Arc::new(users), Arc::new(MockAuthProvider::new()));
        assert!(matches!(
            svc.register("staff@example.com", "password123").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn forged_session_is_unauthorized() {
        let mut auth = MockAuthProvider::new();
        auth.expect_resolve_session().returning(|_| None);
        let svc = AccountService::new(Arc::new(MockUserRepo::new()), Arc::new(auth));
        assert!(matches!(
            svc.session_actor(Some("forged")).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(svc.session_actor(None).await, Err(AppError::Unauthorized(_))));
    }
}
