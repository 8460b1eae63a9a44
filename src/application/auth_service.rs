use crate::domain::error::DomainError;
use crate::domain::repository::UserRepository;
use crate::domain::user::{CreateUser, LoginRequest, Role, User};
use crate::infrastructure::security::{
    DEFAULT_TOKEN_TTL_SECS, generate_token, hash_password, verify_password,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

pub struct AuthService<R: UserRepository> {
    user_repository: Arc<R>,
    jwt_secret: String,
    token_ttl_secs: u64,
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(user_repository: Arc<R>, jwt_secret: String) -> Self {
        Self {
            user_repository,
            jwt_secret,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }

    pub fn with_token_ttl(mut self, token_ttl_secs: u64) -> Self {
        self.token_ttl_secs = token_ttl_secs;
        self
    }

    /// Self-registration: unverified, no elevated roles.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register_user(&self, req: CreateUser) -> Result<User> {
        trace!("Starting user registration");
        self.create_user(req, false, vec![Role::User]).await
    }

    /// Creates the configured administrator unless that email is taken.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.user_repository.find_user_by_email(email).await? {
            if !existing.is_admin() {
                warn!(user_id = %existing.id, "Seed email belongs to a non-administrator");
            }
            return Ok(existing);
        }

        let req = CreateUser {
            email: email.to_string(),
            password: password.to_string(),
        };
        let admin = self
            .create_user(req, true, vec![Role::User, Role::Admin])
            .await?;
        info!(user_id = %admin.id, email = %admin.email, "Administrator account created");
        Ok(admin)
    }

    async fn create_user(&self, req: CreateUser, verified: bool, roles: Vec<Role>) -> Result<User> {
        let email = req.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("email", "A valid email address is required").into());
        }
        if req.password.is_empty() {
            return Err(DomainError::validation("password", "Password cannot be empty").into());
        }

        // Fast path only; the repository enforces uniqueness on save.
        if self.user_repository.find_user_by_email(&email).await?.is_some() {
            warn!(email = %email, "User already exists");
            return Err(
                DomainError::validation("email", "User with this email already exists").into(),
            );
        }

        let password_hash = hash_password(&req.password).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            DomainError::Internal(format!("Failed to hash password: {}", e))
        })?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            verified,
            roles,
        };

        debug!(user_id = %user.id, email = %user.email, "Saving user to repository");
        self.user_repository.save_user(user.clone()).await?;

        info!(user_id = %user.id, email = %user.email, "User registered successfully");
        Ok(user)
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<String> {
        trace!("Starting login");

        let user = self
            .user_repository
            .find_user_by_email(req.email.trim())
            .await?
            .ok_or_else(|| {
                warn!(email = %req.email, "User not found during login");
                DomainError::Unauthorized("Invalid email or password".to_string())
            })?;

        let is_valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            DomainError::Internal(format!("Failed to verify password: {}", e))
        })?;

        if !is_valid {
            warn!(user_id = %user.id, "Invalid password during login");
            return Err(DomainError::Unauthorized("Invalid email or password".to_string()).into());
        }

        let token = generate_token(&user.id, &self.jwt_secret, self.token_ttl_secs).map_err(|e| {
            error!(error = %e, "Failed to generate token");
            DomainError::Internal(format!("Failed to generate token: {}", e))
        })?;

        info!(user_id = %user.id, verified = user.verified, "Login successful");
        Ok(token)
    }

    /// Loads the user behind an authenticated request. Unknown ids are rejected.
    #[instrument(skip(self))]
    pub async fn current_user(&self, user_id: &str) -> Result<User> {
        self.user_repository
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = user_id, "Token refers to an unknown user");
                DomainError::Unauthorized("User no longer exists".to_string()).into()
            })
    }
}
