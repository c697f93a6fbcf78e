use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use be_authz::{JwtConfig, RateLimit, RateLimitPolicy, Role, TokenPair};
use be_remote_db::{NewUser, SharedStore, User};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::types::{LoginRequest, RegisterRequest};

const MIN_PASSWORD_LEN: usize = 8;

pub struct AuthService {
    store: SharedStore,
    jwt_config: Arc<JwtConfig>,
    config: AuthConfig,
    pub(crate) rate_limit: RateLimit,
}

impl AuthService {
    pub fn new(store: SharedStore, jwt_config: Arc<JwtConfig>, config: AuthConfig) -> Self {
        Self {
            store,
            jwt_config,
            config,
            rate_limit: RateLimit::new(RateLimitPolicy::AUTH),
        }
    }

    /// Replaces the default auth rate limit.
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = RateLimit::new(policy);
        self
    }

    pub fn rate_limit(&self) -> &RateLimit {
        &self.rate_limit
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub async fn register(&self, role: &str, request: RegisterRequest) -> Result<User, AuthError> {
        let role: Role = role
            .parse()
            .map_err(|_| AuthError::InvalidRole(role.to_string()))?;

        if role == Role::Admin && !self.config.allow_admin_registration {
            warn!(email = %request.email, "Refused admin self-registration");
            return Err(AuthError::AdminRegistrationDisabled);
        }

        let name = request.name.trim();
        let email = request.email.trim().to_lowercase();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("Name is required"));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("A valid email is required"));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(
                "Password must be at least 8 characters",
            ));
        }

        let password_hash = self.hash_password(&request.password)?;
        let user = self
            .store
            .create_user(
                NewUser::builder()
                    .name(name)
                    .email(email)
                    .role(role)
                    .password_hash(password_hash)
                    .build(),
            )
            .await
            .map_err(|e| {
                if e.is_duplicate() {
                    AuthError::EmailExists
                } else {
                    AuthError::Database(e)
                }
            })?;

        info!(user_id = %user.id, role = %user.role, "Registered user");
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<(User, TokenPair), AuthError> {
        let user = match self.store.get_user_by_email(request.email.trim()).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !self.verify_password(&request.password, &user.password_hash)? {
            let attempts = self.store.record_failed_login(user.id).await?;
            warn!(user_id = %user.id, attempts, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        let now = Utc::now();
        self.store.record_successful_login(user.id, now).await?;
        let tokens =
            self.jwt_config
                .issue_token_pair(&user.id.to_string(), &user.email, user.role)?;

        info!(user_id = %user.id, "User logged in");
        let user = User {
            failed_login_attempts: 0,
            last_login: Some(now),
            ..user
        };
        Ok((user, tokens))
    }

    /// Issues a fresh access token for a valid refresh token whose user still
    /// exists and is active.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self
            .jwt_config
            .validate_refresh_token(refresh_token)
            .map_err(|e| {
                warn!(error = %e, "Rejected refresh token");
                AuthError::InvalidRefreshToken
            })?;

        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidRefreshToken)?;
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(AuthError::InvalidRefreshToken),
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        Ok(self
            .jwt_config
            .issue_access_token(&user.id.to_string(), &user.email, user.role)?)
    }
}
