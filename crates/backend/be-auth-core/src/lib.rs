use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

pub use auth_core::{Claims, Role, TokenType};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token type: expected {expected:?} token")]
    WrongType { expected: TokenType },

    #[error("Token generation failed: {0}")]
    Generation(String),
}

/// Access and refresh tokens of one login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_encoding_key: EncodingKey,
    pub access_token_decoding_key: DecodingKey,

    pub refresh_token_encoding_key: EncodingKey,
    pub refresh_token_decoding_key: DecodingKey,

    pub access_token_expiry: Duration,
    pub refresh_token_expiry: Duration,

    pub validation: Validation,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    pub const DEFAULT_ACCESS_EXPIRY_MINUTES: i64 = 60;
    pub const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

    /// Builds an HS256 configuration with one secret per token type.
    pub fn from_secrets(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_token_encoding_key: EncodingKey::from_secret(access_secret),
            access_token_decoding_key: DecodingKey::from_secret(access_secret),
            refresh_token_encoding_key: EncodingKey::from_secret(refresh_secret),
            refresh_token_decoding_key: DecodingKey::from_secret(refresh_secret),

            access_token_expiry: Duration::minutes(Self::DEFAULT_ACCESS_EXPIRY_MINUTES),
            refresh_token_expiry: Duration::days(Self::DEFAULT_REFRESH_EXPIRY_DAYS),

            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn with_expiry(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_token_expiry = access;
        self.refresh_token_expiry = refresh;
        self
    }

    pub fn issue_access_token(
        &self,
        subject: &str,
        email: &str,
        role: Role,
    ) -> Result<String, TokenError> {
        self.issue(subject, email, role, TokenType::Access)
    }

    pub fn issue_token_pair(
        &self,
        subject: &str,
        email: &str,
        role: Role,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(subject, email, role, TokenType::Access)?,
            refresh_token: self.issue(subject, email, role, TokenType::Refresh)?,
        })
    }

    fn issue(
        &self,
        subject: &str,
        email: &str,
        role: Role,
        token_type: TokenType,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let (expiry, key) = match token_type {
            TokenType::Access => (self.access_token_expiry, &self.access_token_encoding_key),
            TokenType::Refresh => (self.refresh_token_expiry, &self.refresh_token_encoding_key),
        };

        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            role,
            exp: (now + expiry).timestamp(),
            iat: now.timestamp(),
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.access_token_decoding_key, &self.validation)?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(TokenError::WrongType {
                expected: TokenType::Access,
            });
        }

        Ok(token_data.claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data =
            decode::<Claims>(token, &self.refresh_token_decoding_key, &self.validation)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(TokenError::WrongType {
                expected: TokenType::Refresh,
            });
        }

        Ok(token_data.claims)
    }
}
