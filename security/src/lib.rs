// security/src/lib.rs

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const TOKEN_TTL_SECS: u64 = 60 * 60 * 24;

/// Login data transfer object (DTO).
#[derive(Debug, Deserialize, Serialize)]
pub struct AdminLogin {
    pub username: String,
    pub password: String,
}

/// The single fixed admin identity. Credentials are injected from
/// configuration; nothing in the core services ever sees them.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Claims for JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (username)
    pub role: String,
    pub iat: u64, // Issued at
    pub exp: u64, // Expiration time
}

/// Custom authentication errors.
#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    MissingToken,
    TokenInvalid(String),
    TokenCreation(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::MissingToken => write!(f, "No authentication token, access denied"),
            AuthError::TokenInvalid(_) => write!(f, "Token is invalid"),
            AuthError::TokenCreation(msg) => write!(f, "Failed to create token: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Issues and validates tokens for the fixed admin identity.
#[derive(Clone)]
pub struct Authenticator {
    credentials: AdminCredentials,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Authenticator {
    pub fn new(credentials: AdminCredentials, secret: &[u8]) -> Self {
        Authenticator {
            credentials,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Checks the supplied credentials against the fixed pair and returns
    /// a signed token on success.
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        if username != self.credentials.username || password != self.credentials.password {
            return Err(AuthError::InvalidCredentials);
        }
        self.issue_token()
    }

    pub fn issue_token(&self) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::TokenCreation(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: self.credentials.username.clone(),
            role: "admin".to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenCreation(format!("Failed to encode JWT: {}", e)))
    }

    /// Decodes and validates a JWT token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(
            AdminCredentials {
                username: "admin".to_string(),
                password: "admin123".to_string(),
            },
            b"test-secret-key-of-reasonable-length",
        )
    }

    #[test]
    fn should_round_trip_token_for_valid_credentials() {
        let auth = authenticator();
        let token = auth.login("admin", "admin123").unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn should_reject_wrong_credentials() {
        let auth = authenticator();
        assert!(matches!(
            auth.login("admin", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("root", "admin123"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn should_reject_garbage_token() {
        let auth = authenticator();
        assert!(matches!(
            auth.validate_token("not.a.token"),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn should_reject_token_signed_with_other_secret() {
        let auth = authenticator();
        let other = Authenticator::new(
            AdminCredentials {
                username: "admin".to_string(),
                password: "admin123".to_string(),
            },
            b"a-completely-different-signing-secret",
        );
        let token = other.issue_token().unwrap();
        assert!(auth.validate_token(&token).is_err());
    }
}
