//! HS256 bearer tokens checked against the user directory.
//!
//! A token carries `sub` (user id), `username`, `iat` and `exp`. Verification
//! checks the signature and expiry, then confirms the user still exists; the
//! username returned is the directory's current one, not the token's.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parley_core::identity::IdentityService;
use parley_types::error::IdentityError;
use parley_types::identity::{Identity, UserRecord};
use parley_types::ids::UserId;
use serde::{Deserialize, Serialize};

use crate::sqlite::user::SqliteUserRepository;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtIdentityService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    users: SqliteUserRepository,
}

impl JwtIdentityService {
    pub fn new(secret: &str, ttl_secs: u64, users: SqliteUserRepository) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl_secs,
            users,
        }
    }

    pub fn users(&self) -> &SqliteUserRepository {
        &self.users
    }

    /// Mint a token for `user` valid for the configured lifetime.
    pub fn issue(&self, user: &UserRecord) -> Result<String, IdentityError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now,
            exp: now + self.ttl_secs as i64,
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, IdentityError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| IdentityError::InvalidCredential(format!("failed to sign token: {e}")))
    }

    fn decode_claims(&self, credential: &str) -> Result<Claims, IdentityError> {
        decode::<Claims>(credential, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                _ => IdentityError::InvalidCredential(e.to_string()),
            })
    }
}

impl IdentityService for JwtIdentityService {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError> {
        let claims = self.decode_claims(credential)?;
        let user_id = UserId::new(claims.sub);
        let user = self
            .users
            .find_by_id(&user_id)
            .await
            .map_err(|e| IdentityError::Lookup(e.to_string()))?
            .ok_or_else(|| IdentityError::UnknownIdentity(user_id.to_string()))?;
        Ok(user.identity())
    }
}
