use anyhow;
use async_cache;
use async_trait::async_trait;
use faststr::FastStr;
use jsonwebtoken::decode_header;
pub use jsonwebtoken::errors::Error as JwtError;
pub use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, Validation};
pub use jsonwebtoken::{DecodingKey, EncodingKey};
use jwks::Jwks;
use lazy_static::lazy_static;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror;

use super::identity::{IncomingClaims, SpacetimeIdentityClaims};
use super::JwtKeys;

#[derive(thiserror::Error, Debug)]
pub enum TokenValidationError {
    // TODO: Add real error types.

    // TODO: If we had our own errors defined we wouldn't be locked into this lib.
    #[error("Invalid token: {0}")]
    TokenError(#[from] JwtError),

    #[error("Specified key ID not found in JWKs")]
    KeyIDNotFound,

    #[error(transparent)]
    JwkError(#[from] jwks::JwkError),
    #[error(transparent)]
    JwksError(#[from] jwks::JwksError),
    // The other case is a catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// A token signer is responsible for signing tokens without doing any validation.
pub trait TokenSigner: Sync + Send {
    // Serialize the given claims and sign a JWT token with them as the payload.
    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, JwtError>;
}

impl TokenSigner for EncodingKey {
    fn sign<Token: Serialize>(&self, claims: &Token) -> Result<String, JwtError> {
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::ES256);
        jsonwebtoken::encode(&header, claims, self)
    }
}

impl TokenSigner for JwtKeys {
    fn sign<Token: Serialize>(&self, claims: &Token) -> Result<String, JwtError> {
        self.private.sign(claims)
    }
}

// A TokenValidator is responsible for validating a token and returning the claims.
// This includes looking up the public key for the issuer and verifying the signature.
// It is also responsible for enforcing the rules around the claims.
// For example, this must ensure that the issuer and sub are no longer than 128 bytes.
#[async_trait]
pub trait TokenValidator {
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError>;
}

#[async_trait]
impl<T: TokenValidator + Send + Sync> TokenValidator for Arc<T> {
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        (**self).validate_token(token).await
    }
}

pub struct UnimplementedTokenValidator;

#[async_trait]
impl TokenValidator for UnimplementedTokenValidator {
    async fn validate_token(&self, _token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        Err(TokenValidationError::Other(anyhow::anyhow!("Unimplemented")))
    }
}

// This validator accepts any tokens signed with the local key (regardless of issuer).
// If it is not signed with the local key, we will try to validate it with the OIDC validator.
// We do this because we sign short lived tokens with different issuers.
pub struct FullTokenValidator<T: TokenValidator + Send + Sync> {
    pub local_key: DecodingKey,
    pub local_issuer: String,
    pub oidc_validator: T,
}

#[async_trait]
impl<T> TokenValidator for FullTokenValidator<T>
where
    T: TokenValidator + Send + Sync,
{
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        let local_key_error = {
            let first_validator = BasicTokenValidator {
                public_key: self.local_key.clone(),
                issuer: None,
            };
            match first_validator.validate_token(token).await {
                Ok(claims) => return Ok(claims),
                Err(e) => e,
            }
        };

        // If that fails, we try the OIDC validator.
        let issuer = get_raw_issuer(token)?;
        // If we are the issuer, then we should have already validated the token.
        // TODO: "localhost" should not be hard-coded.
        if issuer == self.local_issuer {
            return Err(local_key_error);
        }
        self.oidc_validator.validate_token(token).await
    }
}

pub type DefaultValidator = FullTokenValidator<CachingOidcTokenValidator>;

pub fn new_validator(local_key: DecodingKey, local_issuer: String) -> FullTokenValidator<CachingOidcTokenValidator> {
    FullTokenValidator {
        local_key,
        local_issuer,
        oidc_validator: CachingOidcTokenValidator::get_default(),
    }
}

// This verifies against a given public key and expected issuer.
// The issuer should only be None if we are checking with a local key.
// We do that because we signed short-lived keys with different issuers.
struct BasicTokenValidator {
    pub public_key: DecodingKey,
    pub issuer: Option<String>,
}

lazy_static! {
    // Eventually we will want to add more required claims.
    static ref REQUIRED_CLAIMS: Vec<&'static str> = vec!["sub", "iss"];
}

#[async_trait]
impl TokenValidator for DecodingKey {
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::ES256);
        validation.algorithms = vec![
            jsonwebtoken::Algorithm::ES256,
            jsonwebtoken::Algorithm::RS256,
            jsonwebtoken::Algorithm::HS256,
        ];
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);

        // TODO: We should require a specific audience at some point.
        validation.validate_aud = false;

        let data = decode::<IncomingClaims>(token, self, &validation)?;
        let claims = data.claims;
        claims.try_into().map_err(TokenValidationError::Other)
    }
}

#[async_trait]
impl TokenValidator for BasicTokenValidator {
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        // This validates everything but the issuer.
        let claims = self.public_key.validate_token(token).await?;
        if let Some(expected_issuer) = &self.issuer {
            if claims.issuer != *expected_issuer {
                return Err(TokenValidationError::Other(anyhow::anyhow!(
                    "Issuer mismatch: got {:?}, expected {:?}",
                    claims.issuer,
                    expected_issuer
                )));
            }
        }
        Ok(claims)
    }
}

// Validates tokens by looking up public keys and caching them.
pub struct CachingOidcTokenValidator {
    cache: async_cache::AsyncCache<Arc<JwksValidator>, KeyFetcher>,
}

impl CachingOidcTokenValidator {
    pub fn new(refresh_duration: Duration, expiry: Option<Duration>) -> Self {
        let cache = async_cache::Options::new(refresh_duration, KeyFetcher)
            .with_expire(expiry)
            .build();
        CachingOidcTokenValidator { cache }
    }

    pub fn get_default() -> Self {
        Self::new(Duration::from_secs(300), Some(Duration::from_secs(7200)))
    }
}

// Jwks fetcher for the async cache.
struct KeyFetcher;

impl async_cache::Fetcher<Arc<JwksValidator>> for KeyFetcher {
    type Error = TokenValidationError;

    async fn fetch(&self, key: FastStr) -> Result<Arc<JwksValidator>, Self::Error> {
        // TODO: Make this stored in the struct so we don't need to keep creating it.
        let raw_issuer = key.to_string();
        log::info!("Fetching key for issuer {}", raw_issuer.clone());
        let oidc_url = format!("{}/.well-known/openid-configuration", raw_issuer.trim_end_matches('/'));
        let key_or_error = Jwks::from_oidc_url(oidc_url).await;
        // TODO: We should probably add debouncing to avoid spamming the logs.
        // Alternatively we could add a backoff before retrying.
        if let Err(e) = &key_or_error {
            log::warn!("Error fetching public key for issuer {raw_issuer}: {e:?}");
        }
        let keys = key_or_error?;
        let validator = JwksValidator {
            issuer: raw_issuer.clone(),
            keyset: keys,
        };
        Ok(Arc::new(validator))
    }
}

#[async_trait]
impl TokenValidator for CachingOidcTokenValidator {
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        let raw_issuer = get_raw_issuer(token)?;
        log::debug!("Getting validator for issuer {}", raw_issuer.clone());
        let validator = self
            .cache
            .get(raw_issuer.clone().into())
            .await
            .ok_or_else(|| anyhow::anyhow!("Error fetching public key for issuer {raw_issuer}"))?;
        validator.validate_token(token).await
    }
}

// This is a token validator that uses OIDC to validate tokens.
// This will look up the public key for the issuer and validate against that key.
// This currently has no caching.
pub struct OidcTokenValidator;

// Get the issuer out of a token without validating the signature.
fn get_raw_issuer(token: &str) -> Result<String, TokenValidationError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::ES256);
    validation.set_required_spec_claims(&REQUIRED_CLAIMS);
    validation.validate_aud = false;
    // We are disabling signature validation, because we need to get the issuer before we can validate.
    validation.insecure_disable_signature_validation();
    let data = decode::<IncomingClaims>(token, &DecodingKey::from_secret(b"fake"), &validation)?;
    Ok(data.claims.issuer)
}

#[async_trait]
impl TokenValidator for OidcTokenValidator {
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        // TODO: Make this stored in the struct so we don't need to keep creating it.
        let raw_issuer = get_raw_issuer(token)?;
        let oidc_url = format!("{}/.well-known/openid-configuration", raw_issuer.trim_end_matches('/'));
        log::debug!("Fetching key for issuer {}", raw_issuer.clone());
        let key_or_error = Jwks::from_oidc_url(oidc_url).await;
        // TODO: We should probably add debouncing to avoid spamming the logs.
        // Alternatively we could add a backoff before retrying.
        if let Err(e) = &key_or_error {
            log::warn!("Error fetching public key for issuer {raw_issuer}: {e:?}");
        }
        let keys = key_or_error?;
        let validator = JwksValidator {
            issuer: raw_issuer,
            keyset: keys,
        };
        validator.validate_token(token).await
    }
}

struct JwksValidator {
    pub issuer: String,
    pub keyset: Jwks,
}

#[async_trait]
impl TokenValidator for JwksValidator {
    async fn validate_token(&self, token: &str) -> Result<SpacetimeIdentityClaims, TokenValidationError> {
        let header = decode_header(token)?;
        if let Some(kid) = header.kid {
            let key = self
                .keyset
                .keys
                .get(&kid)
                .ok_or_else(|| TokenValidationError::KeyIDNotFound)?;
            let validator = BasicTokenValidator {
                public_key: key.decoding_key.clone(),
                issuer: Some(self.issuer.clone()),
            };
            return validator.validate_token(token).await;
        }
        log::debug!("No key id in header. Trying all keys.");
        // TODO: Consider returning an error if no kid is given?
        // For now, lets just try all the keys.
        let mut last_error = TokenValidationError::Other(anyhow::anyhow!("No kid found"));
        for (kid, key) in &self.keyset.keys {
            log::debug!("Trying key {kid}");
            let validator = BasicTokenValidator {
                public_key: key.decoding_key.clone(),
                issuer: Some(self.issuer.clone()),
            };
            match validator.validate_token(token).await {
                Ok(claims) => return Ok(claims),
                Err(e) => {
                    last_error = e;
                    log::debug!("Validating with key {kid} failed");
                    continue;
                }
            }
        }
        // None of the keys worked.
        Err(last_error)
    }
}
