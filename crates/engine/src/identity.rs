//! Bearer credentials and the identity they resolve to.
//!
//! Credentials are HS256 JWTs carrying the user id as `sub`. Verification is
//! stateless: a token stays valid until its `exp`, there is no revocation
//! list.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

const MIN_SECRET_LEN: usize = 32;

/// The authenticated principal every record and request is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    user_id: Uuid,
}

impl Identity {
    /// Wrap an already-authenticated user id.
    ///
    /// Request handlers should obtain identities from a [`CredentialVerifier`]
    /// instead.
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Turns a raw bearer credential into an [`Identity`].
///
/// Every failure is reported as [`EngineError::Unauthenticated`].
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> ResultEngine<Identity>;
}

/// Issues and verifies signed credentials.
#[derive(Clone)]
pub struct JwtGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl JwtGate {
    pub fn new(secret: &str, lifetime: Duration) -> ResultEngine<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(EngineError::Credential(format!(
                "signing secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        })
    }

    /// Sign a credential for `identity`, valid for the configured lifetime.
    pub fn issue(&self, identity: &Identity) -> ResultEngine<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| EngineError::Credential(format!("failed to sign token: {err}")))
    }
}

impl CredentialVerifier for JwtGate {
    fn verify(&self, token: &str) -> ResultEngine<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token.trim(), &self.decoding, &validation).map_err(|err| {
            tracing::debug!("rejected credential: {err}");
            EngineError::Unauthenticated
        })?;
        let user_id =
            Uuid::parse_str(&data.claims.sub).map_err(|_| EngineError::Unauthenticated)?;

        Ok(Identity::new(user_id))
    }
}
