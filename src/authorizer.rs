//! Bearer token authorization.
//!
//! A credential goes through parsing, key resolution, signature verification
//! and claim validation, in that order. Failing any step is a [Decision::Deny]
//! carrying the step's [DenyReason]; passing all of them is a
//! [Decision::Allow] with the identity found in the claims.

use std::collections::HashSet;

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, Validation};
use time::OffsetDateTime;
use tracing::debug;

use crate::{access_token::AccessTokenClaims, jwks::KeyResolver};

/// The identity of an authorized user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub email: Option<String>,

    /// The credential as presented, without `Bearer ` prefix.
    /// Needed for passing the user's authentication on to other services.
    pub raw_credential: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allow(Identity),
    Deny(DenyReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum DenyReason {
    MalformedCredential,
    KeyResolutionFailed,
    BadSignature,
    ClaimRejected,
}

pub struct TokenAuthorizer {
    resolver: KeyResolver,
    audience: String,
    allowed_algorithms: Vec<Algorithm>,
}

impl TokenAuthorizer {
    pub fn new(
        resolver: KeyResolver,
        audience: impl Into<String>,
        allowed_algorithms: Vec<Algorithm>,
    ) -> Self {
        Self {
            resolver,
            audience: audience.into(),
            allowed_algorithms,
        }
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    pub async fn authorize(&self, credential: &str) -> Decision {
        self.authorize_at(credential, OffsetDateTime::now_utc())
            .await
    }

    /// Authorize relative to the given point in time.
    pub async fn authorize_at(&self, credential: &str, now: OffsetDateTime) -> Decision {
        match self.verify(credential, now).await {
            Ok(identity) => Decision::Allow(identity),
            Err(reason) => Decision::Deny(reason),
        }
    }

    async fn verify(&self, credential: &str, now: OffsetDateTime) -> Result<Identity, DenyReason> {
        let token = credential.strip_prefix("Bearer ").unwrap_or(credential);

        let header = parse(token)?;

        let kid = header.kid.as_deref().ok_or_else(|| {
            debug!("credential has no key ID");
            DenyReason::KeyResolutionFailed
        })?;
        let key = self.resolver.resolve(kid).await.map_err(|err| {
            debug!(?err, "key resolution failed");
            DenyReason::KeyResolutionFailed
        })?;

        if !self.allowed_algorithms.contains(&header.alg) {
            debug!(alg = ?header.alg, "algorithm not allowed");
            return Err(DenyReason::BadSignature);
        }

        // Claims are checked below with an explicit clock, so only the signature is validated here
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let claims = jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
            .map_err(|err| {
                debug!(?err, "signature verification failed");
                DenyReason::BadSignature
            })?
            .claims;

        if !claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(&self.audience))
        {
            debug!(aud = ?claims.aud, "audience rejected");
            return Err(DenyReason::ClaimRejected);
        }

        if let Some(exp) = claims.exp {
            if now.unix_timestamp() >= exp {
                debug!(exp, "credential expired");
                return Err(DenyReason::ClaimRejected);
            }
        }

        let subject_id = claims
            .subject_id()
            .ok_or_else(|| {
                debug!("credential has no subject");
                DenyReason::ClaimRejected
            })?
            .to_string();

        Ok(Identity {
            subject_id,
            email: claims.email,
            raw_credential: token.to_string(),
        })
    }
}

/// Check the structure of a credential: three segments, a readable header
/// and a payload holding a JSON claims object.
///
/// The signature segment is left to signature verification, so that any
/// damage to it is reported as a bad signature.
fn parse(token: &str) -> Result<jsonwebtoken::Header, DenyReason> {
    let malformed = |err: &dyn std::fmt::Debug| {
        debug!(?err, "malformed credential");
        DenyReason::MalformedCredential
    };

    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(malformed(&"not three segments"));
    };

    if signature.is_empty() {
        return Err(malformed(&"unsigned"));
    }

    let header = jsonwebtoken::decode_header(token).map_err(|err| malformed(&err))?;

    let payload = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|err| malformed(&err))?;
    serde_json::from_slice::<AccessTokenClaims>(&payload).map_err(|err| malformed(&err))?;

    Ok(header)
}
