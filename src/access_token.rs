//! An access token represents a user verified by the external identity provider.
//!
//! The access token is a JSON Web Token signed with one of the keys the
//! identity provider publishes in its JWKS document.

use std::collections::BTreeMap;

use axum::RequestPartsExt;
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use http::{request::Parts, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    authorizer::{Decision, Identity},
    ctx::GetAuthorizer,
};

/// Claims in the order they are preferred as subject identifier
pub const SUBJECT_CLAIMS: &[&str] = &["username", "sub"];

/// Claims of an access token.
///
/// Only the claims the authorizer looks at are typed, the rest are kept in `other`.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct AccessTokenClaims {
    pub aud: Option<Audience>,

    /// Expiration time
    pub exp: Option<i64>,

    pub email: Option<String>,

    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl AccessTokenClaims {
    /// The subject identifier, taken from the first [SUBJECT_CLAIMS] entry that is a non-empty string.
    pub fn subject_id(&self) -> Option<&str> {
        SUBJECT_CLAIMS.iter().find_map(|claim| {
            self.other
                .get(*claim)
                .and_then(serde_json::Value::as_str)
                .filter(|value| !value.is_empty())
        })
    }
}

/// Axum extractor for a user authorized by bearer token.
///
/// Every rejection is the same opaque `401`.
pub struct AuthorizedUser(pub Identity);

#[axum::async_trait]
impl<Ctx> axum::extract::FromRequestParts<Ctx> for AuthorizedUser
where
    Ctx: GetAuthorizer + Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, ctx: &Ctx) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Unauthorized"))?;

        match ctx.get_authorizer().authorize(authorization.token()).await {
            Decision::Allow(identity) => Ok(Self(identity)),
            Decision::Deny(reason) => {
                info!(%reason, "access token denied");
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
    }
}
