//! Authorizer endpoint for an API gateway.
//!
//! The gateway forwards the caller's token and the ARN of the invoked method,
//! and gets back either an IAM policy allowing the invocation or a bare
//! `Unauthorized`.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    authorizer::{Decision, Identity},
    ctx::GetAuthorizer,
    ImagifyCtx,
};

pub struct Unauthorized;

impl IntoResponse for Unauthorized {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub authorization_token: String,
    pub method_arn: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    pub context: PolicyContext,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: String,
    pub effect: String,
    pub resource: String,
}

/// Passed on by the gateway to the invoked method
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PolicyContext {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

pub fn allow_policy(identity: Identity, method_arn: &str) -> PolicyResponse {
    PolicyResponse {
        principal_id: identity.subject_id.clone(),
        policy_document: PolicyDocument {
            version: "2012-10-17".to_string(),
            statement: vec![PolicyStatement {
                action: "execute-api:Invoke".to_string(),
                effect: "Allow".to_string(),
                resource: method_arn.to_string(),
            }],
        },
        context: PolicyContext {
            user_id: identity.subject_id,
            email: identity.email.unwrap_or_default(),
            token: identity.raw_credential,
        },
    }
}

pub async fn authorize(
    State(ctx): State<ImagifyCtx>,
    Json(body): Json<AuthorizeRequest>,
) -> Result<Json<PolicyResponse>, Unauthorized> {
    match ctx
        .get_authorizer()
        .authorize(&body.authorization_token)
        .await
    {
        Decision::Allow(identity) => Ok(Json(allow_policy(identity, &body.method_arn))),
        Decision::Deny(reason) => {
            info!(%reason, method_arn = %body.method_arn, "authorization denied");
            Err(Unauthorized)
        }
    }
}
