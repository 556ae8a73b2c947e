use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use crate::{
    access_token::AuthorizedUser,
    credits::LedgerError,
    ctx::GetCreditLedger,
    ImagifyCtx,
};

impl IntoResponse for LedgerError {
    fn into_response(self) -> axum::response::Response {
        warn!(?self, "ledger error");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    user_id: String,
    credits: u64,
    email: String,
}

pub async fn get_credits(
    State(ctx): State<ImagifyCtx>,
    AuthorizedUser(identity): AuthorizedUser,
) -> Result<Json<CreditsResponse>, LedgerError> {
    let credits = ctx
        .get_credit_ledger()
        .balance(&identity.subject_id)
        .await?;

    Ok(Json(CreditsResponse {
        user_id: identity.subject_id,
        credits,
        email: identity.email.unwrap_or_default(),
    }))
}
