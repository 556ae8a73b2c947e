use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::{header::LOCATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::{
    access_token::AuthorizedUser,
    audit,
    credits::LedgerError,
    ctx::{GetCreditLedger, GetPaymentGateway},
    payment::{CallbackOutcome, PackageId, PaymentError},
    ImagifyCtx,
};

#[derive(Debug)]
pub enum PaymentApiError {
    InvalidPackage,
    Payment(PaymentError),
    Ledger(LedgerError),
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::InvalidPackage => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid package type" })),
            )
                .into_response(),
            Self::Payment(_) | Self::Ledger(_) => {
                warn!(?self, "payment error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<PaymentError> for PaymentApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl From<LedgerError> for PaymentApiError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    package_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    payment_url: String,
}

pub async fn create_vnpay_payment(
    State(ctx): State<ImagifyCtx>,
    AuthorizedUser(identity): AuthorizedUser,
    headers: HeaderMap,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, PaymentApiError> {
    let package_id = body
        .package_type
        .parse::<PackageId>()
        .map_err(|_| PaymentApiError::InvalidPackage)?;

    let payment_url = ctx.get_payment_gateway().payment_url(
        &identity.subject_id,
        package_id,
        &client_ip(&headers),
        time::OffsetDateTime::now_utc(),
    )?;

    audit::payment_initiated(&identity.subject_id, &package_id.package());

    Ok(Json(CreatePaymentResponse { payment_url }))
}

/// The gateway sends the user back here after payment
pub async fn vnpay_callback(
    State(ctx): State<ImagifyCtx>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Response, PaymentApiError> {
    let gateway = ctx.get_payment_gateway();
    let outcome = gateway.process_callback(params);

    audit::payment_result(&outcome);

    if let CallbackOutcome::Approved {
        txn_ref, package, ..
    } = &outcome
    {
        let balance = ctx
            .get_credit_ledger()
            .grant(&txn_ref.user_id, package.credits, &txn_ref.to_string())
            .await?;

        audit::credits_added(&txn_ref.user_id, package.credits, balance);
    }

    Ok((StatusCode::FOUND, [(LOCATION, gateway.result_url(&outcome))]).into_response())
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("127.0.0.1")
        .to_string()
}
