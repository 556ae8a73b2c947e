use axum::{
    routing::{get, post},
    Router,
};

use crate::ImagifyCtx;

use super::{authorize, credits, payment};

pub fn router() -> Router<ImagifyCtx> {
    Router::new()
        .route("/api/authorize", post(authorize::authorize))
        .route("/api/credits", get(credits::get_credits))
        .route("/api/payment/vnpay", post(payment::create_vnpay_payment))
        .route("/api/payment/callback", get(payment::vnpay_callback))
}
