//! Business events.
//!
//! These are plain tracing events with the `imagify::audit` target, so they
//! can be filtered and shipped separately from diagnostics.

use tracing::{info, warn};

use crate::payment::{CallbackOutcome, CreditPackage};

pub fn payment_initiated(user_id: &str, package: &CreditPackage) {
    info!(
        event = "PaymentInitiated",
        user_id,
        package = %package.id,
        amount_vnd = package.amount_vnd,
        "payment initiated"
    );
}

pub fn payment_result(outcome: &CallbackOutcome) {
    match outcome {
        CallbackOutcome::Approved {
            txn_ref, package, ..
        } => info!(
            event = "PaymentSuccess",
            user_id = %txn_ref.user_id,
            package = %package.id,
            amount_vnd = package.amount_vnd,
            "payment approved"
        ),
        CallbackOutcome::Declined {
            user_id,
            amount_vnd,
            response_code,
        } => info!(
            event = "PaymentFailure",
            ?user_id,
            amount_vnd,
            ?response_code,
            "payment declined"
        ),
        CallbackOutcome::Rejected { user_id, reason } => warn!(
            event = "PaymentFailure",
            ?user_id,
            %reason,
            "payment callback rejected"
        ),
    }
}

pub fn credits_added(user_id: &str, credits: u64, balance: u64) {
    info!(
        event = "CreditsAdded",
        user_id,
        credits,
        balance,
        "credits added"
    );
}
