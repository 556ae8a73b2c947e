//! Request signing for the VNPAY payment gateway.
//!
//! Both directions of the gateway round trip are covered: outbound payment
//! URLs are signed with [signed_query], inbound return callbacks are checked
//! with [verify_callback].

use std::collections::BTreeMap;

pub mod canonical;
pub mod signature;

pub use signature::{sign, verify};

/// Query parameter carrying the HMAC signature.
pub const SECURE_HASH: &str = "vnp_SecureHash";

/// Optional parameter naming the hash algorithm. Never part of the signed data.
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Query parameter carrying the gateway's transaction outcome.
pub const RESPONSE_CODE: &str = "vnp_ResponseCode";

/// The response code the gateway uses for a completed payment.
pub const SUCCESS_CODE: &str = "00";

/// Build the signed query string for an outbound payment request.
///
/// The result is the canonical encoding of `params` followed by the signature,
/// ready to be appended to the gateway base URL after a `?`.
pub fn signed_query(params: &BTreeMap<String, String>, secret: &[u8]) -> String {
    let canonical = canonical::encode(params);
    let signature = signature::sign_canonical(&canonical, secret);

    if canonical.is_empty() {
        format!("{SECURE_HASH}={signature}")
    } else {
        format!("{canonical}&{SECURE_HASH}={signature}")
    }
}

/// Result of checking a gateway callback.
///
/// Running the verification never fails; whether it *passed* is
/// [CallbackVerification::signature_valid].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackVerification {
    pub signature_valid: bool,

    /// The gateway response code. Only exposed when the signature is valid.
    pub response_code: Option<String>,
}

impl CallbackVerification {
    /// Whether the callback is authentic and reports a completed payment.
    pub fn is_success(&self) -> bool {
        self.signature_valid && self.response_code.as_deref() == Some(SUCCESS_CODE)
    }
}

/// Verify the full query parameter set of a gateway callback.
///
/// The signature fields are removed from `params` before verification,
/// so afterwards `params` holds exactly the signed parameter set.
pub fn verify_callback(
    params: &mut BTreeMap<String, String>,
    secret: &[u8],
) -> CallbackVerification {
    let presented = params.remove(SECURE_HASH).unwrap_or_default();
    params.remove(SECURE_HASH_TYPE);

    if presented.is_empty() || !verify(&*params, secret, &presented) {
        return CallbackVerification {
            signature_valid: false,
            response_code: None,
        };
    }

    CallbackVerification {
        signature_valid: true,
        response_code: params.get(RESPONSE_CODE).cloned(),
    }
}
