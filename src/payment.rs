//! Credit purchases through the VNPAY payment gateway.
//!
//! A purchase starts with a signed redirect to the gateway and ends when the
//! gateway redirects the user back with a signed result. The purchased
//! package travels in the transaction reference, so the callback never has to
//! guess the package from the paid amount.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use time::{
    format_description::FormatItem,
    macros::{format_description, offset},
    OffsetDateTime, UtcOffset,
};

const VNP_VERSION: &str = "2.1.0";

/// The gateway's local time, used in `vnp_CreateDate`
const GATEWAY_OFFSET: UtcOffset = offset!(+7);

const CREATE_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PackageId {
    Basic,
    Advanced,
    Business,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreditPackage {
    pub id: PackageId,
    pub credits: u64,
    pub amount_vnd: u64,
}

impl PackageId {
    pub const fn package(self) -> CreditPackage {
        let (credits, amount_vnd) = match self {
            Self::Basic => (100, 10_000),
            Self::Advanced => (500, 50_000),
            Self::Business => (5_000, 100_000),
        };

        CreditPackage {
            id: self,
            credits,
            amount_vnd,
        }
    }
}

/// Transaction reference, formatted as `{user_id}_{package}_{created}`.
///
/// Parsing splits from the right, so user IDs may contain `_`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxnRef {
    pub user_id: String,
    pub package: PackageId,
    /// Unix timestamp of the payment request
    pub created: i64,
}

impl Display for TxnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.user_id, self.package, self.created)
    }
}

impl FromStr for TxnRef {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, '_');
        let (Some(created), Some(package), Some(user_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(());
        };

        if user_id.is_empty() {
            return Err(());
        }

        Ok(Self {
            user_id: user_id.to_string(),
            package: package.parse().map_err(|_| ())?,
            created: created.parse().map_err(|_| ())?,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PaymentError {
    #[error("timestamp formatting: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// What the gateway callback means for the user's credits
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Authentic and paid: grant the package's credits.
    Approved {
        txn_ref: TxnRef,
        package: CreditPackage,
        response_code: String,
    },
    /// Authentic, but the payment did not go through. Nothing is granted.
    Declined {
        user_id: Option<String>,
        amount_vnd: u64,
        response_code: Option<String>,
    },
    /// Not acceptable as a payment result. Nothing is granted.
    Rejected {
        user_id: Option<String>,
        reason: RejectReason,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum RejectReason {
    SignatureMismatch,
    /// The reference names no known package, or the amount is not its price
    UnknownPackage,
}

pub struct VnpayGateway {
    pub tmn_code: String,
    pub hash_secret: SecretString,
    /// Payment page of the gateway
    pub url: String,
    /// Where users land after paying
    pub return_url: String,
}

impl VnpayGateway {
    /// The parameters of a payment request, before signing.
    pub fn payment_params(
        &self,
        user_id: &str,
        package: PackageId,
        ip_addr: &str,
        now: OffsetDateTime,
    ) -> Result<BTreeMap<String, String>, PaymentError> {
        let CreditPackage {
            credits,
            amount_vnd,
            ..
        } = package.package();
        let txn_ref = TxnRef {
            user_id: user_id.to_string(),
            package,
            created: now.unix_timestamp(),
        };
        let create_date = now.to_offset(GATEWAY_OFFSET).format(CREATE_DATE_FORMAT)?;

        Ok(BTreeMap::from_iter(
            [
                ("vnp_Version", VNP_VERSION.to_string()),
                ("vnp_Command", "pay".to_string()),
                ("vnp_TmnCode", self.tmn_code.clone()),
                // the gateway counts in 1/100 VND
                ("vnp_Amount", (amount_vnd * 100).to_string()),
                ("vnp_CurrCode", "VND".to_string()),
                ("vnp_TxnRef", txn_ref.to_string()),
                ("vnp_OrderInfo", format!("Mua {credits} credits")),
                ("vnp_OrderType", "other".to_string()),
                ("vnp_Locale", "vn".to_string()),
                ("vnp_ReturnUrl", self.return_url.clone()),
                ("vnp_IpAddr", ip_addr.to_string()),
                ("vnp_CreateDate", create_date),
            ]
            .map(|(key, value)| (key.to_string(), value)),
        ))
    }

    /// The gateway URL the user is sent to for paying.
    pub fn payment_url(
        &self,
        user_id: &str,
        package: PackageId,
        ip_addr: &str,
        now: OffsetDateTime,
    ) -> Result<String, PaymentError> {
        let params = self.payment_params(user_id, package, ip_addr, now)?;
        let query = imagify_vnpay::signed_query(&params, self.secret());

        Ok(format!("{}?{query}", self.url))
    }

    /// Interpret the query parameters of a gateway callback.
    pub fn process_callback(&self, mut params: BTreeMap<String, String>) -> CallbackOutcome {
        let verification = imagify_vnpay::verify_callback(&mut params, self.secret());

        let raw_txn_ref = params.get("vnp_TxnRef");
        let txn_ref = raw_txn_ref.and_then(|txn_ref| txn_ref.parse::<TxnRef>().ok());
        let user_id = txn_ref
            .as_ref()
            .map(|txn_ref| txn_ref.user_id.clone())
            .or_else(|| {
                // best effort, for logging only
                raw_txn_ref
                    .and_then(|txn_ref| txn_ref.split_once('_'))
                    .map(|(user_id, _)| user_id.to_string())
            });

        if !verification.signature_valid {
            return CallbackOutcome::Rejected {
                user_id,
                reason: RejectReason::SignatureMismatch,
            };
        }

        let amount_vnd = params
            .get("vnp_Amount")
            .and_then(|amount| amount.parse::<u64>().ok())
            .map(|amount| amount / 100)
            .unwrap_or(0);

        if !verification.is_success() {
            return CallbackOutcome::Declined {
                user_id,
                amount_vnd,
                response_code: verification.response_code,
            };
        }

        match txn_ref {
            Some(txn_ref) if txn_ref.package.package().amount_vnd == amount_vnd => {
                CallbackOutcome::Approved {
                    package: txn_ref.package.package(),
                    txn_ref,
                    response_code: imagify_vnpay::SUCCESS_CODE.to_string(),
                }
            }
            _ => CallbackOutcome::Rejected {
                user_id,
                reason: RejectReason::UnknownPackage,
            },
        }
    }

    /// Where to send the user after the callback.
    ///
    /// Rejections all look the same to the user.
    pub fn result_url(&self, outcome: &CallbackOutcome) -> String {
        let status = match outcome {
            CallbackOutcome::Approved { response_code, .. } => response_code.as_str(),
            CallbackOutcome::Declined { response_code, .. } => {
                response_code.as_deref().unwrap_or("failed")
            }
            CallbackOutcome::Rejected { .. } => "failed",
        };

        let mut url = self.return_url.clone();
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str("status=");
        url.extend(percent_encoding::utf8_percent_encode(
            status,
            percent_encoding::NON_ALPHANUMERIC,
        ));
        url
    }

    fn secret(&self) -> &[u8] {
        self.hash_secret.expose_secret().as_bytes()
    }
}
