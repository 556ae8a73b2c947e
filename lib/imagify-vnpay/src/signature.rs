//! HMAC-SHA512 signatures over canonically encoded parameter sets.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::canonical;

type HmacSha512 = Hmac<Sha512>;

/// Sign a parameter set, returning the lowercase hex digest.
pub fn sign<I, K, V>(params: I, secret: &[u8]) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    sign_canonical(&canonical::encode(params), secret)
}

/// Verify a presented signature against a parameter set.
///
/// The comparison runs in constant time. Anything that is not the hex
/// encoding of the exact digest is rejected.
pub fn verify<I, K, V>(params: I, secret: &[u8], presented: &str) -> bool
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let Ok(presented) = hex::decode(presented) else {
        return false;
    };

    keyed_mac(&canonical::encode(params), secret)
        .verify_slice(&presented)
        .is_ok()
}

pub(crate) fn sign_canonical(canonical: &str, secret: &[u8]) -> String {
    hex::encode(keyed_mac(canonical, secret).finalize().into_bytes())
}

fn keyed_mac(canonical: &str, secret: &[u8]) -> HmacSha512 {
    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    mac
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    const SCENARIO_SIGNATURE: &str = "919a690766e3b43f7dcd4af84c19b1aa1b13c55d6e468ae05ee0dac97b02af2e\
                                      76e2cab96a603ee7941e51c9a54ebe78792b54b2a5ea7d126dbfbdfae9682b19";

    fn scenario() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("vnp_Amount".to_string(), "1000000".to_string()),
            ("vnp_TxnRef".to_string(), "user_42_171234".to_string()),
        ])
    }

    #[test]
    fn known_vector() {
        assert_eq!(sign(&scenario(), b"s3cr3t"), SCENARIO_SIGNATURE);
        assert!(verify(&scenario(), b"s3cr3t", SCENARIO_SIGNATURE));
    }

    #[test]
    fn empty_parameter_set_signs_the_empty_message() {
        let empty: BTreeMap<String, String> = BTreeMap::new();
        let signature = sign(&empty, b"s3cr3t");

        assert_eq!(
            signature,
            "e13c8f10feec245ceea08d132d8b129984a2168a82d066f240bbadca3c22768d\
             af38ccf99fa9259e61ac6b66785947e3f784c5d1e0c5c068b4c3b352a2e670fe"
        );
        assert!(verify(&empty, b"s3cr3t", &signature));
    }

    #[test]
    fn round_trip_for_arbitrary_sets() {
        let sets = [
            vec![("a", "")],
            vec![("vnp_OrderInfo", "Mua 500 credits"), ("vnp_Locale", "vn")],
            vec![("ü", "ö ä"), ("x", "&=+%")],
        ];

        let long_secret = [7u8; 200];
        let secrets: [&[u8]; 3] = [b"", b"k", &long_secret];

        for params in sets {
            for secret in secrets {
                let signature = sign(params.clone(), secret);
                assert!(verify(params.clone(), secret, &signature));
            }
        }
    }

    #[test]
    fn any_changed_value_breaks_the_signature() {
        let params = scenario();
        let signature = sign(&params, b"s3cr3t");

        for key in params.keys() {
            let mut tampered = params.clone();
            tampered.get_mut(key).unwrap().push('0');
            assert!(!verify(&tampered, b"s3cr3t", &signature), "{key}");
        }
    }

    #[test]
    fn added_or_removed_parameters_break_the_signature() {
        let params = scenario();
        let signature = sign(&params, b"s3cr3t");

        let mut added = params.clone();
        added.insert("vnp_BankCode".to_string(), "NCB".to_string());
        assert!(!verify(&added, b"s3cr3t", &signature));

        let mut removed = params.clone();
        removed.remove("vnp_Amount");
        assert!(!verify(&removed, b"s3cr3t", &signature));
    }

    #[test]
    fn wrong_secret_or_malformed_signature() {
        let params = scenario();

        assert!(!verify(&params, b"s3cr3T", SCENARIO_SIGNATURE));
        assert!(!verify(&params, b"s3cr3t", ""));
        assert!(!verify(&params, b"s3cr3t", "not hex"));
        assert!(!verify(&params, b"s3cr3t", &SCENARIO_SIGNATURE[..64]));
        assert!(!verify(&params, b"s3cr3t", &format!("{SCENARIO_SIGNATURE}00")));
    }

    #[test]
    fn single_flipped_digit_is_rejected() {
        let params = scenario();
        let mut flipped = SCENARIO_SIGNATURE.to_string().into_bytes();
        flipped[17] = if flipped[17] == b'0' { b'1' } else { b'0' };

        assert!(!verify(
            &params,
            b"s3cr3t",
            std::str::from_utf8(&flipped).unwrap()
        ));
    }
}
