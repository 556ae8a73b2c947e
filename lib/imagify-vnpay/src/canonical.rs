//! Canonical encoding of a parameter set.
//!
//! Entries are sorted by key in byte-wise ascending order and joined as
//! `key=value` pairs separated by `&`. Keys and values use the HTML form
//! encoding: ASCII alphanumerics and `-._~` are kept as they are, space is
//! written as `+` and every other byte of the UTF-8 representation becomes
//! `%XX` with uppercase hex digits.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const FORM_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode a parameter set into its canonical string.
///
/// The input order does not matter. An empty parameter set encodes to the empty string.
pub fn encode<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut entries: Vec<(K, V)> = params.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.as_ref().as_bytes().cmp(b.as_ref().as_bytes()));

    let mut output = String::new();
    for (idx, (key, value)) in entries.iter().enumerate() {
        if idx > 0 {
            output.push('&');
        }
        push_component(&mut output, key.as_ref());
        output.push('=');
        push_component(&mut output, value.as_ref());
    }

    output
}

fn push_component(output: &mut String, component: &str) {
    for chunk in utf8_percent_encode(component, FORM_COMPONENT) {
        if chunk == "%20" {
            output.push('+');
        } else {
            output.push_str(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;

    #[test]
    fn sorted_and_joined() {
        let params = BTreeMap::from([
            ("vnp_TxnRef", "user_42_171234"),
            ("vnp_Amount", "1000000"),
        ]);

        assert_eq!(
            encode(&params),
            "vnp_Amount=1000000&vnp_TxnRef=user_42_171234"
        );
    }

    #[test]
    fn input_order_is_irrelevant() {
        let forward = encode([("a", "1"), ("b", "2")]);
        let backward = encode([("b", "2"), ("a", "1")]);
        let hashed = encode(HashMap::from([("b", "2"), ("a", "1")]));

        assert_eq!(forward, "a=1&b=2");
        assert_eq!(forward, backward);
        assert_eq!(forward, hashed);
    }

    #[test]
    fn byte_wise_key_order() {
        // uppercase sorts before lowercase, shorter prefix first
        assert_eq!(
            encode([("b", "1"), ("B", "2"), ("bb", "3")]),
            "B=2&b=1&bb=3"
        );
    }

    #[test]
    fn form_encoding_of_values() {
        let params = [
            ("vnp_OrderInfo", "Mua 100 credits"),
            ("vnp_ReturnUrl", "http://localhost:5173/payment-result"),
            ("z", "a~b*c"),
        ];

        assert_eq!(
            encode(params),
            "vnp_OrderInfo=Mua+100+credits\
             &vnp_ReturnUrl=http%3A%2F%2Flocalhost%3A5173%2Fpayment-result\
             &z=a~b%2Ac"
        );
    }

    #[test]
    fn non_ascii_is_percent_encoded_as_utf8() {
        assert_eq!(encode([("info", "Thanh toán")]), "info=Thanh+to%C3%A1n");
    }

    #[test]
    fn literal_percent_and_plus_are_escaped() {
        assert_eq!(encode([("v", "%20+")]), "v=%2520%2B");
    }

    #[test]
    fn empty_values_and_sets() {
        assert_eq!(encode([("a", ""), ("b", "x")]), "a=&b=x");
        assert_eq!(encode(Vec::<(String, String)>::new()), "");
    }
}
