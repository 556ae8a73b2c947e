use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{jwk::JwkSet, Algorithm, EncodingKey, Header};
use rcgen::KeyPair;
use secrecy::SecretString;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    authorizer::TokenAuthorizer,
    jwks::{KeyResolver, KeySetCache, KeySetSource},
    payment::VnpayGateway,
};


const AUDIENCE: &str = "imagify-client";
const HASH_SECRET: &str = "s3cr3t";
const RETURN_URL: &str = "http://localhost:5173/payment-result";

/// An ES256 signing key, published under a key ID
struct SigningKey {
    kid: String,
    key_pair: KeyPair,
}

impl SigningKey {
    fn generate(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            key_pair: KeyPair::generate().unwrap(),
        }
    }

    /// The public part as a JWK
    fn jwk(&self) -> Value {
        // uncompressed point: 0x04 | x | y
        let point = self.key_pair.public_key_raw();
        let (x, y) = point[1..].split_at(32);

        json!({
            "kty": "EC",
            "crv": "P-256",
            "use": "sig",
            "kid": self.kid,
            "x": BASE64_URL_SAFE_NO_PAD.encode(x),
            "y": BASE64_URL_SAFE_NO_PAD.encode(y),
        })
    }

    fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        jsonwebtoken::encode(
            header,
            claims,
            &EncodingKey::from_ec_der(self.key_pair.serialized_der()),
        )
        .unwrap()
    }
}

fn jwk_set(keys: &[&SigningKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}

/// Claims of a valid access token at [now]
fn claims(subject: &str) -> Value {
    json!({
        "sub": subject,
        "aud": AUDIENCE,
        "email": format!("{subject}@example.com"),
        "exp": now().unix_timestamp() + 3600,
        "token_use": "id",
    })
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Serves a fixed key set from memory and counts the fetches
#[derive(Clone)]
struct StaticKeySet {
    jwk_set: JwkSet,
    fetches: Arc<AtomicUsize>,
}

impl StaticKeySet {
    fn new(keys: &[&SigningKey]) -> Self {
        Self {
            jwk_set: serde_json::from_value(jwk_set(keys)).unwrap(),
            fetches: Arc::default(),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KeySetSource for StaticKeySet {
    async fn fetch_key_set(&self) -> anyhow::Result<JwkSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.jwk_set.clone())
    }
}

/// A key set source that is down
struct UnreachableKeySet;

#[async_trait::async_trait]
impl KeySetSource for UnreachableKeySet {
    async fn fetch_key_set(&self) -> anyhow::Result<JwkSet> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

fn authorizer(source: impl KeySetSource + 'static) -> TokenAuthorizer {
    TokenAuthorizer::new(
        KeyResolver::new(source, Arc::new(KeySetCache::default())),
        AUDIENCE,
        vec![Algorithm::ES256],
    )
}

fn gateway() -> VnpayGateway {
    VnpayGateway {
        tmn_code: "IMAGIFY1".to_string(),
        hash_secret: SecretString::from(HASH_SECRET),
        url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        return_url: RETURN_URL.to_string(),
    }
}

/// Returns URL and drop guard
async fn spawn_test_server(service: axum::Router) -> (String, DropGuard) {
    let cancel = CancellationToken::new();
    let server = tower_server::Builder::new("0.0.0.0:0".parse().unwrap())
        .with_graceful_shutdown(cancel.clone())
        .bind()
        .await
        .unwrap();
    let port = server.local_addr().unwrap().port();

    tokio::spawn(server.serve(service));

    (format!("http://localhost:{port}"), cancel.drop_guard())
}
