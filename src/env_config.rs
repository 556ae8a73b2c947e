use figment::{
    providers::{Env, Serialized},
    Figment,
};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct EnvConfig {
    /// Port of the main API server
    pub server_port: u16,

    /// Port of the plain http health endpoint
    pub health_port: u16,

    /// Region of the identity provider
    pub region: String,

    /// Identity provider user pool, used to derive the JWKS location.
    pub user_pool_id: Option<String>,

    /// Explicit JWKS location, takes precedence over `user_pool_id`.
    pub jwks_url: Option<String>,

    /// Expected `aud` claim of access tokens (the user pool client ID)
    pub audience: String,

    /// JWS algorithms accepted on access tokens
    pub allowed_algorithms: Vec<Algorithm>,

    pub vnpay_tmn_code: String,
    pub vnpay_hash_secret: String,
    pub vnpay_url: String,
    pub vnpay_return_url: String,

    /// Credits of a user the ledger has not seen before
    pub initial_credits: u64,
}

impl EnvConfig {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("IMAGIFY_"))
            .extract()?)
    }

    /// The well-known JWKS location of the configured identity provider
    pub fn jwks_url(&self) -> Option<String> {
        if let Some(url) = &self.jwks_url {
            return Some(url.clone());
        }

        let user_pool_id = self.user_pool_id.as_deref()?;
        let region = &self.region;

        Some(format!(
            "https://cognito-idp.{region}.amazonaws.com/{user_pool_id}/.well-known/jwks.json"
        ))
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            health_port: 5555,

            region: "ap-southeast-1".to_string(),
            user_pool_id: None,
            jwks_url: None,
            audience: String::new(),
            allowed_algorithms: vec![Algorithm::RS256],

            vnpay_tmn_code: String::new(),
            vnpay_hash_secret: String::new(),
            vnpay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            vnpay_return_url: "http://localhost:5173/payment-result".to_string(),

            initial_credits: 10,
        }
    }
}
