use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::{bail, Context};
use axum::{response::IntoResponse, Json};
pub use env_config::EnvConfig;
use secrecy::SecretString;
use serde_json::json;
use tower_server::Scheme;
use tracing::{info, warn};

use authorizer::TokenAuthorizer;
use credits::{CreditLedger, InMemoryCreditLedger};
use jwks::{HttpKeySetSource, KeyResolver, KeySetCache};
use payment::VnpayGateway;

// These are public for the integration tests and benchmarks
pub mod access_token;
pub mod audit;
pub mod authorizer;
pub mod credits;
pub mod ctx;
pub mod env_config;
pub mod jwks;
pub mod openapi;
pub mod payment;

#[cfg(test)]
mod tests;

/// Common context for the whole application
#[derive(Clone)]
pub struct ImagifyCtx {
    authorizer: Arc<TokenAuthorizer>,
    gateway: Arc<VnpayGateway>,
    ledger: Arc<dyn CreditLedger>,
}

impl ImagifyCtx {
    pub fn new(
        authorizer: TokenAuthorizer,
        gateway: VnpayGateway,
        ledger: impl CreditLedger + 'static,
    ) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
            gateway: Arc::new(gateway),
            ledger: Arc::new(ledger),
        }
    }

    pub fn from_env_config(env_config: &EnvConfig) -> anyhow::Result<Self> {
        if env_config.audience.is_empty() {
            bail!("IMAGIFY_AUDIENCE is not set");
        }
        let jwks_url = env_config
            .jwks_url()
            .context("neither IMAGIFY_JWKS_URL nor IMAGIFY_USER_POOL_ID is set")?;

        info!(%jwks_url, audience = %env_config.audience, "token authorizer");

        let resolver = KeyResolver::new(
            HttpKeySetSource::new(jwks_url)?,
            Arc::new(KeySetCache::default()),
        );

        if env_config.vnpay_hash_secret.is_empty() {
            warn!("IMAGIFY_VNPAY_HASH_SECRET is not set, payment signatures are forgeable");
        }

        Ok(Self::new(
            TokenAuthorizer::new(
                resolver,
                env_config.audience.clone(),
                env_config.allowed_algorithms.clone(),
            ),
            VnpayGateway {
                tmn_code: env_config.vnpay_tmn_code.clone(),
                hash_secret: SecretString::from(env_config.vnpay_hash_secret.clone()),
                url: env_config.vnpay_url.clone(),
                return_url: env_config.vnpay_return_url.clone(),
            },
            InMemoryCreditLedger::new(env_config.initial_credits),
        ))
    }
}

pub async fn serve() -> anyhow::Result<()> {
    let env_config = EnvConfig::load()?;
    let ctx = ImagifyCtx::from_env_config(&env_config)?;
    let shutdown = tower_server::signal::termination_signal();

    let main_server = tower_server::Builder::new(SocketAddr::new(
        Ipv4Addr::UNSPECIFIED.into(),
        env_config.server_port,
    ))
    .with_scheme(Scheme::Http)
    .with_graceful_shutdown(shutdown.clone())
    .bind()
    .await?;

    info!(port = env_config.server_port, "serving API");

    tokio::spawn(main_server.serve(main_service_http_router(ctx)));

    tokio::spawn(
        tower_server::Builder::new(SocketAddr::new(
            Ipv4Addr::UNSPECIFIED.into(),
            env_config.health_port,
        ))
        .with_graceful_shutdown(shutdown.clone())
        .bind()
        .await?
        .serve(axum::Router::new().route(
            "/health/readiness",
            axum::routing::get(|| async { Json(json!({ "status": "UP" })).into_response() }),
        )),
    );

    // App is fully running, wait for it to shut down
    shutdown.cancelled().await;

    Ok(())
}

pub fn main_service_http_router(ctx: ImagifyCtx) -> axum::Router {
    axum::Router::new()
        .merge(openapi::router::router())
        .with_state(ctx)
}
