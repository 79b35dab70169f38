use std::{env, str::FromStr, time::Duration};

use log::*;
use lps_common::Secret;
use rand::{distributions::Alphanumeric, Rng};

use crate::workers::SyncConfig;

const DEFAULT_LPS_HOST: &str = "127.0.0.1";
const DEFAULT_LPS_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty_store.db";
const DEFAULT_ACCRUAL_URL: &str = "http://127.0.0.1:8080";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Base URL of the external accrual-computation service.
    pub accrual_url: String,
    pub auth: AuthConfig,
    /// Tuning for the order-status synchronization pipeline.
    pub sync: SyncConfig,
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub hmac_secret: Secret,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LPS_HOST.to_string(),
            port: DEFAULT_LPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            accrual_url: DEFAULT_ACCRUAL_URL.to_string(),
            auth: AuthConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = SyncConfig::default();
        let host = env::var("LPS_HOST").ok().unwrap_or_else(|| DEFAULT_LPS_HOST.into());
        let port = env_or_default("LPS_PORT", DEFAULT_LPS_PORT);
        let database_url = env::var("LPS_DATABASE_URL").ok().unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let accrual_url = env::var("LPS_ACCRUAL_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ LPS_ACCRUAL_URL is not set. Using the default, {DEFAULT_ACCRUAL_URL}.");
            DEFAULT_ACCRUAL_URL.into()
        });
        let sync = SyncConfig {
            checker_workers: env_or_default("LPS_CHECKER_WORKERS", defaults.checker_workers),
            updater_workers: env_or_default("LPS_UPDATER_WORKERS", defaults.updater_workers),
            poll_interval: Duration::from_secs(env_or_default(
                "LPS_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )),
            persist_attempts: env_or_default("LPS_PERSIST_ATTEMPTS", defaults.persist_attempts),
        };
        Self { host, port, database_url, accrual_url, auth: AuthConfig::from_env_or_default(), sync }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = match env::var("LPS_HMAC_SECRET") {
            Ok(secret) if !secret.is_empty() => Secret::new(secret),
            _ => {
                warn!(
                    "🪛️ LPS_HMAC_SECRET is not set. Generating a random secret; access tokens will not survive \
                     a server restart."
                );
                let secret: String = rand::thread_rng().sample_iter(&Alphanumeric).take(40).map(char::from).collect();
                Secret::new(secret)
            },
        };
        Self { hmac_secret }
    }
}

/// Parses an environment variable, falling back (with a log entry) when it is unset or malformed.
fn env_or_default<T>(var: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(var) {
        Err(_) => default,
        Ok(s) => s.parse::<T>().unwrap_or_else(|_| {
            error!("🪛️ {s} is not a valid value for {var}. Using the default, {default}, instead.");
            default
        }),
    }
}
