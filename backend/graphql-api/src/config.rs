//! Configuration for the GraphQL API
//!
//! Loads settings from environment variables, with a `.env` file picked up
//! for local development.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Session tokens and the session cookie share the same 30-day horizon.
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    /// Postgres connection string. When unset the service runs on the
    /// in-memory directory, which is enough for local development and tests.
    pub database_url: Option<String>,
    pub graphql: GraphQLConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Process-wide signing secret. Verification is impossible without it,
    /// so startup fails when it is absent.
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLConfig {
    /// Serve the GraphiQL page on /playground
    pub playground: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            jwt: Self::jwt_from_env()?,
            database_url: env::var("DATABASE_URL").ok(),
            graphql: GraphQLConfig {
                playground: env::var("GRAPHQL_PLAYGROUND")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(true),
            },
        })
    }

    fn jwt_from_env() -> Result<JwtConfig> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let ttl_seconds = env::var("JWT_TTL_SECONDS")
            .unwrap_or_else(|_| DEFAULT_TOKEN_TTL_SECONDS.to_string())
            .parse()
            .context("Invalid JWT_TTL_SECONDS")?;

        Ok(JwtConfig {
            secret,
            ttl_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_config_from_env() {
        env::set_var("JWT_SECRET", "test-secret-key");
        env::set_var("JWT_TTL_SECONDS", "7200");

        let config = Config::jwt_from_env().unwrap();
        assert_eq!(config.secret, "test-secret-key");
        assert_eq!(config.ttl_seconds, 7200);

        env::remove_var("JWT_SECRET");
        env::remove_var("JWT_TTL_SECONDS");
    }

    #[test]
    fn default_ttl_is_thirty_days() {
        assert_eq!(DEFAULT_TOKEN_TTL_SECONDS, 2_592_000);
    }
}
