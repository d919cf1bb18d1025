use std::{env, str::FromStr};

use anyhow::{Context, bail};
use chrono::Duration;
use jsonwebtoken::Algorithm;

const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 60 * 24 * 8;
const DEFAULT_REFRESH_TOKEN_MINUTES: i64 = 60 * 24 * 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_name: String,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub cors_origins: Vec<String>,
}

/// Signing parameters for access and refresh tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_name = lookup("PROJECT_NAME").unwrap_or_else(|| "retail-api".to_string());
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => database_url_from_parts(&lookup)?,
        };
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("APP_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let secret = lookup("SECRET_KEY").context("SECRET_KEY is not set")?;
        let algorithm = parse_algorithm(lookup("ALGORITHM").as_deref().unwrap_or("HS256"))?;
        let access_minutes = parse_minutes(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", DEFAULT_ACCESS_TOKEN_MINUTES)?;
        let refresh_minutes =
            parse_minutes(&lookup, "REFRESH_TOKEN_EXPIRE_MINUTES", DEFAULT_REFRESH_TOKEN_MINUTES)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        Ok(Self {
            project_name,
            database_url,
            host,
            port,
            jwt: JwtConfig {
                secret,
                algorithm,
                access_ttl: Duration::minutes(access_minutes),
                refresh_ttl: Duration::minutes(refresh_minutes),
            },
            admin_user: lookup("ADMIN_USER"),
            admin_password: lookup("ADMIN_PASSWORD"),
            cors_origins,
        })
    }
}

fn database_url_from_parts<F>(lookup: &F) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let user = lookup("DATABASE_USERNAME").context("DATABASE_USERNAME is not set")?;
    let password = lookup("DATABASE_PASSWORD").context("DATABASE_PASSWORD is not set")?;
    let host = lookup("DATABASE_HOST").unwrap_or_else(|| "localhost".to_string());
    let name = lookup("DATABASE_NAME").context("DATABASE_NAME is not set")?;
    let port = match lookup("DATABASE_PORT") {
        Some(p) => p
            .parse::<u16>()
            .with_context(|| format!("DATABASE_PORT is not a valid port: {p}"))?,
        None => 5432,
    };
    Ok(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}

fn parse_minutes<F>(lookup: &F, key: &str, default: i64) -> anyhow::Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let minutes = raw
                .parse::<i64>()
                .with_context(|| format!("{key} must be an integer"))?;
            if minutes <= 0 {
                bail!("{key} must be positive");
            }
            Ok(minutes)
        }
        None => Ok(default),
    }
}

// Only HMAC algorithms can be driven by a shared SECRET_KEY.
fn parse_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    let algorithm = Algorithm::from_str(raw.trim())
        .map_err(|_| anyhow::anyhow!("unknown ALGORITHM: {raw}"))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => bail!("ALGORITHM {other:?} needs a key pair; use HS256, HS384 or HS512"),
    }
}
