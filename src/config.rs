use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirstSuperuser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Unset means the ephemeral in-memory store (local development only).
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub first_superuser: Option<FirstSuperuser>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "itemvault".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "itemvault-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };
        let first_superuser = match (
            std::env::var("FIRST_SUPERUSER").ok(),
            std::env::var("FIRST_SUPERUSER_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(FirstSuperuser { email, password }),
            _ => None,
        };
        Ok(Self {
            database_url,
            jwt,
            first_superuser,
        })
    }
}
