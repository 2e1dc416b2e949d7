use std::env;

use crate::services::insights::DuplicatePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub jwt_secret: String,

    // Store call policy
    pub store_timeout_ms: u64,
    pub store_max_retries: u32,
    pub store_retry_base_ms: u64,
    pub store_retry_max_ms: u64,

    pub insights_duplicates: DuplicatePolicy,
}

impl Config {
    pub fn from_env() -> Self {
        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            _ => StorageBackend::Postgres,
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            panic!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        Self {
            storage_backend,
            database_url,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),

            store_timeout_ms: env::var("STORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".into())
                .parse()
                .unwrap_or(5000),
            store_max_retries: env::var("STORE_MAX_RETRIES")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .unwrap_or(3),
            store_retry_base_ms: env::var("STORE_RETRY_BASE_MS")
                .unwrap_or_else(|_| "100".into())
                .parse()
                .unwrap_or(100),
            store_retry_max_ms: env::var("STORE_RETRY_MAX_MS")
                .unwrap_or_else(|_| "2000".into())
                .parse()
                .unwrap_or(2000),

            insights_duplicates: match env::var("INSIGHTS_DUPLICATES")
                .unwrap_or_default()
                .as_str()
            {
                "once_per_day" => DuplicatePolicy::OncePerDay,
                _ => DuplicatePolicy::CountEach,
            },
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:3000".into(),
            jwt_secret: "test-secret".into(),
            store_timeout_ms: 200,
            store_max_retries: 2,
            store_retry_base_ms: 10,
            store_retry_max_ms: 50,
            insights_duplicates: DuplicatePolicy::CountEach,
        }
    }
}
