//! Runtime configuration, read from the environment (and `.env` via
//! `dotenvy` in `main`). Every setting has a development default.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

use crate::certificates::layout::DEFAULT_BASELINE_RATIO;

const DEFAULT_SCRIPT_FONT: &str =
    "https://github.com/google/fonts/raw/main/ofl/greatvibes/GreatVibes-Regular.ttf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Env: `SMTP_HOST`. Unset means mail is logged, not sent.
    pub smtp_host: Option<String>,
    /// Env: `SMTP_PORT`
    pub smtp_port: u16,
    /// Env: `EMAIL_USER`
    pub username: Option<String>,
    /// Env: `EMAIL_PASS`
    pub password: Option<String>,
    /// Env: `MAIL_FROM`
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct CertificateConfig {
    /// Env: `CERT_SCRIPT_FONT` (file path or http(s) URL)
    pub script_font: Option<String>,
    /// Env: `CERT_FONT_TIMEOUT_SECS`; bounds fetching the script font
    pub font_timeout: Duration,
    /// Env: `CERT_CONCURRENCY`
    pub concurrency: usize,
    /// Env: `CERT_BATCH_TIMEOUT_SECS`
    pub batch_timeout: Duration,
    /// Env: `CERT_BASELINE_RATIO`
    pub baseline_ratio: f64,
}

#[derive(Clone)]
pub struct Config {
    /// Env: `DATABASE_URL`
    pub database_url: String,
    /// Env: `DATABASE_MAX_CONNECTIONS`
    pub database_max_connections: u32,
    /// Env: `STORE_BACKEND` (`postgres` | `memory`)
    pub store_backend: StoreBackend,
    /// Env: `HTTP_ADDR`
    pub http_addr: SocketAddr,
    /// Env: `RUST_ENV=production` turns on HSTS.
    pub production: bool,
    /// Env: `CORS_ALLOWED_ORIGINS` (comma separated)
    pub cors_allowed_origins: Vec<String>,
    /// Env: `FRONTEND_URL`
    pub frontend_url: String,
    /// Env: `UPLOAD_DIR`
    pub upload_dir: PathBuf,
    /// Env: `ADMIN_TOKEN`
    pub admin_token: Option<String>,
    /// Env: `VOLUNTEER_TOKEN`
    pub volunteer_token: Option<String>,
    /// Env: `ORGANIZATION_NAME`
    pub organization_name: String,
    /// Env: `TICKET_LOGO_PATH`
    pub ticket_logo_path: Option<PathBuf>,
    pub mail: MailConfig,
    pub certificates: CertificateConfig,
}

// Tokens and the SMTP password stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("store_backend", &self.store_backend)
            .field("database_max_connections", &self.database_max_connections)
            .field("http_addr", &self.http_addr)
            .field("production", &self.production)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("frontend_url", &self.frontend_url)
            .field("upload_dir", &self.upload_dir)
            .field("admin_enabled", &self.admin_token.is_some())
            .field("volunteer_enabled", &self.volunteer_token.is_some())
            .field("organization_name", &self.organization_name)
            .field("ticket_logo_path", &self.ticket_logo_path)
            .field("smtp_host", &self.mail.smtp_host)
            .field("certificates", &self.certificates)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/eventhub".to_string(),
            database_max_connections: 5,
            store_backend: StoreBackend::Postgres,
            http_addr: ([0, 0, 0, 0], 3001).into(),
            production: false,
            cors_allowed_origins: split_list("http://localhost:3000,http://localhost:5173"),
            frontend_url: "http://localhost:5173".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            admin_token: None,
            volunteer_token: None,
            organization_name: "CodeBuilders Community".to_string(),
            ticket_logo_path: Some(PathBuf::from("./logo.png")),
            mail: MailConfig {
                smtp_host: None,
                smtp_port: 587,
                username: None,
                password: None,
                from: "Community Events <no-reply@localhost>".to_string(),
            },
            certificates: CertificateConfig {
                script_font: Some(DEFAULT_SCRIPT_FONT.to_string()),
                font_timeout: Duration::from_secs(10),
                concurrency: 4,
                batch_timeout: Duration::from_secs(120),
                baseline_ratio: DEFAULT_BASELINE_RATIO,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(n) = parsed("DATABASE_MAX_CONNECTIONS") {
            config.database_max_connections = n;
        }
        if let Ok(backend) = env::var("STORE_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "postgres" => config.store_backend = StoreBackend::Postgres,
                "memory" => config.store_backend = StoreBackend::Memory,
                other => tracing::warn!(value = %other, "Unknown STORE_BACKEND, using postgres"),
            }
        }
        if let Some(addr) = parsed("HTTP_ADDR") {
            config.http_addr = addr;
        }
        config.production = env::var("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);
        if let Ok(origins) = env::var("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = split_list(&origins);
        }
        if let Ok(url) = env::var("FRONTEND_URL") {
            config.frontend_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(dir) = env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        config.admin_token = non_empty("ADMIN_TOKEN");
        config.volunteer_token = non_empty("VOLUNTEER_TOKEN");
        if let Some(name) = non_empty("ORGANIZATION_NAME") {
            config.organization_name = name;
        }
        if let Ok(path) = env::var("TICKET_LOGO_PATH") {
            config.ticket_logo_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        config.mail.smtp_host = non_empty("SMTP_HOST");
        if let Some(port) = parsed("SMTP_PORT") {
            config.mail.smtp_port = port;
        }
        config.mail.username = non_empty("EMAIL_USER");
        config.mail.password = non_empty("EMAIL_PASS");
        if let Some(from) = non_empty("MAIL_FROM") {
            config.mail.from = from;
        } else if let Some(user) = &config.mail.username {
            config.mail.from = format!("{} <{}>", config.organization_name, user);
        }

        if let Ok(source) = env::var("CERT_SCRIPT_FONT") {
            config.certificates.script_font = (!source.is_empty()).then_some(source);
        }
        if let Some(secs) = parsed::<u64>("CERT_FONT_TIMEOUT_SECS") {
            config.certificates.font_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(n) = parsed::<usize>("CERT_CONCURRENCY") {
            config.certificates.concurrency = n.max(1);
        }
        if let Some(secs) = parsed::<u64>("CERT_BATCH_TIMEOUT_SECS") {
            config.certificates.batch_timeout = Duration::from_secs(secs);
        }
        if let Some(ratio) = parsed::<f64>("CERT_BASELINE_RATIO") {
            if ratio.is_finite() && ratio >= 0.0 {
                config.certificates.baseline_ratio = ratio;
            } else {
                tracing::warn!(value = ratio, "Invalid CERT_BASELINE_RATIO, using default");
            }
        }

        config
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_friendly() {
        let config = Config::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3001).into());
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.certificates.baseline_ratio, 0.8);
        assert!(config.mail.smtp_host.is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn origin_lists_skip_blanks() {
        assert_eq!(
            split_list(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = Config {
            admin_token: Some("super-secret".into()),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("admin_enabled: true"));
    }
}
