use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub logging: LoggingConfig,
    pub tenants: Vec<TenantConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub max_connections: usize,
    pub keep_alive_seconds: u64,
    pub client_timeout_seconds: u64,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
}

/// Which billing shapes a tenant's form accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    /// Corporate invoicing only (ragione sociale / partita IVA / sede legale).
    Corporate,
    /// Corporate or private-person invoicing.
    CorporateAndPrivate,
}

/// Static per-tenant configuration. One entry per deployed event form;
/// the registry in `AppConfig::tenants` replaces the old practice of
/// scanning a directory for instance folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// URL path prefix and Postgres schema name source.
    pub name: String,
    /// Display name of the event, used in emails and PDF headers.
    pub event_name: String,
    pub admin_password: String,
    /// Reference date the form frontend uses for price calculation.
    pub calculation_date: Option<String>,
    /// Seeded CSV with pre-assigned user ids; absent means the tenant has
    /// no lookup endpoint and `user_id` is optional on submission.
    pub lookup_csv: Option<String>,
    /// When true, a submission must carry a `user_id`.
    pub require_user_id: bool,
    pub billing_mode: BillingMode,
    pub email_from_name: String,
    pub email_from_address: String,
}

impl TenantConfig {
    /// Postgres schema identifier for this tenant. Lowercased, dashes
    /// folded to underscores, anything else non-alphanumeric stripped.
    pub fn schema_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        for c in self.name.to_lowercase().chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c);
            } else if c == '-' || c == '_' {
                out.push('_');
            }
        }
        if out.is_empty() || out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            out.insert_str(0, "t_");
        }
        out
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let tenants = load_tenants()?;
        if tenants.is_empty() {
            return Err("TENANT_NAMES must list at least one tenant".into());
        }

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                workers: env::var("WORKERS")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()
                    .expect("WORKERS must be a valid number"),
                max_connections: env::var("MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .expect("MAX_CONNECTIONS must be a valid number"),
                keep_alive_seconds: env::var("KEEP_ALIVE_SECONDS")
                    .unwrap_or_else(|_| "75".to_string())
                    .parse()
                    .expect("KEEP_ALIVE_SECONDS must be a valid number"),
                client_timeout_seconds: env::var("CLIENT_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("CLIENT_TIMEOUT_SECONDS must be a valid number"),
                cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("DB_MAX_CONNECTIONS must be a valid number"),
                connect_timeout_seconds: env::var("DB_CONNECT_TIMEOUT")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("DB_CONNECT_TIMEOUT must be a valid number"),
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or_default(),
                port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .expect("SMTP_PORT must be a valid number"),
                username: env::var("SMTP_USER").unwrap_or_default(),
                password: env::var("SMTP_PASS").unwrap_or_default(),
                enabled: env::var("SMTP_HOST").is_ok(),
            },
            logging: LoggingConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                file_path: env::var("LOG_FILE_PATH").ok(),
            },
            tenants,
        })
    }
}

/// Build the static tenant registry from `TENANT_NAMES` plus per-tenant
/// `TENANT_<NAME>_*` variables, falling back to the unprefixed globals.
fn load_tenants() -> Result<Vec<TenantConfig>, Box<dyn std::error::Error>> {
    let names = env::var("TENANT_NAMES").map_err(|_| "TENANT_NAMES must be set")?;

    let mut tenants = Vec::new();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let prefix = format!("TENANT_{}_", env_key(name));
        let get = |key: &str| -> Option<String> {
            env::var(format!("{}{}", prefix, key))
                .ok()
                .or_else(|| env::var(key).ok())
        };

        let admin_password = get("ADMIN_PASSWORD")
            .ok_or_else(|| format!("missing ADMIN_PASSWORD for tenant '{}'", name))?;
        let lookup_csv = env::var(format!("{}LOOKUP_CSV", prefix)).ok();
        let billing_mode = match get("BILLING_MODE").as_deref() {
            Some("corporate_and_private") | Some("privato") => BillingMode::CorporateAndPrivate,
            _ => BillingMode::Corporate,
        };

        tenants.push(TenantConfig {
            name: name.to_string(),
            event_name: get("EVENT_NAME").unwrap_or_else(|| name.to_string()),
            admin_password,
            calculation_date: get("CALCULATION_DATE"),
            require_user_id: lookup_csv.is_some()
                || get("REQUIRE_USER_ID").as_deref() == Some("true"),
            lookup_csv,
            billing_mode,
            email_from_name: get("EMAIL_FROM_NAME").unwrap_or_else(|| name.to_string()),
            email_from_address: get("EMAIL_FROM_ADDRESS").unwrap_or_default(),
        });
    }
    Ok(tenants)
}

/// `crociera-fiordi` -> `CROCIERA_FIORDI`
fn env_key(name: &str) -> String {
    name.to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(name: &str) -> TenantConfig {
        TenantConfig {
            name: name.to_string(),
            event_name: "Evento".to_string(),
            admin_password: "pw".to_string(),
            calculation_date: None,
            lookup_csv: None,
            require_user_id: false,
            billing_mode: BillingMode::Corporate,
            email_from_name: "Eventi".to_string(),
            email_from_address: "noreply@example.com".to_string(),
        }
    }

    #[test]
    fn schema_name_is_a_safe_identifier() {
        assert_eq!(tenant("crociera-fiordi").schema_name(), "crociera_fiordi");
        assert_eq!(tenant("Settimana LaFenice!").schema_name(), "settimanalafenice");
        assert_eq!(tenant("2026-inverno").schema_name(), "t_2026_inverno");
    }

    #[test]
    fn env_key_folds_separators() {
        assert_eq!(env_key("crociera-fiordi"), "CROCIERA_FIORDI");
        assert_eq!(env_key("settimana.lafenice"), "SETTIMANA_LAFENICE");
    }
}
