#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use url::Url;

use stockroom_contracts::purchase_order::DEFAULT_TAX_RATE;

use crate::default_store_path;

pub const ENV_HTTP_BIND: &str = "STOCKROOM_HTTP_BIND";
pub const ENV_SERVICES: &str = "STOCKROOM_SERVICES";
pub const ENV_PERSISTENCE_ENABLED: &str = "STOCKROOM_PERSISTENCE_ENABLED";
pub const ENV_STORE_PATH: &str = "STOCKROOM_STORE_PATH";
pub const ENV_TAX_RATE: &str = "STOCKROOM_TAX_RATE";
pub const ENV_LOG_JSON: &str = "STOCKROOM_LOG_JSON";
pub const ENV_BACKEND_URL: &str = "STOCKROOM_BACKEND_URL";
pub const ENV_PRODUCTS_URL: &str = "STOCKROOM_PRODUCTS_URL";
pub const ENV_SUPPLIERS_URL: &str = "STOCKROOM_SUPPLIERS_URL";
pub const ENV_INVENTORY_URL: &str = "STOCKROOM_INVENTORY_URL";
pub const ENV_PURCHASING_URL: &str = "STOCKROOM_PURCHASING_URL";
pub const ENV_HTTP_TIMEOUT_MS: &str = "STOCKROOM_HTTP_TIMEOUT_MS";
pub const ENV_DASHBOARD_REFRESH_SECS: &str = "STOCKROOM_DASHBOARD_REFRESH_SECS";

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DASHBOARD_REFRESH_SECS: u64 = 30;

/// Which of the four REST services a server process mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRoles {
    pub products: bool,
    pub suppliers: bool,
    pub inventory: bool,
    pub purchasing: bool,
}

impl ServiceRoles {
    pub fn all() -> Self {
        Self {
            products: true,
            suppliers: true,
            inventory: true,
            purchasing: true,
        }
    }

    pub fn none() -> Self {
        Self {
            products: false,
            suppliers: false,
            inventory: false,
            purchasing: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }
}

impl FromStr for ServiceRoles {
    type Err = String;

    /// `all`, or a comma list of `products`, `suppliers`, `inventory`, `purchasing`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        let mut roles = Self::none();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "products" => roles.products = true,
                "suppliers" => roles.suppliers = true,
                "inventory" => roles.inventory = true,
                "purchasing" => roles.purchasing = true,
                other => return Err(format!("unknown service '{other}'")),
            }
        }
        if roles.is_empty() {
            return Err("no services selected".to_string());
        }
        Ok(roles)
    }
}

/// Settings for `stockroom_http`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub roles: ServiceRoles,
    pub persistence_enabled: bool,
    pub store_path: PathBuf,
    pub tax_rate: Decimal,
    pub log_json: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let bind =
            non_empty(&lookup, ENV_HTTP_BIND).unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let bind = bind
            .parse::<SocketAddr>()
            .map_err(|err| format!("{ENV_HTTP_BIND}: invalid socket address '{bind}': {err}"))?;
        let roles = match non_empty(&lookup, ENV_SERVICES) {
            Some(raw) => raw
                .parse::<ServiceRoles>()
                .map_err(|err| format!("{ENV_SERVICES}: {err}"))?,
            None => ServiceRoles::all(),
        };
        let tax_rate = match non_empty(&lookup, ENV_TAX_RATE) {
            Some(raw) => {
                let rate = raw
                    .parse::<Decimal>()
                    .map_err(|_| format!("{ENV_TAX_RATE}: '{raw}' is not a decimal"))?;
                if rate < Decimal::ZERO || rate > Decimal::ONE {
                    return Err(format!("{ENV_TAX_RATE}: must be between 0 and 1 (got {rate})"));
                }
                rate
            }
            None => DEFAULT_TAX_RATE,
        };
        Ok(Self {
            bind,
            roles,
            persistence_enabled: env_flag(&lookup, ENV_PERSISTENCE_ENABLED, true),
            store_path: non_empty(&lookup, ENV_STORE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(default_store_path),
            tax_rate,
            log_json: env_flag(&lookup, ENV_LOG_JSON, false),
        })
    }
}

/// Base URL of each REST service the console talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub products: Url,
    pub suppliers: Url,
    pub inventory: Url,
    pub purchasing: Url,
}

impl ServiceUrls {
    /// All four services behind one server, as `stockroom_http` serves them by default.
    pub fn single(base: &str) -> Result<Self, String> {
        let base = parse_service_url("backend", base)?;
        Ok(Self {
            products: base.clone(),
            suppliers: base.clone(),
            inventory: base.clone(),
            purchasing: base,
        })
    }
}

/// Settings for the `stockroom` console.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    pub urls: ServiceUrls,
    pub timeout: Duration,
    pub refresh: Duration,
    pub log_json: bool,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let shared = non_empty(&lookup, ENV_BACKEND_URL);
        let url_for = |key: &str, default_port: u16| -> Result<Url, String> {
            let raw = non_empty(&lookup, key)
                .or_else(|| shared.clone())
                .unwrap_or_else(|| format!("http://127.0.0.1:{default_port}"));
            parse_service_url(key, &raw)
        };
        let urls = ServiceUrls {
            products: url_for(ENV_PRODUCTS_URL, 8081)?,
            suppliers: url_for(ENV_SUPPLIERS_URL, 8082)?,
            inventory: url_for(ENV_INVENTORY_URL, 8083)?,
            purchasing: url_for(ENV_PURCHASING_URL, 8084)?,
        };
        let timeout_ms = env_u64(&lookup, ENV_HTTP_TIMEOUT_MS, DEFAULT_HTTP_TIMEOUT_MS)?
            .clamp(100, 60_000);
        let refresh_secs =
            env_u64(&lookup, ENV_DASHBOARD_REFRESH_SECS, DEFAULT_DASHBOARD_REFRESH_SECS)?.max(1);
        Ok(Self {
            urls,
            timeout: Duration::from_millis(timeout_ms),
            refresh: Duration::from_secs(refresh_secs),
            log_json: env_flag(&lookup, ENV_LOG_JSON, false),
        })
    }
}

fn parse_service_url(name: &str, raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|err| format!("{name}: invalid url '{raw}': {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("{name}: url '{raw}' must use http or https"));
    }
    Ok(url)
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match non_empty(lookup, key) {
        Some(v) => !matches!(
            v.to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        None => default,
    }
}

fn env_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, String> {
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| format!("{key}: '{raw}' is not a whole number")),
        None => Ok(default),
    }
}
