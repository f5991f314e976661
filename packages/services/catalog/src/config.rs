use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mongodb_uri: String,
    pub database_name: String,
    pub server_port: u16,
    /// Apply pending migrations when the server starts
    pub auto_migrate: bool,
    /// Wrap batch inserts in a multi-document transaction (replica sets only)
    pub mongodb_transactions: bool,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017/".to_string(),
            database_name: "ondc_products".to_string(),
            server_port: 8080,
            auto_migrate: true,
            mongodb_transactions: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; unparseable values keep their default
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |k: &str, default: bool| get(k).and_then(|s| s.trim().to_lowercase().parse().ok()).unwrap_or(default);

        let log_format = match get("LOG_FORMAT").map(|s| s.to_lowercase()) {
            Some(f) if f == "json" => LogFormat::Json,
            _ => defaults.log_format,
        };

        Self {
            mongodb_uri: get("MONGODB_URI").unwrap_or(defaults.mongodb_uri),
            database_name: get("DATABASE_NAME").unwrap_or(defaults.database_name),
            server_port: get("SERVER_PORT").and_then(|s| s.parse().ok()).unwrap_or(defaults.server_port),
            auto_migrate: flag("AUTO_MIGRATE", defaults.auto_migrate),
            mongodb_transactions: flag("MONGODB_TRANSACTIONS", defaults.mongodb_transactions),
            log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg.mongodb_uri, "mongodb://localhost:27017/");
        assert_eq!(cfg.database_name, "ondc_products");
        assert_eq!(cfg.server_port, 8080);
        assert!(cfg.auto_migrate);
        assert!(!cfg.mongodb_transactions);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("DATABASE_NAME", "catalog_test"),
            ("SERVER_PORT", "9090"),
            ("AUTO_MIGRATE", "FALSE"),
            ("MONGODB_TRANSACTIONS", "true"),
            ("LOG_FORMAT", "JSON"),
        ]));
        assert_eq!(cfg.database_name, "catalog_test");
        assert_eq!(cfg.server_port, 9090);
        assert!(!cfg.auto_migrate);
        assert!(cfg.mongodb_transactions);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_port_keeps_default() {
        let cfg = Config::from_lookup(lookup(&[("SERVER_PORT", "not-a-port")]));
        assert_eq!(cfg.server_port, 8080);
    }
}
