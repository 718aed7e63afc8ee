use std::env;

use crate::models::Role;
use crate::pipeline::pagination::DEFAULT_LIMIT;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3001/api";

/// Where list data is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Rest { base_url: String },
    Snapshot { path: String },
}

/// Identity used when a request carries no access token. Only meant for
/// local runs against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevUser {
    pub user_id: String,
    pub role: Option<Role>,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_source: DataSource,
    pub current_semester: Option<String>,
    pub active_window_minutes: u32,
    pub page_size: usize,
    pub static_dir: String,
    pub dev_user: Option<DevUser>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        load_dotenv_layers();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match read("PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| format!("invalid PORT: {e}"))?,
            None => 3000,
        };

        let data_source = match read("PORTAL_SNAPSHOT_PATH") {
            Some(path) => DataSource::Snapshot { path },
            None => DataSource::Rest {
                base_url: read("PORTAL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            },
        };

        let page_size = read_number(&read, "PORTAL_PAGE_SIZE", DEFAULT_LIMIT)?;
        if page_size == 0 {
            return Err("invalid PORTAL_PAGE_SIZE: must be positive".to_string());
        }

        let dev_user = read("PORTAL_DEV_USER_ID").map(|user_id| DevUser {
            user_id,
            role: read("PORTAL_DEV_ROLE").and_then(|r| Role::normalize(&r)),
            class_id: read("PORTAL_DEV_CLASS_ID"),
        });

        Ok(Self {
            host: read("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            data_source,
            current_semester: read("PORTAL_CURRENT_SEMESTER"),
            active_window_minutes: read_number(&read, "PORTAL_ACTIVE_WINDOW_MINUTES", 5)?,
            page_size,
            static_dir: read("PORTAL_STATIC_DIR").unwrap_or_else(|| "assets".to_string()),
            dev_user,
        })
    }
}

fn read_number<T>(read: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match read(key) {
        Some(v) => v.parse::<T>().map_err(|e| format!("invalid {key}: {e}")),
        None => Ok(default),
    }
}

fn load_dotenv_layers() {
    for path in [".env", "../.env", "../../.env"] {
        let _ = dotenvy::from_path(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_use_the_rest_api() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.page_size, DEFAULT_LIMIT);
        assert_eq!(cfg.active_window_minutes, 5);
        assert_eq!(
            cfg.data_source,
            DataSource::Rest {
                base_url: DEFAULT_API_URL.to_string()
            }
        );
        assert!(cfg.dev_user.is_none());
    }

    #[test]
    fn snapshot_path_wins_over_api_url() {
        let cfg = config(&[
            ("PORTAL_API_URL", "http://api"),
            ("PORTAL_SNAPSHOT_PATH", "data/demo.json"),
            ("PORTAL_DEV_USER_ID", "u1"),
            ("PORTAL_DEV_ROLE", "Lớp trưởng"),
        ])
        .unwrap();
        assert_eq!(
            cfg.data_source,
            DataSource::Snapshot {
                path: "data/demo.json".to_string()
            }
        );
        let dev = cfg.dev_user.unwrap();
        assert_eq!(dev.role, Some(Role::ClassMonitor));
    }

    #[test]
    fn bad_numbers_are_reported() {
        assert!(config(&[("PORT", "http")]).unwrap_err().contains("PORT"));
        assert!(config(&[("PORTAL_PAGE_SIZE", "0")]).is_err());
        assert!(config(&[("PORTAL_ACTIVE_WINDOW_MINUTES", "-1")]).is_err());
    }
}
