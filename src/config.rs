use std::{env, path::PathBuf};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/state.json";

/// Hosted backend used in authenticated mode. Both values are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub remote: Option<RemoteConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
        let non_empty = |key: &str| lookup(key).filter(|value: &String| !value.trim().is_empty());
        let remote = match (non_empty("HABITCAL_REMOTE_URL"), non_empty("HABITCAL_REMOTE_KEY")) {
            (Some(url), Some(api_key)) => Some(RemoteConfig { url, api_key }),
            _ => None,
        };

        Self {
            port,
            data_path,
            remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_guest_only() {
        let config = config(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_path, PathBuf::from("data/state.json"));
        assert!(config.remote.is_none());
    }

    #[test]
    fn remote_needs_url_and_key() {
        assert!(config(&[("HABITCAL_REMOTE_URL", "https://x.test")]).remote.is_none());
        assert!(
            config(&[("HABITCAL_REMOTE_URL", "https://x.test"), ("HABITCAL_REMOTE_KEY", " ")])
                .remote
                .is_none()
        );

        let config = config(&[
            ("PORT", "9000"),
            ("APP_DATA_PATH", "/tmp/h.json"),
            ("HABITCAL_REMOTE_URL", "https://x.test"),
            ("HABITCAL_REMOTE_KEY", "anon"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_path, PathBuf::from("/tmp/h.json"));
        assert_eq!(config.remote.unwrap().api_key, "anon");
    }

    #[test]
    fn bad_port_falls_back() {
        assert_eq!(config(&[("PORT", "eighty")]).port, 8080);
    }
}
