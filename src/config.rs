use std::env;

use anyhow::Context;

use crate::map::geocode::DEFAULT_NOMINATIM_URL;
use crate::overpass::DEFAULT_OVERPASS_URL;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the accident area API as seen by the map client.
    pub api_base: String,
    pub nominatim_url: String,
    pub overpass_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Layers the given variables over [`Config::default`]. Blank values
    /// count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = var("API_BASE") {
            config.api_base = v;
        }
        if let Some(v) = var("NOMINATIM_URL") {
            config.nominatim_url = v;
        }
        if let Some(v) = var("OVERPASS_URL") {
            config.overpass_url = v;
        }
        if let Some(v) = var("WEB_HOST") {
            config.web_host = v;
        }
        if let Some(port) = var("WEB_PORT") {
            config.web_port = port
                .parse()
                .with_context(|| format!("WEB_PORT must be a number, got {port:?}"))?;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3000".to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            web_host: "0.0.0.0".to_string(),
            web_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_binds_all_interfaces() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.api_base, "http://localhost:3000");
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unset_and_blank_vars_fall_back_to_defaults() {
        let env = vars(&[("API_BASE", "  "), ("WEB_HOST", "127.0.0.1")]);
        let config = Config::from_vars(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.api_base, Config::default().api_base);
        assert_eq!(config.overpass_url, Config::default().overpass_url);
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn overrides_are_applied() {
        let env = vars(&[("API_BASE", "https://api.example.org"), ("WEB_PORT", "8080")]);
        let config = Config::from_vars(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.api_base, "https://api.example.org");
        assert_eq!(config.web_port, 8080);
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        let env = vars(&[("WEB_PORT", "http")]);
        let err = Config::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("WEB_PORT must be a number"));
    }
}
