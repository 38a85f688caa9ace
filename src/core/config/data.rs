use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::url::normalize_base_url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Environment variable that overrides the configured base URL.
pub const API_BASE_URL_ENV: &str = "CAUSERIE_API_BASE_URL";

/// Key used on the command line (`causerie set api-base-url ...`).
pub const API_BASE_URL_KEY: &str = "api-base-url";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the chat backend, e.g. `http://localhost:8000/api`
    pub api_base_url: Option<String>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl Config {
    /// Pick the backend base URL: command line first, then the environment,
    /// then the config file, then the built-in default.
    pub fn resolve_api_base_url(&self, cli_override: Option<&str>, env_value: Option<&str>) -> String {
        let chosen = non_empty(cli_override)
            .or_else(|| non_empty(env_value))
            .or_else(|| non_empty(self.api_base_url.as_deref()))
            .unwrap_or(DEFAULT_API_BASE_URL);
        normalize_base_url(chosen)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            API_BASE_URL_KEY => {
                let value = value.trim();
                let url = reqwest::Url::parse(value)
                    .map_err(|err| format!("Invalid URL '{value}': {err}"))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(format!(
                        "Unsupported URL scheme '{}': use http or https",
                        url.scheme()
                    ));
                }
                self.api_base_url = Some(normalize_base_url(value));
                Ok(())
            }
            _ => Err(format!("Unknown config key: {key}")),
        }
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), String> {
        match key {
            API_BASE_URL_KEY => {
                self.api_base_url = None;
                Ok(())
            }
            _ => Err(format!("Unknown config key: {key}")),
        }
    }
}
