use crate::core::config::data::{path_display, Config, API_BASE_URL_KEY, DEFAULT_API_BASE_URL};

impl Config {
    /// Human-readable summary used by `causerie config`.
    pub fn describe(&self, effective_base_url: &str) -> Vec<String> {
        let mut lines = vec!["Current configuration:".to_string()];
        match Self::config_path() {
            Some(path) => lines.push(format!("  file: {}", path_display(path))),
            None => lines.push("  file: (no config directory)".to_string()),
        }
        match &self.api_base_url {
            Some(url) => lines.push(format!("  {API_BASE_URL_KEY}: {url}")),
            None => lines.push(format!(
                "  {API_BASE_URL_KEY}: (unset, default {DEFAULT_API_BASE_URL})"
            )),
        }
        lines.push(format!("  effective {API_BASE_URL_KEY}: {effective_base_url}"));
        lines
    }

    pub fn print_all(&self, effective_base_url: &str) {
        for line in self.describe(effective_base_url) {
            println!("{line}");
        }
    }
}
