//! URL helpers for joining backend endpoints onto the configured base URL.

/// Strip trailing slashes so endpoints can be appended without doubling them.
///
/// ```
/// use causerie::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/api/"), "http://localhost:8000/api");
/// assert_eq!(normalize_base_url("http://localhost:8000/api"), "http://localhost:8000/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join `endpoint` onto `base_url` with exactly one slash between them.
///
/// ```
/// use causerie::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/api/", "/chat"),
///     "http://localhost:8000/api/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

/// Scheme, host and port of `base_url`, used when telling the user which
/// server to start. Unparseable input is returned normalized but otherwise
/// unchanged.
pub fn server_origin(base_url: &str) -> String {
    match reqwest::Url::parse(base_url.trim()) {
        Ok(url) if url.has_host() => url.origin().ascii_serialization(),
        _ => normalize_base_url(base_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_every_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://localhost:8000/api///"),
            "http://localhost:8000/api"
        );
        assert_eq!(normalize_base_url(" http://host/ "), "http://host");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn construct_handles_slashes_on_both_sides() {
        for (base, endpoint) in [
            ("http://localhost:8000/api", "login"),
            ("http://localhost:8000/api/", "login"),
            ("http://localhost:8000/api", "/login"),
            ("http://localhost:8000/api//", "//login"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "http://localhost:8000/api/login"
            );
        }
    }

    #[test]
    fn origin_drops_the_path() {
        assert_eq!(
            server_origin("http://localhost:8000/api"),
            "http://localhost:8000"
        );
        assert_eq!(
            server_origin("https://chat.example.com/v2/api/"),
            "https://chat.example.com"
        );
    }

    #[test]
    fn origin_of_garbage_is_passed_through() {
        assert_eq!(server_origin("not a url/"), "not a url");
    }
}
