//! Server address normalization
//!
//! Players type anything from a bare LAN address to a tunnel hostname. The
//! transport URL is derived by matching the host against an ordered list of
//! patterns; the first match decides scheme and port.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use url::Url;

use crate::constants::LOCAL_SERVER_PORT;
use crate::error::{LinkError, Result};

/// WebSocket scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    Ws,
    #[default]
    Wss,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct HostPattern {
    regex: Regex,
    scheme: Scheme,
    port: Option<u16>,
}

/// Host patterns in priority order
static HOST_PATTERNS: Lazy<Vec<HostPattern>> = Lazy::new(|| {
    vec![
        // Public tunnel services terminate TLS on the default port
        HostPattern {
            regex: Regex::new(
                r"(?i)\.(ngrok|trycloudflare|loca\.lt|serveo|pagekite|bore\.pub|tunnelmole\.net)\.?",
            )
            .unwrap(),
            scheme: Scheme::Wss,
            port: None,
        },
        HostPattern {
            regex: Regex::new(r"(?i)^(localhost|127\.0\.0\.1)$").unwrap(),
            scheme: Scheme::Ws,
            port: Some(LOCAL_SERVER_PORT),
        },
        HostPattern {
            regex: Regex::new(r"^(192\.168\.|10\.|172\.(1[6-9]|2[0-9]|3[0-1])\.)").unwrap(),
            scheme: Scheme::Ws,
            port: Some(LOCAL_SERVER_PORT),
        },
    ]
});

/// Explicit `:port` suffix on a host
static PORT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d+$").unwrap());

/// Normalize a server address using `wss` as the fallback scheme
///
/// # Examples
///
/// ```
/// use hamlet_link_common::utils::normalize_url;
///
/// assert_eq!(
///     normalize_url("myapp.trycloudflare.com").unwrap(),
///     "wss://myapp.trycloudflare.com"
/// );
/// assert_eq!(normalize_url("192.168.1.5").unwrap(), "ws://192.168.1.5:8766");
/// assert_eq!(
///     normalize_url("wss://already.example.com").unwrap(),
///     "wss://already.example.com"
/// );
/// ```
pub fn normalize_url(input: &str) -> Result<String> {
    normalize_url_with(input, Scheme::default())
}

/// Normalize a server address, falling back to `default_scheme`
///
/// - `ws://` and `wss://` URLs are returned unchanged.
/// - An `http://`/`https://` prefix and any path are stripped.
/// - The host is matched against the pattern list; an explicit port in the
///   input is kept and suppresses the pattern's port.
pub fn normalize_url_with(input: &str, default_scheme: Scheme) -> Result<String> {
    let input = input.trim();
    let lower = input.to_ascii_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Url::parse(input).map_err(|e| LinkError::InvalidUrl(format!("{input}: {e}")))?;
        return Ok(input.to_string());
    }

    let without_scheme = if lower.starts_with("https://") {
        &input["https://".len()..]
    } else if lower.starts_with("http://") {
        &input["http://".len()..]
    } else {
        input
    };
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim();

    if host.is_empty() {
        return Err(LinkError::InvalidUrl(
            "server address is empty".to_string(),
        ));
    }

    let has_port = PORT_SUFFIX.is_match(host);
    let bare_host = PORT_SUFFIX.replace(host, "");

    let (scheme, port) = HOST_PATTERNS
        .iter()
        .find(|pattern| pattern.regex.is_match(&bare_host))
        .map(|pattern| (pattern.scheme, pattern.port))
        .unwrap_or((default_scheme, None));

    let normalized = match port {
        Some(port) if !has_port => format!("{scheme}://{host}:{port}"),
        _ => format!("{scheme}://{host}"),
    };

    Url::parse(&normalized).map_err(|e| LinkError::InvalidUrl(format!("{input}: {e}")))?;
    Ok(normalized)
}

/// Derive the HTTP base URL serving the same host as a WebSocket URL
///
/// `ws` maps to `http` and `wss` to `https`; the path is dropped.
pub fn http_base_url(ws_url: &str) -> Result<String> {
    let mut url =
        Url::parse(ws_url).map_err(|e| LinkError::InvalidUrl(format!("{ws_url}: {e}")))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => {
            return Err(LinkError::InvalidUrl(format!(
                "unsupported scheme: {other}"
            )));
        }
    };

    url.set_scheme(scheme)
        .map_err(|_| LinkError::InvalidUrl(format!("cannot convert {ws_url} to {scheme}")))?;
    url.set_path("");
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.as_str().trim_end_matches('/').to_string())
}
