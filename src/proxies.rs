use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;

use url::Url;

/// Error type for invalid proxy configurations.
#[derive(Debug, thiserror::Error)]
#[error("Invalid proxy configuration: {0}")]
pub struct InvalidProxyConfig(pub String);

/// # ProxyConfig
///
/// Trait for defining proxy configurations to route upstream requests
/// through proxies.
///
/// Two built-in implementations cover the configured provider kinds:
/// - `GenericProxyConfig`: standard HTTP/HTTPS proxies (also used for
///   credentialed third-party gateways)
/// - `WebshareProxyConfig`: rotating residential proxies
///
/// Custom providers implement the same three methods and can be dropped
/// into the provider pool unchanged.
pub trait ProxyConfig: Debug + Send + Sync {
    /// Map of protocol scheme (`"http"` / `"https"`) to proxy URL, in the
    /// format `protocol://[username:password@]host:port`.
    fn to_requests_dict(&self) -> HashMap<String, String>;

    /// When `true`, connections are closed after each request so rotating
    /// proxies hand out a fresh IP every time. Defaults to `false`.
    fn prevent_keeping_connections_alive(&self) -> bool {
        false
    }

    /// Compact `host:port` form for telemetry; never includes credentials.
    fn display_endpoint(&self) -> String {
        let dict = self.to_requests_dict();
        let url = dict
            .get("https")
            .or_else(|| dict.get("http"))
            .cloned()
            .unwrap_or_default();
        match Url::parse(&url) {
            Ok(parsed) => {
                let host = parsed.host_str().unwrap_or("").to_string();
                match parsed.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host,
                }
            }
            Err(_) => String::new(),
        }
    }

    /// Type conversion for dynamic dispatch and type identification.
    fn as_any(&self) -> &dyn Any;
}

/// A generic proxy configuration for standard HTTP/HTTPS proxies.
///
/// Separate proxies may be given for HTTP and HTTPS; when only one is set
/// it serves both schemes.
#[derive(Debug, Clone)]
pub struct GenericProxyConfig {
    /// URL for HTTP proxy (format: "http://[username:password@]host:port")
    pub http_url: Option<String>,
    /// URL for HTTPS proxy (format: "https://[username:password@]host:port")
    pub https_url: Option<String>,
}

impl GenericProxyConfig {
    /// At least one of the two URLs must be provided.
    pub fn new(
        http_url: Option<String>,
        https_url: Option<String>,
    ) -> Result<Self, InvalidProxyConfig> {
        if http_url.is_none() && https_url.is_none() {
            return Err(InvalidProxyConfig(
                "a generic proxy needs an http URL, an https URL, or both".to_string(),
            ));
        }

        Ok(Self { http_url, https_url })
    }

    /// Proxy URL serving `scheme`, falling back to the other scheme's URL
    /// when only one was configured. Always `Some` for a constructed config.
    fn url_for(&self, scheme: &str) -> Option<&str> {
        let (own, other) = if scheme == "http" {
            (&self.http_url, &self.https_url)
        } else {
            (&self.https_url, &self.http_url)
        };
        own.as_deref().or(other.as_deref())
    }
}

impl ProxyConfig for GenericProxyConfig {
    fn to_requests_dict(&self) -> HashMap<String, String> {
        ["http", "https"]
            .into_iter()
            .filter_map(|scheme| {
                self.url_for(scheme)
                    .map(|url| (scheme.to_string(), url.to_string()))
            })
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Proxy configuration for rotating residential proxy pools in the
/// Webshare gateway format.
///
/// Appending `-rotate` to the username asks the gateway for a new exit IP
/// on every connection, which is what makes this provider effective against
/// per-IP blocking.
#[derive(Debug, Clone)]
pub struct WebshareProxyConfig {
    pub proxy_username: String,
    pub proxy_password: String,
    /// The proxy domain name (default: "p.webshare.io")
    pub domain_name: String,
    /// The port number to use (default: 80)
    pub proxy_port: u16,
}

impl WebshareProxyConfig {
    pub const DEFAULT_DOMAIN_NAME: &'static str = "p.webshare.io";
    pub const DEFAULT_PORT: u16 = 80;

    /// The `-rotate` suffix is enforced here so callers can pass the plain
    /// account username.
    pub fn new(
        proxy_username: String,
        proxy_password: String,
        domain_name: Option<String>,
        proxy_port: Option<u16>,
    ) -> Self {
        let proxy_username = if proxy_username.ends_with("-rotate") {
            proxy_username
        } else {
            format!("{}-rotate", proxy_username)
        };
        Self {
            proxy_username,
            proxy_password,
            domain_name: domain_name.unwrap_or_else(|| Self::DEFAULT_DOMAIN_NAME.to_string()),
            proxy_port: proxy_port.unwrap_or(Self::DEFAULT_PORT),
        }
    }

    /// The complete gateway URL with rotation enabled.
    pub fn url(&self) -> String {
        format!(
            "http://{}:{}@{}:{}/",
            self.proxy_username, self.proxy_password, self.domain_name, self.proxy_port
        )
    }
}

impl ProxyConfig for WebshareProxyConfig {
    fn to_requests_dict(&self) -> HashMap<String, String> {
        // One rotating gateway serves both schemes.
        let url = self.url();
        ["http", "https"]
            .into_iter()
            .map(|scheme| (scheme.to_string(), url.clone()))
            .collect()
    }

    /// Always `true`: rotation only happens on fresh connections.
    fn prevent_keeping_connections_alive(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
