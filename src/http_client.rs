//! HTTP client assembly.
//!
//! Every upstream call goes through a client built here: browser-realistic
//! `User-Agent`, the universal consent cookie (avoids the EU consent
//! interstitial that breaks caption endpoints), and optional proxy routing.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONNECTION, COOKIE};
use reqwest::Client;

use crate::errors::{TranscriptUnavailable, UnavailabilityReason};
use crate::proxies::ProxyConfig;

/// Cookie header that bypasses the EU consent interstitial.
pub const CONSENT_COOKIE_HEADER: &str = "CONSENT=YES+cb.20210328-17-p0.en+FX+888";

/// Realistic, modern browser User-Agents; one is picked per client build
/// to avoid a single fingerprint across the fleet of requests.
pub const USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    // Firefox on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
];

/// A random browser User-Agent string.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Build a client for direct (unproxied) upstream access.
pub fn build_direct_client(timeout: Duration) -> Result<Client, TranscriptUnavailable> {
    build_client(None, timeout)
}

/// Build a client, optionally routed through a proxy configuration.
///
/// Rotating providers get keep-alive disabled and a `Connection: close`
/// header so each request lands on a fresh exit IP.
pub fn build_client(
    proxy_config: Option<&dyn ProxyConfig>,
    timeout: Duration,
) -> Result<Client, TranscriptUnavailable> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(COOKIE, HeaderValue::from_static(CONSENT_COOKIE_HEADER));

    let mut builder = Client::builder()
        .user_agent(random_user_agent())
        .timeout(timeout)
        .cookie_store(true);

    if let Some(config) = proxy_config {
        // The config maps scheme names to proxy URLs; route each request
        // by its target scheme.
        let scheme_urls = config.to_requests_dict();
        builder = builder.proxy(reqwest::Proxy::custom(move |url| {
            scheme_urls.get(url.scheme()).cloned()
        }));

        if config.prevent_keeping_connections_alive() {
            builder = builder.tcp_keepalive(None);
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
    }

    builder.default_headers(headers).build().map_err(|e| {
        TranscriptUnavailable::new(
            "",
            UnavailabilityReason::RequestFailed(format!("failed to build HTTP client: {}", e)),
        )
    })
}
