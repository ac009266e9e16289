//! Proxy provider pool with failure accounting and cooldown.
//!
//! Providers are constructed once at startup from configuration and kept in
//! a fixed ordered list. Selection is a pure function of `(providers, now)`;
//! per-provider accounting is linearizable under the provider's own lock.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::Client;

use crate::config::{ProxyCredentials, TranscriptConfig};
use crate::http_client;
use crate::proxies::{GenericProxyConfig, ProxyConfig, WebshareProxyConfig};

#[derive(Debug, Default)]
struct ProviderState {
    failure_count: u32,
    cooldown_until: Option<Instant>,
}

/// One configured proxy provider plus its health state.
pub struct ProxyProvider {
    /// Stable provider name ("generic", "webshare", "gateway")
    pub name: &'static str,

    /// `host:port` form for telemetry
    pub display: String,

    pub config: Arc<dyn ProxyConfig>,

    /// Client routed through this provider, built once and reused
    client: Client,

    state: Mutex<ProviderState>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl ProxyProvider {
    fn new(
        name: &'static str,
        config: Arc<dyn ProxyConfig>,
        attempt_timeout: Duration,
        failure_threshold: u32,
        cooldown: Duration,
    ) -> Option<Self> {
        let client = http_client::build_client(Some(config.as_ref()), attempt_timeout).ok()?;
        Some(Self {
            name,
            display: config.display_endpoint(),
            config,
            client,
            state: Mutex::new(ProviderState::default()),
            failure_threshold,
            cooldown,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_available(&self) -> bool {
        self.is_available_at(Instant::now())
    }

    fn is_available_at(&self, now: Instant) -> bool {
        let state = self.state.lock().expect("provider lock poisoned");
        state.cooldown_until.map_or(true, |until| now >= until)
    }

    /// Remaining cooldown, zero when healthy.
    pub fn cooldown_remaining(&self) -> Duration {
        let state = self.state.lock().expect("provider lock poisoned");
        state
            .cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    fn cooldown_until(&self) -> Option<Instant> {
        self.state.lock().expect("provider lock poisoned").cooldown_until
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("provider lock poisoned");
        state.failure_count = 0;
        state.cooldown_until = None;
    }

    /// Returns `true` when this failure pushed the provider into cooldown.
    pub fn record_failure(&self) -> bool {
        self.record_failure_at(Instant::now())
    }

    fn record_failure_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().expect("provider lock poisoned");
        state.failure_count += 1;
        if state.failure_count >= self.failure_threshold {
            state.cooldown_until = Some(now + self.cooldown);
            state.failure_count = 0;
            return true;
        }
        false
    }
}

impl std::fmt::Debug for ProxyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyProvider")
            .field("name", &self.name)
            .field("display", &self.display)
            .field("available", &self.is_available())
            .finish()
    }
}

/// Fixed ordered set of proxy providers.
pub struct ProviderPool {
    providers: Vec<Arc<ProxyProvider>>,

    /// Client routed through the first configured provider; comment
    /// adapters and timedtext proxied attempts share this single gateway.
    gateway: Option<Client>,
}

impl ProviderPool {
    /// Assemble the pool from credentials in their configured order:
    /// generic URL, rotating residential, third-party gateway.
    pub fn from_settings(creds: &ProxyCredentials, transcript: &TranscriptConfig) -> Self {
        let mut providers: Vec<Arc<ProxyProvider>> = Vec::new();

        if creds.generic_http.is_some() || creds.generic_https.is_some() {
            if let Ok(config) = GenericProxyConfig::new(
                creds
                    .generic_http
                    .clone()
                    .or_else(|| creds.generic_https.clone()),
                creds
                    .generic_https
                    .clone()
                    .or_else(|| creds.generic_http.clone()),
            ) {
                if let Some(provider) = ProxyProvider::new(
                    "generic",
                    Arc::new(config),
                    transcript.proxy_attempt_timeout,
                    transcript.failure_threshold,
                    transcript.cooldown,
                ) {
                    providers.push(Arc::new(provider));
                }
            }
        }

        if let (Some(user), Some(pass)) = (&creds.webshare_user, &creds.webshare_pass) {
            let config = WebshareProxyConfig::new(user.clone(), pass.clone(), None, None);
            if let Some(provider) = ProxyProvider::new(
                "webshare",
                Arc::new(config),
                transcript.proxy_attempt_timeout,
                transcript.failure_threshold,
                transcript.cooldown,
            ) {
                providers.push(Arc::new(provider));
            }
        }

        if let (Some(user), Some(pass)) = (&creds.gateway_user, &creds.gateway_pass) {
            let url = format!(
                "http://{}:{}@{}:{}",
                user, pass, creds.gateway_host, creds.gateway_port
            );
            if let Ok(config) = GenericProxyConfig::new(Some(url.clone()), Some(url)) {
                if let Some(provider) = ProxyProvider::new(
                    "gateway",
                    Arc::new(config),
                    transcript.proxy_attempt_timeout,
                    transcript.failure_threshold,
                    transcript.cooldown,
                ) {
                    providers.push(Arc::new(provider));
                }
            }
        }

        let gateway = providers
            .first()
            .and_then(|p| http_client::build_client(Some(p.config.as_ref()), Duration::from_secs(15)).ok());

        Self { providers, gateway }
    }

    /// A pool with explicit providers; test seam.
    pub fn with_providers(providers: Vec<Arc<ProxyProvider>>) -> Self {
        Self {
            providers,
            gateway: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// The configured providers in their fixed order.
    pub fn providers(&self) -> &[Arc<ProxyProvider>] {
        &self.providers
    }

    /// Client routed through the first configured provider, when any.
    pub fn gateway_client(&self) -> Option<&Client> {
        self.gateway.as_ref()
    }

    /// Proxy URL of the first configured provider, for subprocess
    /// extractors that take a `--proxy` argument instead of a client.
    pub fn gateway_url(&self) -> Option<String> {
        self.providers.first().and_then(|p| {
            let dict = p.config.to_requests_dict();
            dict.get("https").or_else(|| dict.get("http")).cloned()
        })
    }

    /// Providers in the order they should be tried right now: available
    /// ones in configured order, or (when every provider is cooling down)
    /// all of them sorted by soonest recovery for one bypass attempt.
    pub fn select(&self) -> Vec<Arc<ProxyProvider>> {
        self.select_at(Instant::now())
    }

    fn select_at(&self, now: Instant) -> Vec<Arc<ProxyProvider>> {
        if self.providers.is_empty() {
            return Vec::new();
        }
        let available: Vec<Arc<ProxyProvider>> = self
            .providers
            .iter()
            .filter(|p| p.is_available_at(now))
            .cloned()
            .collect();
        if !available.is_empty() {
            return available;
        }

        let mut all = self.providers.clone();
        all.sort_by_key(|p| p.cooldown_until());
        all
    }
}
