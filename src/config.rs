//! Service configuration, assembled from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Default preference list used when neither the caller nor the
/// `Accept-Language` header expresses one.
pub const DEFAULT_TRANSCRIPT_LANGS: &str = "en,hi,es,pt,id,ja,ru,ar,bn,tr,de,fr,vi,ko,th";

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Cache policy for one domain (transcripts or comments).
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Maximum number of entries in the memory tier
    pub max_entries: u64,

    /// Time-to-live for successful entries in the memory tier
    pub ttl: Duration,

    /// Time-to-live for negative / short-lived entries
    pub negative_ttl: Duration,
}

/// Transcript acquisition knobs.
#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    /// Ordered default language preference (base codes)
    pub default_langs: Vec<String>,

    /// Cap on how many base languages the timedtext adapter probes
    pub max_timedtext_langs: usize,

    /// Per-attempt timeout for the primary adapter through a proxy
    pub proxy_attempt_timeout: Duration,

    /// Attempts per proxy provider per request
    pub attempts_per_provider: u32,

    /// Consecutive failures before a provider enters cooldown
    pub failure_threshold: u32,

    /// How long a provider stays in cooldown
    pub cooldown: Duration,

    /// Shared wall-clock deadline for the parallel fallback stage
    pub parallel_deadline: Duration,

    /// How long a single-flight follower waits for the leader
    pub inflight_wait: Duration,

    pub cache: CachePolicy,
}

/// Comment acquisition knobs.
#[derive(Debug, Clone)]
pub struct CommentConfig {
    /// Maximum comments returned to the caller
    pub limit: usize,

    /// Hard cap on items pulled from any one source per attempt
    pub max_fetch: usize,

    /// How long a single-flight follower waits for the leader
    pub inflight_wait: Duration,

    pub cache: CachePolicy,
}

/// Proxy provider credentials, one optional block per provider kind.
#[derive(Debug, Clone, Default)]
pub struct ProxyCredentials {
    /// Generic HTTP/HTTPS proxy URLs (`PROXY_HTTP_URL` / `PROXY_HTTPS_URL`,
    /// falling back to the conventional `HTTP_PROXY` / `HTTPS_PROXY`)
    pub generic_http: Option<String>,
    pub generic_https: Option<String>,

    /// Webshare rotating residential credentials
    pub webshare_user: Option<String>,
    pub webshare_pass: Option<String>,

    /// Third-party gateway credentials + endpoint
    pub gateway_user: Option<String>,
    pub gateway_pass: Option<String>,
    pub gateway_host: String,
    pub gateway_port: u16,
}

/// Subprocess extractor configuration.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Path to the yt-dlp binary
    pub bin: String,

    /// Netscape cookie file handed to the extractor; when unset a minimal
    /// consent cookie file is generated under the cache directory
    pub cookie_file: Option<PathBuf>,

    /// Per-invocation wall-clock bound
    pub timeout: Duration,
}

/// Top-level service settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Worker threads for the runtime (`min(4, cpu_count)` by default)
    pub max_workers: usize,

    /// Root directory for the persistent cache tiers
    pub cache_dir: PathBuf,

    pub transcript: TranscriptConfig,
    pub comments: CommentConfig,
    pub proxy: ProxyCredentials,
    pub ytdlp: YtDlpConfig,
}

impl Settings {
    /// Read every knob from the environment, with the documented defaults.
    pub fn from_env() -> Self {
        let cpu_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(4);
        let comment_limit = env_parse("COMMENT_LIMIT", 50usize);

        let default_langs = env_string("TRANSCRIPT_LANGS")
            .unwrap_or_else(|| DEFAULT_TRANSCRIPT_LANGS.to_string())
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Settings {
            max_workers: env_parse("MAX_WORKERS", cpu_workers),
            cache_dir: PathBuf::from(
                env_string("CACHE_DIR").unwrap_or_else(|| "/tmp/tubetext-cache".to_string()),
            ),
            transcript: TranscriptConfig {
                default_langs,
                max_timedtext_langs: env_parse("MAX_TIMEDTEXT_LANGS", 3usize),
                proxy_attempt_timeout: Duration::from_secs_f64(env_parse(
                    "TRANSCRIPT_PROXY_ATTEMPT_TIMEOUT",
                    2.0f64,
                )),
                attempts_per_provider: env_parse("TRANSCRIPT_PROXY_ATTEMPTS_PER_PROVIDER", 2u32),
                failure_threshold: env_parse("TRANSCRIPT_PROXY_FAILURE_THRESHOLD", 2u32),
                cooldown: Duration::from_secs_f64(env_parse(
                    "TRANSCRIPT_PROXY_COOLDOWN_SECONDS",
                    300.0f64,
                )),
                parallel_deadline: Duration::from_secs(12),
                inflight_wait: Duration::from_secs(30),
                cache: CachePolicy {
                    max_entries: env_parse("TRANSCRIPT_CACHE_SIZE", 200u64),
                    ttl: Duration::from_secs(env_parse("TRANSCRIPT_CACHE_TTL", 7200u64)),
                    negative_ttl: Duration::from_secs(env_parse("TRANSCRIPT_NEGATIVE_TTL", 600u64)),
                },
            },
            comments: CommentConfig {
                limit: comment_limit,
                max_fetch: env_parse("MAX_COMMENTS_FETCH", comment_limit),
                inflight_wait: Duration::from_secs_f64(env_parse(
                    "COMMENT_INFLIGHT_WAIT_SECONDS",
                    15.0f64,
                )),
                cache: CachePolicy {
                    max_entries: env_parse("COMMENT_CACHE_SIZE", 150u64),
                    ttl: Duration::from_secs(env_parse("COMMENT_CACHE_TTL", 7200u64)),
                    negative_ttl: Duration::from_secs(env_parse("COMMENT_BLOCK_TTL", 300u64)),
                },
            },
            proxy: ProxyCredentials {
                generic_http: env_string("PROXY_HTTP_URL").or_else(|| env_string("HTTP_PROXY")),
                generic_https: env_string("PROXY_HTTPS_URL").or_else(|| env_string("HTTPS_PROXY")),
                webshare_user: env_string("WEBSHARE_USER"),
                webshare_pass: env_string("WEBSHARE_PASS"),
                gateway_user: env_string("GATEWAY_PROXY_USER"),
                gateway_pass: env_string("GATEWAY_PROXY_PASS"),
                gateway_host: env_string("GATEWAY_PROXY_HOST")
                    .unwrap_or_else(|| "gate.example.net".to_string()),
                gateway_port: env_parse("GATEWAY_PROXY_PORT", 7000u16),
            },
            ytdlp: YtDlpConfig {
                bin: env_string("YTDLP_BIN").unwrap_or_else(|| "yt-dlp".to_string()),
                cookie_file: env_string("YTDL_COOKIE_FILE").map(PathBuf::from),
                timeout: Duration::from_secs(env_parse("YTDLP_TIMEOUT_SECONDS", 15u64)),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
