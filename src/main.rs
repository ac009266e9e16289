//! Service binary: configuration, logging, runtime sizing, HTTP serving.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubetext::config::Settings;
use tubetext::http::create_router;
use tubetext::state::AppState;

const APP_NAME: &str = "tubetext";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "tubetext", version, about = "YouTube transcript and comment acquisition service")]
struct Args {
    /// Address to bind to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let settings = Settings::from_env();
    tracing::info!(
        workers = settings.max_workers,
        comment_limit = settings.comments.limit,
        cache_dir = %settings.cache_dir.display(),
        "{} v{} starting",
        APP_NAME,
        VERSION
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.max_workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(args, settings))
}

async fn serve(args: Args, settings: Settings) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(&settings)?);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubetext=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
