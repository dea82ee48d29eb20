//! exec-sandbox - run untrusted snippets over HTTP
//!
//! - `POST /run` executes `{code, language}` and answers `{output}`
//! - `GET /versions` reports interpreter versions
//! - `GET /` liveness probe

use anyhow::Result;
use clap::Parser;
use execsandbox::{AppState, LanguageRegistry, Sandbox, ServerArgs, create_router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let args = ServerArgs::parse();
    info!("Starting exec-sandbox v{}", env!("CARGO_PKG_VERSION"));

    let config = args.sandbox_config()?;
    let sandbox = Sandbox::new(config, LanguageRegistry::builtin())?;
    info!(
        work_dir = %sandbox.config().work_dir.display(),
        timeout_seconds = sandbox.config().timeout_seconds,
        max_concurrent = sandbox.config().max_concurrent,
        "sandbox ready"
    );

    if !args.skip_sweep {
        sandbox.sweep_orphans();
    }

    let app = create_router(AppState::new(sandbox))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = args.bind_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
