use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

use quiz_functions::config::Config;
use quiz_functions::handlers::build_router;
use quiz_functions::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(config.log_level_filter())?;

    // 初始化数据库和第三方客户端
    let state = quiz_functions::build_state(&config)?;
    log::info!("Database ready at {}", config.database_path.display());
    log::info!("Providers: {}", state.providers.status_summary());

    let app = build_router(state, config.max_body_bytes);
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log::info!("quiz-functions v{} listening on http://{}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

