pub mod config;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use anyhow::Result;

use config::Config;
use handlers::AppState;
use services::{DatabaseService, Providers};

/// 按配置创建数据库与第三方客户端
pub fn build_state(config: &Config) -> Result<AppState> {
    let db = DatabaseService::open(&config.database_path)?;
    let providers = Providers::new(config.providers.clone())?;

    Ok(AppState {
        db: Arc::new(db),
        providers,
    })
}
